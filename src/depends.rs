//! Dependency-string model
//!
//! A dependency or constraint entry is `"name [version-spec] [build-spec]"`.
//! The first whitespace-delimited token is always the package name; the
//! remaining tokens (0, 1 or 2) are order-significant. Entries are
//! normalized to single spaces when rebuilt.

use std::fmt;

/// A parsed dependency/constraint entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepSpec {
    /// Package name (first token).
    pub name: String,
    /// Version spec, e.g. `1.2.3`, `>=1.0`, `>=1.0,<2.0a0`.
    pub version: Option<String>,
    /// Build spec, e.g. `py38_0` or a build glob.
    pub build: Option<String>,
}

impl DepSpec {
    /// Parse an entry. Never fails: an empty string parses to an empty name
    /// with no specs. Tokens past the third fold into the build spec so
    /// nothing is dropped on rebuild.
    pub fn parse(entry: &str) -> Self {
        let tokens: Vec<&str> = entry.split_whitespace().collect();
        DepSpec {
            name: tokens.first().copied().unwrap_or_default().to_string(),
            version: tokens.get(1).map(|s| s.to_string()),
            build: if tokens.len() > 2 {
                Some(tokens[2..].join(" "))
            } else {
                None
            },
        }
    }

    /// Number of whitespace tokens in the original entry shape.
    pub fn token_count(&self) -> usize {
        1 + self.version.iter().count()
            + self
                .build
                .as_deref()
                .map_or(0, |b| b.split_whitespace().count())
    }

    /// True when the version token carries no comparison operator, i.e. the
    /// entry names one exact version.
    pub fn is_exact_pin(&self) -> bool {
        match &self.version {
            Some(v) => !v.starts_with(['>', '<', '=', '!', '~']),
            None => false,
        }
    }
}

impl fmt::Display for DepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(v) = &self.version {
            write!(f, " {}", v)?;
        }
        if let Some(b) = &self.build {
            write!(f, " {}", b)?;
        }
        Ok(())
    }
}

/// The leading name token of an entry.
pub fn dep_name(entry: &str) -> &str {
    entry.split_whitespace().next().unwrap_or("")
}
