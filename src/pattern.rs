//! Shell-style glob matching for rule predicates
//!
//! Supports `*`, `?`, `[seq]` and `[!seq]` plus one extension: a literal
//! `?( *)` token in a pattern optionally matches a single space and
//! anything after it. One pattern can then cover both a bare package name
//! and any versioned dependency string built from it: `numpy?( *)` matches
//! `"numpy"` and `"numpy >=1"` but not `"numpy-extra"`.
//!
//! Patterns and candidates are case-normalized per the host path-casing
//! convention before compiling. Compiled patterns are cached process-wide
//! in a bounded, mutex-guarded map; at capacity, patterns compile without
//! being inserted.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Mutex;

const CACHE_CAP: usize = 1024;

static CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

#[cfg(windows)]
fn normcase(s: &str) -> Cow<'_, str> {
    Cow::Owned(s.to_ascii_lowercase())
}

#[cfg(not(windows))]
fn normcase(s: &str) -> Cow<'_, str> {
    Cow::Borrowed(s)
}

/// Translate a glob pattern into an anchored regex source string.
fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        // the `?( *)` extension: optionally a single space plus anything
        if chars[i..].starts_with(&['?', '(', ' ', '*', ')']) {
            out.push_str("( .*)?");
            i += 5;
            continue;
        }
        match chars[i] {
            '*' => {
                out.push_str(".*");
                i += 1;
            }
            '?' => {
                out.push('.');
                i += 1;
            }
            '[' => {
                // find the closing bracket; a leading ! or ] is part of the set
                let mut j = i + 1;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    // unterminated set, treat the bracket literally
                    out.push_str("\\[");
                    i += 1;
                } else {
                    let inner: String = chars[i + 1..j].iter().collect();
                    let inner = inner.replace('\\', "\\\\");
                    out.push('[');
                    match inner.strip_prefix('!') {
                        Some(rest) => {
                            out.push('^');
                            out.push_str(rest);
                        }
                        None => out.push_str(&inner),
                    }
                    out.push(']');
                    i = j + 1;
                }
            }
            c => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }
    out.push('$');
    out
}

/// Compile a glob pattern, consulting the process-wide cache.
pub fn compile(pattern: &str) -> Result<Regex> {
    let key = normcase(pattern).into_owned();

    if let Some(re) = CACHE.lock().expect("pattern cache poisoned").get(&key) {
        return Ok(re.clone());
    }

    let re = Regex::new(&translate(&key))
        .map_err(|e| Error::Pattern(format!("invalid pattern '{}': {}", pattern, e)))?;

    let mut cache = CACHE.lock().expect("pattern cache poisoned");
    if cache.len() < CACHE_CAP {
        cache.insert(key, re.clone());
    }
    Ok(re)
}

/// Glob-match a single candidate against a pattern.
pub fn matches(pattern: &str, candidate: &str) -> Result<bool> {
    let re = compile(pattern)?;
    Ok(re.is_match(&normcase(candidate)))
}

/// True when any of `patterns` matches the candidate.
pub fn any_match(patterns: &[String], candidate: &str) -> Result<bool> {
    for pattern in patterns {
        if matches(pattern, candidate)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_globs() {
        assert!(matches("numpy", "numpy").unwrap());
        assert!(matches("numpy*", "numpy-base").unwrap());
        assert!(matches("py?hon", "python").unwrap());
        assert!(!matches("numpy", "numpy-base").unwrap());
        assert!(!matches("numpy*", "scipy").unwrap());
    }

    #[test]
    fn test_character_sets() {
        assert!(matches("python 3.[67]*", "python 3.6.8").unwrap());
        assert!(matches("python 3.[!5]*", "python 3.7.1").unwrap());
        assert!(!matches("python 3.[!5]*", "python 3.5.2").unwrap());
    }

    #[test]
    fn test_unterminated_set_is_literal() {
        assert!(matches("foo[bar", "foo[bar").unwrap());
        assert!(!matches("foo[bar", "foob").unwrap());
    }

    #[test]
    fn test_optional_spec_extension() {
        assert!(matches("numpy?( *)", "numpy").unwrap());
        assert!(matches("numpy?( *)", "numpy >=1").unwrap());
        assert!(!matches("numpy?( *)", "numpy-blah").unwrap());
        assert!(!matches("numpy?( *)", "numpyextra").unwrap());
    }

    #[test]
    fn test_regex_metachars_are_literal() {
        assert!(matches("lib++", "lib++").unwrap());
        assert!(!matches("lib.so", "libxso").unwrap());
    }

    #[test]
    fn test_any_match() {
        let patterns = vec!["scipy*".to_string(), "numpy*".to_string()];
        assert!(any_match(&patterns, "numpy 1.11").unwrap());
        assert!(!any_match(&patterns, "pandas").unwrap());
        assert!(!any_match(&[], "numpy").unwrap());
    }

    #[test]
    fn test_cache_reuse() {
        // same pattern twice goes through the cached path
        assert!(matches("openssl?( *)", "openssl").unwrap());
        assert!(matches("openssl?( *)", "openssl 1.0.2l h077ae2c_5").unwrap());
    }
}
