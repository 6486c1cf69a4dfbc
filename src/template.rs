//! Template placeholders in rule values
//!
//! Operation values may reference the record being patched with
//! `$name`/`${name}` style placeholders. Only four variables exist: the
//! record's `name`, `version` and `build_number`, plus the `subdir` the
//! index is being processed under (a parameter, not the record field).
//! Unknown placeholders pass through verbatim.

use crate::record::Record;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{(name|version|build_number|subdir)\}|(name|version|build_number|subdir))")
        .unwrap()
});

/// Substitute placeholders in `text` from the record and subdir.
pub fn substitute(text: &str, record: &Record, subdir: &str) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let var = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match var {
                "name" => record.name.clone(),
                "version" => record.version.clone(),
                "build_number" => record.build_number.unwrap_or(0).to_string(),
                "subdir" => subdir.to_string(),
                _ => unreachable!("placeholder alternatives are fixed"),
            }
        })
        .into_owned()
}
