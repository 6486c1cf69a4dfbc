//! Version-range algebra
//!
//! Dotted version strings are compared component-wise after padding the
//! shorter side with `"0"`. Within a component, runs of digits and runs of
//! letters are compared separately, so `1.9 < 1.10` and `1.0a < 1.0`.
//!
//! Upper bounds are derived from a pin template (`max_pin`), a string of
//! `x` and `.` characters: the `x`-count `n` freezes the first `n-1`
//! components, increments component `n` and zeroes the rest.
//! `upper_bound("1.2.3", "x.x") == "1.3.0"`.
//!
//! The rewrite operators only touch range syntax they can parse (see
//! [`VersionRange`]); anything else is left alone.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

/// One run of digits or letters inside a version component.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Num(u64),
    Alpha(String),
}

/// Right-pad a dot-split version with `"0"` until it has at least `n`
/// components.
pub fn pad(parts: &mut Vec<String>, n: usize) {
    while parts.len() < n {
        parts.push("0".to_string());
    }
}

/// Compute the exclusive upper bound for `version` under a pin template.
///
/// The template's `x`-count `n` freezes the first `n-1` components,
/// increments component `n` and zeroes everything after it. A major-only
/// pin (`"x"`) collapses to the bare incremented major.
///
/// ```
/// use repatch::version::upper_bound;
/// assert_eq!(upper_bound("1.2.3", "x.x").unwrap(), "1.3.0");
/// assert_eq!(upper_bound("1", "x").unwrap(), "2");
/// ```
pub fn upper_bound(version: &str, max_pin: &str) -> Result<String> {
    let n = max_pin.matches('x').count();
    if n == 0 {
        return Err(Error::VersionParse(format!(
            "pin template '{}' has no x components",
            max_pin
        )));
    }

    let mut parts: Vec<String> = version.split('.').map(str::to_string).collect();
    pad(&mut parts, n);
    for part in parts.iter_mut().skip(n) {
        *part = "0".to_string();
    }

    let pinned: u64 = parts[n - 1].parse().map_err(|_| {
        Error::VersionParse(format!(
            "non-numeric component '{}' in version '{}'",
            parts[n - 1],
            version
        ))
    })?;
    parts[n - 1] = (pinned + 1).to_string();

    if n == 1 {
        // a major-only pin yields a bare major bound
        parts.truncate(1);
    }
    Ok(parts.join("."))
}

/// Compare two version strings with semantic component ordering.
///
/// Both sides are padded to equal length with `"0"`, so `1.2 == 1.2.0`.
/// Malformed input (empty components, characters outside `[0-9A-Za-z_]`)
/// is a hard error; rule authors are expected to supply valid versions.
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    let mut left: Vec<String> = a.split('.').map(str::to_string).collect();
    let mut right: Vec<String> = b.split('.').map(str::to_string).collect();
    pad(&mut left, right.len());
    pad(&mut right, left.len());

    for (lc, rc) in left.iter().zip(right.iter()) {
        let ls = parse_component(lc, a)?;
        let rs = parse_component(rc, b)?;
        let ord = compare_components(&ls, &rs);
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(Ordering::Equal)
}

/// Check that a version string parses, without comparing it to anything.
pub fn validate(version: &str) -> Result<()> {
    for component in version.split('.') {
        parse_component(component, version)?;
    }
    Ok(())
}

fn parse_component(component: &str, version: &str) -> Result<Vec<Segment>> {
    if component.is_empty() {
        return Err(Error::VersionParse(format!(
            "empty component in version '{}'",
            version
        )));
    }

    let mut segments = Vec::new();
    let mut chars = component.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(&d) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                digits.push(d);
                chars.next();
            }
            let value: u64 = digits.parse().map_err(|_| {
                Error::VersionParse(format!("component overflow in version '{}'", version))
            })?;
            segments.push(Segment::Num(value));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut run = String::new();
            while let Some(&d) = chars.peek() {
                if !d.is_ascii_alphabetic() && d != '_' {
                    break;
                }
                run.push(d.to_ascii_lowercase());
                chars.next();
            }
            segments.push(Segment::Alpha(run));
        } else {
            return Err(Error::VersionParse(format!(
                "invalid character '{}' in version '{}'",
                c, version
            )));
        }
    }
    Ok(segments)
}

fn compare_components(a: &[Segment], b: &[Segment]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let ord = match (a.get(i), b.get(i)) {
            (Some(Segment::Num(x)), Some(Segment::Num(y))) => x.cmp(y),
            (Some(Segment::Alpha(x)), Some(Segment::Alpha(y))) => x.cmp(y),
            // numeric segments order after alpha runs at the same position
            (Some(Segment::Num(_)), Some(Segment::Alpha(_))) => Ordering::Greater,
            (Some(Segment::Alpha(_)), Some(Segment::Num(_))) => Ordering::Less,
            (Some(Segment::Num(x)), None) => x.cmp(&0),
            (None, Some(Segment::Num(y))) => 0.cmp(y),
            // a trailing alpha run marks a prerelease: 1.0a < 1.0
            (Some(Segment::Alpha(_)), None) => Ordering::Less,
            (None, Some(Segment::Alpha(_))) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// A version spec shape the rewrite operators know how to take apart.
///
/// Anything that does not match one of these (an exact `==` pin, a build
/// constraint, an unparseable hand-written range) is left untouched by
/// relax/tighten/loosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRange<'a> {
    /// `>=LOWER` with no upper bound. The captured text keeps any trailing
    /// alpha marker.
    OpenLower { lower: &'a str },
    /// `>=LOWER,<UPPERa0`. The upper bound is captured without its `a0`
    /// prerelease-exclusion suffix.
    Bounded { lower: &'a str, upper: &'a str },
}

static OPEN_LOWER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^>=([\w.]*\da?)$").unwrap());
static BOUNDED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^>=([\w.]*\da?),<([\w.]*\d)a0$").unwrap());

/// Recognize an existing version-spec token, if it matches the replaceable
/// range grammar.
pub fn recognize(spec: &str) -> Option<VersionRange<'_>> {
    if let Some(caps) = BOUNDED_RE.captures(spec) {
        return Some(VersionRange::Bounded {
            lower: caps.get(1).unwrap().as_str(),
            upper: caps.get(2).unwrap().as_str(),
        });
    }
    if let Some(caps) = OPEN_LOWER_RE.captures(spec) {
        return Some(VersionRange::OpenLower {
            lower: caps.get(1).unwrap().as_str(),
        });
    }
    None
}

/// Strip the trailing `a` alpha-inclusion marker from a lower bound, when
/// present. The marker is range syntax, not part of the version.
pub fn strip_alpha_marker(lower: &str) -> &str {
    match lower.strip_suffix('a') {
        Some(rest) if rest.ends_with(|c: char| c.is_ascii_digit()) => rest,
        _ => lower,
    }
}
