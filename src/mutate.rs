//! Mutation execution - a rule's "then" list applied to one record
//!
//! Operations execute in declaration order; all of them apply. The
//! executor takes exclusive mutable access to one record for the duration
//! of one rule application; collections are owned by the record and never
//! aliased elsewhere. Re-running a rule is NOT deduplicated: `add_*` on an
//! already-patched record appends a duplicate.
//!
//! The pin-rewrite operators (`relax_exact_depends`, `tighten_depends`,
//! `loosen_depends`) only act on version specs they can safely parse;
//! anything else is a no-op, never an error.

use crate::depends::{dep_name, DepSpec};
use crate::error::{Error, Result};
use crate::pattern;
use crate::record::{Collection, Record};
use crate::rule::{BoundParams, Operation, RelaxParams, Replacement, Rule};
use crate::template;
use crate::version::{self, VersionRange};
use std::cmp::Ordering;

/// Apply every operation of a matched rule to the record, in order.
pub fn apply(rule: &Rule, record: &mut Record, subdir: &str) -> Result<()> {
    for op in &rule.ops {
        apply_op(op, record, subdir)?;
    }
    Ok(())
}

fn apply_op(op: &Operation, record: &mut Record, subdir: &str) -> Result<()> {
    match op {
        Operation::AddDepends(values) => add(record, Collection::Depends, values, subdir),
        Operation::AddConstrains(values) => add(record, Collection::Constrains, values, subdir),
        Operation::RemoveDepends(patterns) => remove(record, Collection::Depends, patterns),
        Operation::RemoveConstrains(patterns) => remove(record, Collection::Constrains, patterns),
        Operation::RemoveTrackFeature(names) => remove_track_feature(record, names),
        Operation::ReplaceDepends(r) => replace(record, Collection::Depends, r, subdir),
        Operation::ReplaceConstrains(r) => replace(record, Collection::Constrains, r, subdir),
        Operation::RenameDepends(r) => rename(record, Collection::Depends, r),
        Operation::RenameConstrains(r) => rename(record, Collection::Constrains, r),
        Operation::RelaxExactDepends(p) => relax_exact(record, p),
        Operation::TightenDepends(p) => adjust_bounds(record, p, Direction::Tighten),
        Operation::LoosenDepends(p) => adjust_bounds(record, p, Direction::Loosen),
    }
}

fn existing_mut(record: &mut Record, which: Collection) -> Option<&mut Vec<String>> {
    match which {
        Collection::Depends => record.depends.as_mut(),
        Collection::Constrains => record.constrains.as_mut(),
    }
}

fn add(record: &mut Record, which: Collection, values: &[String], subdir: &str) -> Result<()> {
    let rendered: Vec<String> = values
        .iter()
        .map(|v| template::substitute(v, record, subdir))
        .collect();
    record.collection_mut(which).extend(rendered);
    Ok(())
}

fn remove(record: &mut Record, which: Collection, patterns: &[String]) -> Result<()> {
    let entries = record.collection(which);
    if entries.is_empty() {
        return Ok(());
    }
    let mut keep = Vec::with_capacity(entries.len());
    for entry in entries {
        keep.push(!pattern::any_match(patterns, entry)?);
    }

    let list = existing_mut(record, which).expect("non-empty collection");
    let mut flags = keep.iter();
    list.retain(|_| *flags.next().expect("mask covers list"));
    record.prune_collection(which);
    Ok(())
}

fn remove_track_feature(record: &mut Record, names: &[String]) -> Result<()> {
    let Some(current) = &record.track_features else {
        return Ok(());
    };
    let kept: Vec<&str> = current
        .split_whitespace()
        .filter(|token| !names.iter().any(|n| n == token))
        .collect();
    record.track_features = if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    };
    Ok(())
}

fn replace(record: &mut Record, which: Collection, r: &Replacement, subdir: &str) -> Result<()> {
    let old = template::substitute(&r.old, record, subdir);
    let new = template::substitute(&r.new, record, subdir);

    let entries = record.collection(which);
    if entries.is_empty() {
        return Ok(());
    }
    let mut hits = Vec::with_capacity(entries.len());
    for entry in entries {
        hits.push(pattern::matches(&old, entry)?);
    }

    let list = existing_mut(record, which).expect("non-empty collection");
    for (entry, hit) in list.iter_mut().zip(hits) {
        if hit {
            *entry = new.clone();
        }
    }
    Ok(())
}

fn rename(record: &mut Record, which: Collection, r: &Replacement) -> Result<()> {
    if let Some(list) = existing_mut(record, which) {
        // the single entry whose leading name token equals `old`
        if let Some(entry) = list.iter_mut().find(|e| dep_name(e) == r.old) {
            let mut spec = DepSpec::parse(entry);
            spec.name = r.new.clone();
            *entry = spec.to_string();
        }
    }
    Ok(())
}

fn relax_exact(record: &mut Record, p: &RelaxParams) -> Result<()> {
    let Some(list) = record.depends.as_mut() else {
        return Ok(());
    };
    for entry in list.iter_mut() {
        let spec = DepSpec::parse(entry);
        if spec.name != p.name || spec.token_count() != 3 || !spec.is_exact_pin() {
            continue;
        }
        let ver = spec.version.as_deref().expect("token count checked");
        *entry = match &p.max_pin {
            Some(pin) => format!(
                "{} >={},<{}a0",
                spec.name,
                ver,
                version::upper_bound(ver, pin)?
            ),
            None => format!("{} >={}", spec.name, ver),
        };
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Tighten,
    Loosen,
}

fn adjust_bounds(record: &mut Record, p: &BoundParams, dir: Direction) -> Result<()> {
    let Some(list) = record.depends.as_mut() else {
        return Ok(());
    };
    for entry in list.iter_mut() {
        let spec = DepSpec::parse(entry);
        if spec.name != p.name {
            continue;
        }
        let Some(vspec) = &spec.version else {
            // bare name: an explicit upper bound can introduce a cap
            if dir == Direction::Tighten {
                if let Some(ub) = &p.upper_bound {
                    *entry = format!("{} <{}a0", spec.name, ub);
                }
            }
            continue;
        };
        match version::recognize(vspec) {
            Some(VersionRange::OpenLower { lower }) => {
                if dir == Direction::Tighten {
                    let upper = resolve_upper(p, lower)?;
                    *entry = rebuild(&spec, &format!(">={},<{}a0", lower, upper));
                }
            }
            Some(VersionRange::Bounded { lower, upper }) => {
                let new_upper = resolve_upper(p, lower)?;
                let ord = version::compare(&new_upper, upper)?;
                let replace = match dir {
                    Direction::Tighten => ord == Ordering::Less,
                    Direction::Loosen => ord == Ordering::Greater,
                };
                if replace {
                    *entry = rebuild(&spec, &format!(">={},<{}a0", lower, new_upper));
                }
            }
            // unrecognized spec shapes (exact pins, ==, hand-written
            // ranges) are left untouched
            None => {}
        }
    }
    Ok(())
}

fn resolve_upper(p: &BoundParams, lower: &str) -> Result<String> {
    match (&p.upper_bound, &p.max_pin) {
        (Some(ub), _) => Ok(ub.clone()),
        (None, Some(pin)) => version::upper_bound(version::strip_alpha_marker(lower), pin),
        (None, None) => Err(Error::RuleParse(
            "bound operation without max_pin or upper_bound".to_string(),
        )),
    }
}

fn rebuild(spec: &DepSpec, version_spec: &str) -> String {
    match &spec.build {
        Some(build) => format!("{} {} {}", spec.name, version_spec, build),
        None => format!("{} {}", spec.name, version_spec),
    }
}
