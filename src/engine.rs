//! Orchestrator - apply a rule set across an index and diff the result
//!
//! For every record in both package groups, every rule is tested and, on
//! a match, applied in load order. There is no short-circuit across
//! rules: later rules see earlier rules' edits. The diff stage then
//! compares the mutated index against a snapshot of the original; any
//! record key whose value differs, or is newly present, becomes part of
//! the per-package patch entry. Deleting a pre-existing key is not
//! expressible in the instruction format.
//!
//! Processing is single-threaded and fully in-memory; parallelism across
//! subdirs belongs to the caller, with one engine and index copy per
//! worker.

use crate::error::{Error, Result};
use crate::record::{PatchInstructions, Record, RepoIndex};
use crate::ruleset::RuleSet;
use crate::{mutate, predicate};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The rule-application engine for one repository subdir.
#[derive(Debug, Clone)]
pub struct PatchEngine {
    rules: RuleSet,
}

/// Everything one pass produces: the mutated index plus the emitted
/// instruction set.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub patched: RepoIndex,
    pub instructions: PatchInstructions,
}

impl PatchEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Apply every matching rule to one record, in load order. Returns
    /// whether any rule fired.
    pub fn patch_record(
        &self,
        record: &mut Record,
        subdir: &str,
        artifact: &str,
    ) -> Result<bool> {
        let mut fired = false;
        for rule in self.rules.rules() {
            if predicate::matches(rule, record, subdir, artifact)? {
                debug!(rule = %rule.source, artifact, "rule fired");
                mutate::apply(rule, record, subdir)?;
                fired = true;
            }
        }
        Ok(fired)
    }

    /// Mutate every record of the index in place. Returns how many
    /// records at least one rule fired on.
    pub fn patch_index(&self, index: &mut RepoIndex, subdir: &str) -> Result<usize> {
        let mut touched = 0;
        for (artifact, record) in index
            .packages
            .iter_mut()
            .chain(index.conda_packages.iter_mut())
        {
            if self.patch_record(record, subdir, artifact)? {
                touched += 1;
            }
        }
        info!(
            subdir,
            rules = self.rules.len(),
            touched,
            "index pass complete"
        );
        Ok(touched)
    }

    /// Full pass: snapshot, mutate, diff. The input index is untouched.
    pub fn run(&self, index: &RepoIndex, subdir: &str) -> Result<PatchOutcome> {
        let mut patched = index.clone();
        self.patch_index(&mut patched, subdir)?;
        let instructions = gen_patch_instructions(index, &patched)?;
        Ok(PatchOutcome {
            patched,
            instructions,
        })
    }
}

/// Build the instruction set from an original index and its mutated
/// counterpart.
pub fn gen_patch_instructions(
    original: &RepoIndex,
    patched: &RepoIndex,
) -> Result<PatchInstructions> {
    Ok(PatchInstructions {
        packages: diff_group(&original.packages, &patched.packages, "packages")?,
        conda_packages: diff_group(
            &original.conda_packages,
            &patched.conda_packages,
            "packages.conda",
        )?,
        ..Default::default()
    })
}

fn diff_group(
    original: &BTreeMap<String, Record>,
    patched: &BTreeMap<String, Record>,
    group: &str,
) -> Result<BTreeMap<String, Value>> {
    // both sides must describe the same artifact population; a mismatch
    // means index corruption, not a rule-application problem
    for filename in original.keys() {
        if !patched.contains_key(filename) {
            return Err(Error::IndexCorrupt(format!(
                "'{}' present in {} before patching but missing after",
                filename, group
            )));
        }
    }

    let mut changed = BTreeMap::new();
    for (filename, record) in patched {
        let before = original.get(filename).ok_or_else(|| {
            Error::IndexCorrupt(format!(
                "'{}' appeared in {} during patching",
                filename, group
            ))
        })?;
        let before = as_map(before)?;
        let after = as_map(record)?;
        let delta = diff_record(&before, &after);
        if !delta.is_empty() {
            changed.insert(filename.clone(), Value::Object(delta));
        }
    }
    Ok(changed)
}

fn as_map(record: &Record) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => unreachable!("records serialize to objects"),
    }
}

/// Keys of `patched` whose value differs from `original`, or is newly
/// present, each with its full new value. Keys that vanished are not
/// expressed; the instruction format has no deletion encoding.
pub fn diff_record(original: &Map<String, Value>, patched: &Map<String, Value>) -> Map<String, Value> {
    let mut delta = Map::new();
    for (key, value) in patched {
        if original.get(key) != Some(value) {
            delta.insert(key.clone(), value.clone());
        }
    }
    delta
}
