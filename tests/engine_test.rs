//! End-to-end engine tests - rule sets applied across a whole index

use pretty_assertions::assert_eq;
use repatch::{diff_record, PatchEngine, RepoIndex, RuleSet};
use serde_json::{json, Map, Value};

fn index() -> RepoIndex {
    serde_json::from_value(json!({
        "info": {"subdir": "linux-64"},
        "packages": {
            "numpy-1.11.3-py36_0.tar.bz2": {
                "name": "numpy",
                "version": "1.11.3",
                "build": "py36_0",
                "build_number": 0,
                "depends": ["python >=3.6,<3.7.0a0", "mkl >=2018"],
                "license": "BSD 3-Clause"
            },
            "scipy-1.1.0-py36_0.tar.bz2": {
                "name": "scipy",
                "version": "1.1.0",
                "build": "py36_0",
                "depends": ["numpy >=1.11", "python >=3.6,<3.7.0a0"]
            }
        },
        "packages.conda": {
            "numpy-1.15.4-py37_0.conda": {
                "name": "numpy",
                "version": "1.15.4",
                "build": "py37_0",
                "depends": ["python >=3.7,<3.8.0a0", "mkl >=2019"]
            }
        }
    }))
    .unwrap()
}

fn engine(yaml: &str) -> PatchEngine {
    PatchEngine::new(RuleSet::from_yaml(yaml, "test.yaml").unwrap())
}

#[test]
fn test_patch_emits_only_changed_records() {
    let engine = engine(
        r#"
if:
  name: numpy
then:
  - remove_depends: mkl?( *)
  - add_depends: nomkl
"#,
    );
    let outcome = engine.run(&index(), "linux-64").unwrap();

    // scipy is untouched and must not appear
    assert_eq!(outcome.instructions.packages.len(), 1);
    assert_eq!(
        outcome.instructions.packages["numpy-1.11.3-py36_0.tar.bz2"],
        json!({"depends": ["python >=3.6,<3.7.0a0", "nomkl"]})
    );

    // both groups are processed
    assert_eq!(
        outcome.instructions.conda_packages["numpy-1.15.4-py37_0.conda"],
        json!({"depends": ["python >=3.7,<3.8.0a0", "nomkl"]})
    );

    // the input index itself is untouched
    assert_eq!(index().packages.len(), 2);
    assert!(outcome.patched.packages["numpy-1.11.3-py36_0.tar.bz2"]
        .depends
        .as_ref()
        .unwrap()
        .contains(&"nomkl".to_string()));
}

#[test]
fn test_later_rules_see_earlier_edits() {
    let engine = engine(
        r#"
if:
  name: scipy
then:
  - add_depends: blas-marker
---
if:
  has_depends: blas-marker
then:
  - add_depends: openblas
"#,
    );
    let outcome = engine.run(&index(), "linux-64").unwrap();
    assert_eq!(
        outcome.instructions.packages["scipy-1.1.0-py36_0.tar.bz2"]["depends"],
        json!([
            "numpy >=1.11",
            "python >=3.6,<3.7.0a0",
            "blas-marker",
            "openblas"
        ])
    );
}

#[test]
fn test_rerun_appends_duplicates() {
    // re-running the full rule set over an already-patched index is not
    // deduplicated: add_depends appends again
    let engine = engine("if: {name: scipy}\nthen: [{add_depends: marker}]");
    let first = engine.run(&index(), "linux-64").unwrap();
    let second = engine.run(&first.patched, "linux-64").unwrap();
    let depends = &second.patched.packages["scipy-1.1.0-py36_0.tar.bz2"]
        .depends
        .as_ref()
        .unwrap()[..];
    assert_eq!(
        depends.iter().filter(|d| *d == "marker").count(),
        2,
        "expected a duplicate, got {:?}",
        depends
    );
}

#[test]
fn test_subdir_gating() {
    let engine = engine(
        r#"
if:
  subdir_in: [win-64, win-32]
then:
  - add_depends: vc
"#,
    );
    let outcome = engine.run(&index(), "linux-64").unwrap();
    assert!(outcome.instructions.is_empty());

    let on_win = engine.run(&index(), "win-64").unwrap();
    assert_eq!(on_win.instructions.packages.len(), 2);
}

#[test]
fn test_artifact_matching() {
    let engine = engine(
        r#"
if:
  artifact_in: "numpy-1.11.3*"
then:
  - add_constrains: numpy-base ==1.11.3
"#,
    );
    let outcome = engine.run(&index(), "linux-64").unwrap();
    assert_eq!(outcome.instructions.packages.len(), 1);
    assert_eq!(
        outcome.instructions.packages["numpy-1.11.3-py36_0.tar.bz2"]["constrains"],
        json!(["numpy-base ==1.11.3"])
    );
}

#[test]
fn test_template_substitution_end_to_end() {
    let engine = engine(
        r#"
if:
  name: numpy
  version: 1.11.3
then:
  - add_constrains: $name-base >=$version,<2.0a0
"#,
    );
    let outcome = engine.run(&index(), "linux-64").unwrap();
    assert_eq!(
        outcome.instructions.packages["numpy-1.11.3-py36_0.tar.bz2"]["constrains"],
        json!(["numpy-base >=1.11.3,<2.0a0"])
    );
}

#[test]
fn test_vanished_keys_are_not_expressed() {
    // removing the last depends entry deletes the key; the instruction
    // format has no deletion encoding, so the record simply drops out
    let engine = engine(
        r#"
if:
  name: scipy
then:
  - remove_depends: "*"
"#,
    );
    let outcome = engine.run(&index(), "linux-64").unwrap();
    assert!(outcome.patched.packages["scipy-1.1.0-py36_0.tar.bz2"]
        .depends
        .is_none());
    assert!(!outcome
        .instructions
        .packages
        .contains_key("scipy-1.1.0-py36_0.tar.bz2"));
}

#[test]
fn test_tighten_across_index() {
    let engine = engine(
        r#"
if:
  has_depends: numpy?( *)
then:
  - tighten_depends:
      name: numpy
      max_pin: x.x
"#,
    );
    let outcome = engine.run(&index(), "linux-64").unwrap();
    assert_eq!(
        outcome.instructions.packages["scipy-1.1.0-py36_0.tar.bz2"]["depends"],
        json!(["numpy >=1.11,<1.12a0", "python >=3.6,<3.7.0a0"])
    );
}

#[test]
fn test_bad_rule_set_fails_before_any_record() {
    let err = RuleSet::from_yaml(
        "if: {has_depneds: numpy}\nthen: [{add_depends: x}]",
        "typo.yaml",
    )
    .unwrap_err();
    assert!(err.to_string().contains("has_depneds"));
}

#[test]
fn test_exact_diff_scenario() {
    // the diff contract: only changed keys, full new value, no partial diff
    let original: Map<String, Value> = serde_json::from_value(json!({
        "depends": ["c", "d"],
        "features": "d"
    }))
    .unwrap();
    let mutated: Map<String, Value> = serde_json::from_value(json!({
        "depends": ["c", "d", "e"],
        "features": null
    }))
    .unwrap();

    let delta = diff_record(&original, &mutated);
    assert_eq!(
        Value::Object(delta),
        json!({"depends": ["c", "d", "e"], "features": null})
    );
}
