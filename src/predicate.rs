//! Predicate evaluation - does a rule apply to a record?
//!
//! Every condition in a rule's `if` set must hold (logical AND);
//! evaluation short-circuits on the first failure. Negated keys invert
//! the underlying sub-test before ANDing. Missing optional fields read as
//! defaults (`0` for integer comparisons, empty for collections), never
//! as errors; absence is common across a heterogeneous record population.

use crate::error::Result;
use crate::pattern;
use crate::record::Record;
use crate::rule::{CmpOp, CmpValue, CondTest, Condition, Rule};
use crate::version;
use std::cmp::Ordering;

/// Evaluate a rule's condition set against one record.
pub fn matches(rule: &Rule, record: &Record, subdir: &str, artifact: &str) -> Result<bool> {
    for condition in &rule.conditions {
        let hit = eval(&condition.test, record, subdir, artifact)?;
        if hit == condition.negated {
            return Ok(false);
        }
    }
    Ok(true)
}

fn eval(test: &CondTest, record: &Record, subdir: &str, artifact: &str) -> Result<bool> {
    match test {
        CondTest::FieldMatch { field, pattern } => match record.field_text(field) {
            Some(value) => pattern::matches(pattern, &value),
            None => Ok(false),
        },
        CondTest::VersionEq { value } => {
            if record.version.is_empty() {
                return Ok(false);
            }
            Ok(version::compare(&record.version, value)? == Ordering::Equal)
        }
        CondTest::Compare { field, op, value } => compare(record, field, *op, value),
        CondTest::FieldIn { field, patterns } => match record.field_text(field) {
            Some(value) => pattern::any_match(patterns, &value),
            None => Ok(false),
        },
        CondTest::SubdirIn { patterns } => pattern::any_match(patterns, subdir),
        CondTest::ArtifactIn { patterns } => pattern::any_match(patterns, artifact),
        CondTest::Has {
            collection,
            patterns,
        } => {
            let entries = record.collection(*collection);
            for pat in patterns {
                let mut found = false;
                for entry in entries {
                    if pattern::matches(pat, entry)? {
                        found = true;
                        break;
                    }
                }
                if !found {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn compare(record: &Record, field: &str, op: CmpOp, value: &CmpValue) -> Result<bool> {
    match value {
        CmpValue::Version(expected) => {
            if record.version.is_empty() {
                return Ok(false);
            }
            Ok(op.holds(version::compare(&record.version, expected)?))
        }
        CmpValue::Int(expected) => {
            let actual = record.field_int(field).unwrap_or(0);
            Ok(op.holds(actual.cmp(expected)))
        }
        CmpValue::Text(expected) => {
            let equal = record
                .field_text(field)
                .is_some_and(|actual| actual == expected.as_str());
            Ok(op.holds(if equal {
                Ordering::Equal
            } else {
                Ordering::Less
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn record() -> Record {
        serde_json::from_value(serde_json::json!({
            "name": "numpy",
            "version": "1.11.3",
            "build": "py36_0",
            "build_number": 0,
            "license": "BSD 3-Clause",
            "depends": ["python >=3.6,<3.7.0a0", "mkl >=2018"],
        }))
        .unwrap()
    }

    fn rule(conditions: &[(&str, Value)]) -> Rule {
        Rule {
            source: "<test>".to_string(),
            conditions: conditions
                .iter()
                .map(|(k, v)| Condition::parse(k, v).unwrap())
                .collect(),
            ops: vec![],
        }
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let rec = record();
        let both = rule(&[
            ("name", Value::from("numpy")),
            ("version_lt", Value::from("1.12")),
        ]);
        assert!(matches(&both, &rec, "linux-64", "x").unwrap());

        let one_fails = rule(&[
            ("name", Value::from("numpy")),
            ("version_lt", Value::from("1.11")),
        ]);
        assert!(!matches(&one_fails, &rec, "linux-64", "x").unwrap());
    }

    #[test]
    fn test_plain_field_globs() {
        let rec = record();
        assert!(matches(&rule(&[("license", Value::from("BSD*"))]), &rec, "", "").unwrap());
        assert!(!matches(&rule(&[("license", Value::from("MIT"))]), &rec, "", "").unwrap());
        // absent field never matches
        assert!(!matches(&rule(&[("arch", Value::from("*"))]), &rec, "", "").unwrap());
    }

    #[test]
    fn test_version_equality_is_semantic() {
        let mut rec = record();
        rec.version = "1.2".to_string();
        assert!(matches(&rule(&[("version", Value::from("1.2.0"))]), &rec, "", "").unwrap());
    }

    #[test]
    fn test_negation() {
        let rec = record();
        assert!(!matches(&rule(&[("not_name", Value::from("numpy"))]), &rec, "", "").unwrap());
        assert!(matches(&rule(&[("not_name", Value::from("scipy"))]), &rec, "", "").unwrap());
    }

    #[test]
    fn test_missing_timestamp_defaults_to_zero() {
        let rec = record();
        assert!(matches(&rule(&[("timestamp_lt", Value::from(1))]), &rec, "", "").unwrap());
        assert!(!matches(&rule(&[("timestamp_gt", Value::from(0))]), &rec, "", "").unwrap());
    }

    #[test]
    fn test_subdir_and_artifact_params() {
        let rec = record();
        let by_subdir = rule(&[("subdir_in", serde_json::json!(["linux-64", "osx-64"]))]);
        assert!(matches(&by_subdir, &rec, "osx-64", "x").unwrap());
        assert!(!matches(&by_subdir, &rec, "win-64", "x").unwrap());

        let by_artifact = rule(&[("artifact_in", Value::from("numpy-1.11.3*"))]);
        assert!(matches(&by_artifact, &rec, "", "numpy-1.11.3-py36_0.tar.bz2").unwrap());
    }

    #[test]
    fn test_has_depends_all_patterns() {
        let rec = record();
        let both = rule(&[(
            "has_depends",
            serde_json::json!(["python?( *)", "mkl?( *)"]),
        )]);
        assert!(matches(&both, &rec, "", "").unwrap());

        let one_missing = rule(&[(
            "has_depends",
            serde_json::json!(["python?( *)", "openssl?( *)"]),
        )]);
        assert!(!matches(&one_missing, &rec, "", "").unwrap());

        // absent collection means zero matches
        let no_constrains = rule(&[("has_constrains", Value::from("*"))]);
        assert!(!matches(&no_constrains, &rec, "", "").unwrap());
        let negated = rule(&[("not_has_constrains", Value::from("*"))]);
        assert!(matches(&negated, &rec, "", "").unwrap());
    }

    #[test]
    fn test_field_in() {
        let rec = record();
        let build_in = rule(&[("build_in", serde_json::json!(["py35*", "py36*"]))]);
        assert!(matches(&build_in, &rec, "", "").unwrap());
    }

    #[test]
    fn test_malformed_record_version_is_fatal() {
        let mut rec = record();
        rec.version = "1.0+broken".to_string();
        let cmp = rule(&[("version_ge", Value::from("1.0"))]);
        assert!(matches(&cmp, &rec, "", "").is_err());
    }
}
