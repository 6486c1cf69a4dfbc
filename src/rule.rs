//! Rule documents - the if/then patch units
//!
//! A rule document is a YAML object with exactly two keys: `if` (a
//! condition set, all of which must hold) and `then` (a non-empty ordered
//! list of mutation objects, each a single named operation). Unknown keys
//! anywhere are rejected at load time; a misconfigured rule file must
//! never silently no-op.
//!
//! Condition keys follow a naming convention that is parsed ONCE at load
//! into a tagged [`Condition`], not re-interpreted per record:
//!
//! ```yaml
//! if:
//!   name: numpy
//!   version_lt: "1.12"
//!   subdir_in: [linux-64, osx-64]
//!   has_depends: "mkl?( *)"
//! then:
//!   - remove_depends: mkl?( *)
//!   - add_depends: nomkl
//! ```

use crate::error::{Error, Result};
use crate::record::Collection;
use crate::version;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Raw shape of one rule document, strict on unknown keys.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[schemars(
    title = "Patch rule",
    description = "Predicate plus ordered mutations for matching package records"
)]
pub struct RuleDoc {
    /// Condition set; every key must hold for the rule to fire.
    #[serde(rename = "if")]
    pub when: BTreeMap<String, Value>,

    /// Ordered mutations, each an object with a single operation key.
    pub then: Vec<BTreeMap<String, Value>>,
}

/// One fully parsed rule, ready to evaluate and apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Load provenance, e.g. `"numpy.yaml#0"`. Used in errors and logs.
    pub source: String,
    pub conditions: Vec<Condition>,
    pub ops: Vec<Operation>,
}

impl Rule {
    /// Parse a raw document into evaluable form.
    pub fn from_doc(doc: &RuleDoc, source: &str) -> Result<Self> {
        let conditions = doc
            .when
            .iter()
            .map(|(key, value)| Condition::parse(key, value))
            .collect::<Result<Vec<_>>>()?;

        if doc.then.is_empty() {
            return Err(Error::RuleParse(format!(
                "{}: 'then' must contain at least one operation",
                source
            )));
        }
        let ops = doc
            .then
            .iter()
            .map(Operation::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Rule {
            source: source.to_string(),
            conditions,
            ops,
        })
    }

    /// Parse a single YAML document. Convenience for tests and tooling.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: RuleDoc = serde_norway::from_str(yaml)?;
        Rule::from_doc(&doc, "<inline>")
    }
}

/// One parsed condition: the underlying test plus negation.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub negated: bool,
    pub test: CondTest,
}

/// The tagged test behind a condition key.
#[derive(Debug, Clone, PartialEq)]
pub enum CondTest {
    /// Plain field key: glob match against the stringified field value.
    FieldMatch { field: String, pattern: String },
    /// Plain `version` key: semantic-version equality.
    VersionEq { value: String },
    /// `<field>_<op>` ordered or equality comparison.
    Compare {
        field: String,
        op: CmpOp,
        value: CmpValue,
    },
    /// `<field>_in`: any pattern glob-matches the field value.
    FieldIn { field: String, patterns: Vec<String> },
    /// `subdir_in`: matches the subdir parameter, not a record field.
    SubdirIn { patterns: Vec<String> },
    /// `artifact_in`: matches the artifact filename parameter.
    ArtifactIn { patterns: Vec<String> },
    /// `has_depends`/`has_constrains`: every pattern must glob-match at
    /// least one entry of the collection.
    Has {
        collection: Collection,
        patterns: Vec<String>,
    },
}

/// Comparison operators usable as `<field>_<op>` key suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    /// Whether an ordering outcome satisfies this operator.
    pub fn holds(&self, ord: Ordering) -> bool {
        match self {
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
        }
    }
}

const CMP_SUFFIXES: &[(&str, CmpOp)] = &[
    ("_lt", CmpOp::Lt),
    ("_le", CmpOp::Le),
    ("_gt", CmpOp::Gt),
    ("_ge", CmpOp::Ge),
    ("_eq", CmpOp::Eq),
    ("_ne", CmpOp::Ne),
];

/// Right-hand side of a comparison, typed at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum CmpValue {
    /// Semantic-version comparison (the `version` field).
    Version(String),
    /// Integer comparison (`build_number`, `timestamp`, `size`).
    Int(i64),
    /// Raw equality/inequality for everything else.
    Text(String),
}

impl Condition {
    /// Parse a condition key and its expected value. Unknown key shapes
    /// are a hard error naming the offending key.
    pub fn parse(key: &str, value: &Value) -> Result<Self> {
        let (negated, base) = match key.strip_prefix("not_") {
            Some(rest) if !rest.is_empty() => (true, rest),
            _ => (false, key),
        };
        let test = CondTest::parse(key, base, value)?;
        Ok(Condition { negated, test })
    }
}

impl CondTest {
    fn parse(full_key: &str, key: &str, value: &Value) -> Result<Self> {
        if key == "subdir_in" {
            return Ok(CondTest::SubdirIn {
                patterns: scalar_or_list(full_key, value)?,
            });
        }
        if key == "artifact_in" {
            return Ok(CondTest::ArtifactIn {
                patterns: scalar_or_list(full_key, value)?,
            });
        }
        if let Some(collection) = key.strip_prefix("has_") {
            let collection = match collection {
                "depends" => Collection::Depends,
                "constrains" => Collection::Constrains,
                _ => return Err(Error::UnknownCondition(full_key.to_string())),
            };
            return Ok(CondTest::Has {
                collection,
                patterns: scalar_or_list(full_key, value)?,
            });
        }
        if let Some(field) = key.strip_suffix("_in") {
            if !field.is_empty() {
                return Ok(CondTest::FieldIn {
                    field: field.to_string(),
                    patterns: scalar_or_list(full_key, value)?,
                });
            }
        }
        for (suffix, op) in CMP_SUFFIXES {
            if let Some(field) = key.strip_suffix(suffix) {
                if !field.is_empty() {
                    return Self::parse_compare(full_key, field, *op, value);
                }
            }
        }

        // anything left is a plain field key
        if key == "version" {
            let v = scalar_text(full_key, value)?;
            version::validate(&v)?;
            return Ok(CondTest::VersionEq { value: v });
        }
        Ok(CondTest::FieldMatch {
            field: key.to_string(),
            pattern: scalar_text(full_key, value)?,
        })
    }

    fn parse_compare(full_key: &str, field: &str, op: CmpOp, value: &Value) -> Result<Self> {
        let value = if field == "version" {
            let v = scalar_text(full_key, value)?;
            version::validate(&v)?;
            CmpValue::Version(v)
        } else if matches!(field, "build_number" | "timestamp" | "size") {
            let n = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }
            .ok_or_else(|| {
                Error::RuleParse(format!("'{}' expects an integer value", full_key))
            })?;
            CmpValue::Int(n)
        } else if matches!(op, CmpOp::Eq | CmpOp::Ne) {
            CmpValue::Text(scalar_text(full_key, value)?)
        } else {
            // ordered comparisons on non-version strings are not offered
            return Err(Error::UnknownCondition(full_key.to_string()));
        };
        Ok(CondTest::Compare {
            field: field.to_string(),
            op,
            value,
        })
    }
}

/// One named mutation from a rule's `then` list.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    AddDepends(Vec<String>),
    AddConstrains(Vec<String>),
    RemoveDepends(Vec<String>),
    RemoveConstrains(Vec<String>),
    RemoveTrackFeature(Vec<String>),
    ReplaceDepends(Replacement),
    ReplaceConstrains(Replacement),
    RenameDepends(Replacement),
    RenameConstrains(Replacement),
    RelaxExactDepends(RelaxParams),
    TightenDepends(BoundParams),
    LoosenDepends(BoundParams),
}

/// Parameters for replace/rename operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Replacement {
    pub old: String,
    pub new: String,
}

/// Parameters for `relax_exact_depends`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RelaxParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pin: Option<String>,
}

/// Parameters for `tighten_depends`/`loosen_depends`. At least one of
/// `max_pin` and `upper_bound` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BoundParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<String>,
}

impl Operation {
    /// Parse one `then` entry: an object with exactly one operation key.
    pub fn parse(entry: &BTreeMap<String, Value>) -> Result<Self> {
        if entry.len() != 1 {
            return Err(Error::RuleParse(format!(
                "operation object must have exactly one key, got {}",
                entry.len()
            )));
        }
        let (key, value) = entry.iter().next().expect("length checked");
        match key.as_str() {
            "add_depends" => Ok(Operation::AddDepends(scalar_or_list(key, value)?)),
            "add_constrains" => Ok(Operation::AddConstrains(scalar_or_list(key, value)?)),
            "remove_depends" => Ok(Operation::RemoveDepends(scalar_or_list(key, value)?)),
            "remove_constrains" => Ok(Operation::RemoveConstrains(scalar_or_list(key, value)?)),
            "remove_track_feature" => {
                Ok(Operation::RemoveTrackFeature(scalar_or_list(key, value)?))
            }
            "replace_depends" => Ok(Operation::ReplaceDepends(params(key, value)?)),
            "replace_constrains" => Ok(Operation::ReplaceConstrains(params(key, value)?)),
            "rename_depends" => Ok(Operation::RenameDepends(params(key, value)?)),
            "rename_constrains" => Ok(Operation::RenameConstrains(params(key, value)?)),
            "relax_exact_depends" => {
                let p: RelaxParams = params(key, value)?;
                Ok(Operation::RelaxExactDepends(p))
            }
            "tighten_depends" => Ok(Operation::TightenDepends(bound_params(key, value)?)),
            "loosen_depends" => Ok(Operation::LoosenDepends(bound_params(key, value)?)),
            _ => Err(Error::UnknownOperation(key.clone())),
        }
    }
}

fn params<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::RuleParse(format!("invalid parameters for '{}': {}", key, e)))
}

fn bound_params(key: &str, value: &Value) -> Result<BoundParams> {
    let p: BoundParams = params(key, value)?;
    if p.max_pin.is_none() && p.upper_bound.is_none() {
        return Err(Error::RuleParse(format!(
            "'{}' requires max_pin or upper_bound",
            key
        )));
    }
    Ok(p)
}

fn scalar_text(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::RuleParse(format!(
            "'{}' expects a scalar value",
            key
        ))),
    }
}

fn scalar_or_list(key: &str, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(Error::RuleParse(format!("'{}' must not be empty", key)));
            }
            items.iter().map(|v| scalar_text(key, v)).collect()
        }
        _ => Ok(vec![scalar_text(key, value)?]),
    }
}
