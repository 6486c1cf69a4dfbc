//! Index data model
//!
//! A [`Record`] is one package's metadata entry. A [`RepoIndex`] maps
//! artifact filenames to records under the `"packages"` and
//! `"packages.conda"` groups. [`PatchInstructions`] is the emitted diff
//! consumed by the archive's indexing tool.
//!
//! Records exist only within one index-processing pass: read from the raw
//! index, mutated in place zero or more times, then diffed against their
//! pre-mutation snapshot. Unknown fields round-trip through the flattened
//! `extra` map.

use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Wire version of the emitted instruction format.
pub const PATCH_INSTRUCTIONS_VERSION: u32 = 1;

/// Which record collection an operation or predicate addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Depends,
    Constrains,
}

impl Collection {
    /// The record key this collection lives under.
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Depends => "depends",
            Collection::Constrains => "constrains",
        }
    }
}

/// One package's metadata entry in the index.
///
/// `depends` and `constrains` are `Option<Vec<String>>` so "key absent"
/// and "key present but empty" stay distinct; mutation operators delete a
/// list key by setting it to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noarch: Option<String>,

    /// Hard run-time dependencies, `"name [version-spec] [build-spec]"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends: Option<Vec<String>>,

    /// Run-time conflicts/requirements that do not pull a dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constrains: Option<Vec<String>>,

    /// Space-separated solver-priority tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_features: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<String>,

    /// Fields this tool does not model, preserved byte-faithfully.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Record {
    /// Stringified scalar value of a named field, for glob matching.
    /// `None` when the field is absent or not a scalar.
    pub fn field_text(&self, field: &str) -> Option<Cow<'_, str>> {
        match field {
            "name" => Some(Cow::Borrowed(self.name.as_str())),
            "version" => Some(Cow::Borrowed(self.version.as_str())),
            "build" => self.build.as_deref().map(Cow::Borrowed),
            "subdir" => self.subdir.as_deref().map(Cow::Borrowed),
            "platform" => self.platform.as_deref().map(Cow::Borrowed),
            "arch" => self.arch.as_deref().map(Cow::Borrowed),
            "license" => self.license.as_deref().map(Cow::Borrowed),
            "md5" => self.md5.as_deref().map(Cow::Borrowed),
            "sha256" => self.sha256.as_deref().map(Cow::Borrowed),
            "noarch" => self.noarch.as_deref().map(Cow::Borrowed),
            "track_features" => self.track_features.as_deref().map(Cow::Borrowed),
            "features" => self.features.as_deref().map(Cow::Borrowed),
            "build_number" => self.build_number.map(|n| Cow::Owned(n.to_string())),
            "timestamp" => self.timestamp.map(|n| Cow::Owned(n.to_string())),
            "size" => self.size.map(|n| Cow::Owned(n.to_string())),
            _ => self.extra.get(field).and_then(value_text),
        }
    }

    /// Integer value of a named field, for ordered comparisons.
    pub fn field_int(&self, field: &str) -> Option<i64> {
        match field {
            "build_number" => self.build_number.map(|n| n as i64),
            "timestamp" => self.timestamp.map(|n| n as i64),
            "size" => self.size.map(|n| n as i64),
            _ => self.extra.get(field).and_then(Value::as_i64),
        }
    }

    /// Entries of a collection; an absent key reads as empty.
    pub fn collection(&self, which: Collection) -> &[String] {
        let list = match which {
            Collection::Depends => &self.depends,
            Collection::Constrains => &self.constrains,
        };
        list.as_deref().unwrap_or(&[])
    }

    /// Mutable access to a collection, creating the key if absent.
    pub fn collection_mut(&mut self, which: Collection) -> &mut Vec<String> {
        let list = match which {
            Collection::Depends => &mut self.depends,
            Collection::Constrains => &mut self.constrains,
        };
        list.get_or_insert_with(Vec::new)
    }

    /// Drop a collection key when mutation emptied it.
    pub fn prune_collection(&mut self, which: Collection) {
        let list = match which {
            Collection::Depends => &mut self.depends,
            Collection::Constrains => &mut self.constrains,
        };
        if list.as_ref().is_some_and(Vec::is_empty) {
            *list = None;
        }
    }
}

fn value_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

/// A repository index for one subdir.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,

    #[serde(default)]
    pub packages: BTreeMap<String, Record>,

    #[serde(rename = "packages.conda", default)]
    pub conda_packages: BTreeMap<String, Record>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repodata_version: Option<u32>,
}

impl RepoIndex {
    /// Parse an index from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the index to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The subdir recorded in the index header, when present.
    pub fn info_subdir(&self) -> Option<&str> {
        self.info.as_ref()?.get("subdir")?.as_str()
    }

    /// Total number of records across both groups.
    pub fn record_count(&self) -> usize {
        self.packages.len() + self.conda_packages.len()
    }
}

/// The emitted diff: changed-or-added fields per artifact filename.
///
/// `revoke` is carried for wire compatibility and never populated by the
/// rule engine. `remove` is populated by an external removal-list
/// collaborator. Deleting a record key is not expressible in this format;
/// downstream consumers depend on that absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatchInstructions {
    pub patch_instructions_version: u32,

    pub packages: BTreeMap<String, Value>,

    #[serde(rename = "packages.conda")]
    pub conda_packages: BTreeMap<String, Value>,

    #[serde(default)]
    pub revoke: Vec<String>,

    #[serde(default)]
    pub remove: Vec<String>,
}

impl Default for PatchInstructions {
    fn default() -> Self {
        Self {
            patch_instructions_version: PATCH_INSTRUCTIONS_VERSION,
            packages: BTreeMap::new(),
            conda_packages: BTreeMap::new(),
            revoke: Vec::new(),
            remove: Vec::new(),
        }
    }
}

impl PatchInstructions {
    /// True when no package entry changed.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.conda_packages.is_empty() && self.remove.is_empty()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trip_keeps_unknown_fields() {
        let json = r#"{
            "name": "numpy",
            "version": "1.11.3",
            "build": "py36_0",
            "build_number": 0,
            "depends": ["python >=3.6,<3.7.0a0"],
            "legacy_bz2_md5": "abc123"
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "numpy");
        assert_eq!(record.extra["legacy_bz2_md5"], "abc123");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["legacy_bz2_md5"], "abc123");
        assert!(back.get("timestamp").is_none());
    }

    #[test]
    fn test_absent_vs_empty_collection() {
        let mut record = Record::default();
        assert!(record.collection(Collection::Depends).is_empty());
        assert!(record.depends.is_none());

        record.collection_mut(Collection::Depends);
        assert_eq!(record.depends, Some(vec![]));

        record.prune_collection(Collection::Depends);
        assert!(record.depends.is_none());
    }

    #[test]
    fn test_field_accessors() {
        let record = Record {
            name: "zlib".to_string(),
            version: "1.2.11".to_string(),
            build_number: Some(3),
            timestamp: None,
            ..Default::default()
        };
        assert_eq!(record.field_text("name").unwrap(), "zlib");
        assert_eq!(record.field_text("build_number").unwrap(), "3");
        assert_eq!(record.field_text("timestamp"), None);
        assert_eq!(record.field_int("build_number"), Some(3));
        assert_eq!(record.field_int("timestamp"), None);
    }

    #[test]
    fn test_index_header() {
        let index = RepoIndex::from_json(
            r#"{"info": {"subdir": "linux-64"}, "packages": {}, "packages.conda": {}}"#,
        )
        .unwrap();
        assert_eq!(index.info_subdir(), Some("linux-64"));
        assert_eq!(index.record_count(), 0);
    }

    #[test]
    fn test_instructions_default_shape() {
        let instructions = PatchInstructions::default();
        assert_eq!(
            instructions.patch_instructions_version,
            PATCH_INSTRUCTIONS_VERSION
        );
        assert!(instructions.is_empty());

        let json: Value = serde_json::from_str(&instructions.to_json().unwrap()).unwrap();
        assert!(json.get("packages.conda").is_some());
        assert!(json.get("revoke").is_some());
    }
}
