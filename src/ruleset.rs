//! Rule-set loading and pre-flight validation
//!
//! Rules load once, at startup, from a directory of YAML files (or a
//! single file) into one ordered collection: files in lexicographic
//! order, documents in file order. Multi-document files are supported;
//! documents without content are skipped. The loaded [`RuleSet`] is an
//! explicit value the orchestrator passes by reference; there is no
//! ambient global.
//!
//! Validation is a distinct, earlier failure stage from rule application:
//! a document that fails here never reaches the evaluator/executor.

use crate::error::{Error, Result};
use crate::rule::{Rule, RuleDoc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An ordered, immutable collection of loaded rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    hash: String,
}

impl RuleSet {
    /// Load every `*.yaml`/`*.yml` file under a directory, in
    /// lexicographic file order.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let files = yaml_files(dir)?;
        let mut rules = Vec::new();
        let mut hasher = Sha256::new();
        for file in &files {
            let content = fs::read_to_string(file)?;
            hasher.update(content.as_bytes());
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("<rule file>");
            rules.extend(parse_documents(&content, name)?);
        }
        debug!(
            files = files.len(),
            rules = rules.len(),
            "loaded rule set"
        );
        Ok(RuleSet {
            rules,
            hash: digest(hasher),
        })
    }

    /// Load a single rule file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<rule file>");
        Ok(RuleSet {
            rules: parse_documents(&content, name)?,
            hash: digest(hasher),
        })
    }

    /// Load a directory or single file, whichever `path` is.
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Self::load_file(path)
        }
    }

    /// Parse rules from in-memory YAML. Used by tests and embedders.
    pub fn from_yaml(content: &str, source: &str) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Ok(RuleSet {
            rules: parse_documents(content, source)?,
            hash: digest(hasher),
        })
    }

    /// Rules in application order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Content hash of the loaded rule files, for change detection.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

fn digest(hasher: Sha256) -> String {
    format!("sha256:{}", hex::encode(&hasher.finalize()[..8]))
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let ext = path.extension().and_then(|e| e.to_str());
        if path.is_file() && matches!(ext, Some("yaml") | Some("yml")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse every document in one YAML file. Empty documents are skipped.
fn parse_documents(content: &str, source: &str) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for (idx, doc) in serde_norway::Deserializer::from_str(content).enumerate() {
        let provenance = format!("{}#{}", source, idx);
        let value = serde_json::Value::deserialize(doc)
            .map_err(|e| Error::RuleParse(format!("{}: {}", provenance, e)))?;
        if value.is_null() {
            continue;
        }
        let doc: RuleDoc = serde_json::from_value(value)
            .map_err(|e| Error::RuleParse(format!("{}: {}", provenance, e)))?;
        rules.push(Rule::from_doc(&doc, &provenance)?);
    }
    Ok(rules)
}

/// Severity level for validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A validation issue found in a rule file
#[derive(Debug, Clone)]
pub struct RuleIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub file: String,
}

impl RuleIssue {
    fn error(code: &str, message: String, file: &str) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            message,
            file: file.to_string(),
        }
    }

    fn warning(code: &str, message: String, file: &str) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            message,
            file: file.to_string(),
        }
    }
}

/// Result of pre-flight rule validation
#[derive(Debug, Default)]
pub struct RuleValidationResult {
    pub issues: Vec<RuleIssue>,
    pub files_checked: usize,
    pub rules_parsed: usize,
}

impl RuleValidationResult {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }
}

/// Validate a rules directory or file without aborting on the first
/// problem. Collects one issue per offending document.
pub fn validate_path(path: &Path) -> RuleValidationResult {
    let mut result = RuleValidationResult::default();

    if path.is_dir() {
        match yaml_files(path) {
            Ok(files) => {
                if files.is_empty() {
                    result.issues.push(RuleIssue::warning(
                        "W003",
                        "no rule files found".to_string(),
                        &path.display().to_string(),
                    ));
                }
                for file in files {
                    validate_file(&file, &mut result);
                }
            }
            Err(e) => result.issues.push(RuleIssue::error(
                "E001",
                format!("cannot list directory: {}", e),
                &path.display().to_string(),
            )),
        }
    } else {
        validate_file(path, &mut result);
    }
    result
}

fn validate_file(path: &Path, result: &mut RuleValidationResult) {
    let file_str = path.display().to_string();
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            result.issues.push(RuleIssue::error(
                "E002",
                format!("cannot read file: {}", e),
                &file_str,
            ));
            return;
        }
    };
    result.files_checked += 1;

    let mut documents = 0;
    for (idx, doc) in serde_norway::Deserializer::from_str(&content).enumerate() {
        let source = format!("{}#{}", file_str, idx);
        let value = match serde_json::Value::deserialize(doc) {
            Ok(v) => v,
            Err(e) => {
                result.issues.push(RuleIssue::error(
                    "E003",
                    format!("invalid YAML: {}", e),
                    &source,
                ));
                // the stream is unreliable past a syntax error
                break;
            }
        };
        if value.is_null() {
            continue;
        }
        documents += 1;

        let doc: RuleDoc = match serde_json::from_value(value) {
            Ok(d) => d,
            Err(e) => {
                result.issues.push(RuleIssue::error(
                    "E004",
                    format!("schema violation: {}", e),
                    &source,
                ));
                continue;
            }
        };
        match Rule::from_doc(&doc, &source) {
            Ok(rule) => {
                result.rules_parsed += 1;
                if rule.conditions.is_empty() {
                    result.issues.push(RuleIssue::warning(
                        "W001",
                        "empty 'if' matches every record".to_string(),
                        &source,
                    ));
                }
            }
            Err(e) => {
                result
                    .issues
                    .push(RuleIssue::error("E005", e.to_string(), &source));
            }
        }
    }

    if documents == 0 {
        result.issues.push(RuleIssue::warning(
            "W002",
            "no rule documents in file".to_string(),
            &file_str,
        ));
    }
}
