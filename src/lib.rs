// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # repatch — retroactive dependency patching for package indexes
//!
//! Rewrites metadata records in a package repository index to fix
//! dependency declarations without rebuilding packages. Given an existing
//! index plus a declarative rule set, it produces a new index and a set
//! of patch instructions describing changed/added fields per package,
//! later applied by the archive's indexing tool.
//!
//! ## Core Concept
//!
//! A **rule** pairs an `if` predicate (which records does this apply to?)
//! with a `then` list of mutation operations (what changes?). Rules are
//! plain YAML:
//!
//! ```yaml
//! if:
//!   name: numpy
//!   version_lt: "1.12"
//!   subdir_in: [linux-64, osx-64]
//! then:
//!   - remove_depends: mkl?( *)
//!   - add_depends: nomkl
//!   - tighten_depends:
//!       name: python
//!       max_pin: x.x
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use repatch::{PatchEngine, RepoIndex, RuleSet};
//!
//! let rules = RuleSet::load_dir(Path::new("rules"))?;
//! let index = RepoIndex::from_json(&std::fs::read_to_string("repodata.json")?)?;
//!
//! let engine = PatchEngine::new(rules);
//! let outcome = engine.run(&index, "linux-64")?;
//!
//! println!("{}", outcome.instructions.to_json()?);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                                                              │
//! │  RULES (YAML)                                                │
//! │       │                                                      │
//! │       └──► RuleSet::load_dir ──► ordered RuleSet             │
//! │                                        │                     │
//! │  INDEX (JSON)                          ▼                     │
//! │       │                    PatchEngine::run(index, subdir)   │
//! │       │                                │                     │
//! │       │            per (record, rule): │                     │
//! │       │              predicate::matches ──► mutate::apply    │
//! │       │                                │                     │
//! │       └──► snapshot ──► diff ◄─────────┘                     │
//! │                          │                                   │
//! │                          └──► PatchInstructions (JSON)       │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine never performs network I/O, decompression, or instruction
//! application; those belong to the surrounding tooling. It also never
//! solves constraints: rules are applied syntactically and
//! deterministically, nothing validates that a mutated range is
//! installable.

// Core data model
pub mod depends;
pub mod error;
pub mod record;
pub mod rule;
pub mod ruleset;

// Leaf algebra
pub mod pattern;
pub mod template;
pub mod version;

// Evaluation pipeline
pub mod engine;
pub mod mutate;
pub mod predicate;

// Re-exports
pub use depends::{dep_name, DepSpec};
pub use engine::{diff_record, gen_patch_instructions, PatchEngine, PatchOutcome};
pub use error::{Error, Result};
pub use record::{
    Collection, PatchInstructions, Record, RepoIndex, PATCH_INSTRUCTIONS_VERSION,
};
pub use rule::{
    BoundParams, CmpOp, CmpValue, CondTest, Condition, Operation, RelaxParams, Replacement, Rule,
    RuleDoc,
};
pub use ruleset::{validate_path, RuleIssue, RuleSet, RuleValidationResult, Severity};
pub use version::{upper_bound, VersionRange};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
