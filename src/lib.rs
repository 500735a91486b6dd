//! tally - static linter for container build files.
//!
//! tally parses Dockerfile / Containerfile syntax, builds a semantic model
//! of stages and variables, runs a registry of rules against that model,
//! optionally applies auto-fixes by rewriting the source text, and emits
//! diagnostics in several human- and machine-readable formats.
//!
//! # Architecture
//!
//! The lint kernel is a layered pipeline; data flows strictly downstream
//! and rules never re-enter the parser:
//!
//! - `parser`: source bytes → typed instructions, stages, meta-ARGs,
//!   parser warnings
//! - `directives`: comment scanning for suppress/ignore directives
//! - `semantic`: variable scopes, shell settings, base-image and
//!   COPY --from references, construction issues
//! - `rules`: the rule interface, the registry, and the rule set
//!   (hadolint/, buildkit/, tally/ namespaces)
//! - `shell`: shell-command analysis for RUN instructions
//! - `process`: the violation processor chain (severity override, enable
//!   filter, directive suppression, dedup, sort)
//! - `fix`: the text-edit engine with conflict resolution
//! - `report`: pretty / text / JSON / SARIF output
//! - `lint`: the per-file pipeline driver
//! - `cli` / `config`: the command surface and `.tally.toml` handling
//!
//! # Adding a New Rule
//!
//! Implement [`rules::Rule`], give it a namespaced code, and add its
//! constructor to the registration list in `rules::Registry::build`.

pub mod cli;
pub mod config;
pub mod directives;
pub mod error;
pub mod fix;
pub mod lint;
pub mod parser;
pub mod process;
pub mod report;
pub mod rules;
pub mod semantic;
pub mod shell;

pub use config::Config;
pub use error::Error;
pub use fix::{FixOptions, FixOutcome, SkipReason};
pub use lint::{CancelToken, FileReport, Linter};
pub use rules::{registry, FixSafety, Location, Position, Severity, SuggestedFix, Violation};
pub use semantic::Model;
