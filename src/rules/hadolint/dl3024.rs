//! DL3024: FROM stage names must be unique.
//!
//! Detected during semantic model construction when stage aliases are
//! registered; surfaced here like any other rule's violations.

use crate::rules::{LintInput, Rule, RuleMetadata, Severity, Violation};

pub const CODE: &str = "hadolint/DL3024";
pub const DOC_URL: &str = "https://github.com/hadolint/hadolint/wiki/DL3024";

/// Formats the error message for a duplicate stage name.
pub fn message(stage_name: &str, existing_stage_index: usize) -> String {
    format!("Stage name {stage_name:?} is already used on stage {existing_stage_index}")
}

pub struct Dl3024;

impl Rule for Dl3024 {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            CODE,
            "Duplicate stage name",
            "FROM aliases (stage names) must be unique",
            DOC_URL,
            Severity::Error,
            "correctness",
        )
    }

    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        input
            .semantic
            .construction_issues()
            .iter()
            .filter(|v| v.rule_code == CODE)
            .cloned()
            .collect()
    }
}
