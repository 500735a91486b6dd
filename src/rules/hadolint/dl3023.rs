//! DL3023: COPY --from should not reference its own stage.
//!
//! Detected during semantic model construction; this rule surfaces the
//! construction issues so severity overrides, enable filtering, and
//! directive suppression treat them like any other violation.

use crate::rules::{LintInput, Rule, RuleMetadata, Severity, Violation};

pub const CODE: &str = "hadolint/DL3023";
pub const DOC_URL: &str = "https://github.com/hadolint/hadolint/wiki/DL3023";

/// Formats the error message for a self-referencing COPY --from.
pub fn message(stage_name: &str, copy_from: &str) -> String {
    format!("COPY --from={copy_from} references its own stage {stage_name:?}")
}

pub struct Dl3023;

impl Rule for Dl3023 {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            CODE,
            "COPY --from references own stage",
            "COPY --from should reference a previously defined stage, not its own",
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
