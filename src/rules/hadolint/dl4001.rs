//! DL4001: either wget or curl, not both.

use crate::parser::Instruction;
use crate::rules::{LintInput, Location, Rule, RuleMetadata, Severity, Violation};
use crate::shell;

pub const CODE: &str = "hadolint/DL4001";
pub const DOC_URL: &str = "https://github.com/hadolint/hadolint/wiki/DL4001";

pub struct Dl4001;

impl Rule for Dl4001 {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            CODE,
            "Either wget or curl but not both",
            "Either use wget or curl but not both to reduce image size",
            DOC_URL,
            Severity::Warning,
            "maintainability",
        )
    }

    /// Warns when both wget and curl appear across the file's RUN
    /// instructions; reports on the curl usages.
    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        let meta = self.metadata();
        let mut wget_locs: Vec<Location> = Vec::new();
        let mut curl_locs: Vec<Location> = Vec::new();

        for stage in input.stages() {
            let variant = input.shell_variant(stage.index);
            if variant.is_non_posix() {
                continue;
            }
            for cmd in &stage.commands {
                let Instruction::Run(run) = cmd else { continue };
                let cmd_str = run.command_string();
                let loc = run.span.to_location(input.file);
                if shell::contains_command_with_variant(&cmd_str, "wget", variant) {
                    wget_locs.push(loc.clone());
                }
                if shell::contains_command_with_variant(&cmd_str, "curl", variant) {
                    curl_locs.push(loc);
                }
            }
        }

        if wget_locs.is_empty() || curl_locs.is_empty() {
            return Vec::new();
        }

        curl_locs
            .into_iter()
            .map(|loc| {
                Violation::new(
                    loc,
                    meta.code,
                    "both wget and curl are used; pick one to reduce image size and complexity",
                    meta.default_severity,
                )
                .with_doc_url(meta.doc_url)
                .with_detail(
                    "Using both wget and curl increases image size and maintenance burden. \
                     Standardize on one tool. curl is generally preferred in containers \
                     due to better scripting support and broader protocol support.",
                )
            })
            .collect()
    }
}
