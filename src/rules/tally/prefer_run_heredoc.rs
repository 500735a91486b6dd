//! tally/prefer-run-heredoc: collapse long `&&` chains into a heredoc RUN.
//!
//! A RUN chaining many commands with `&&` reads poorly and produces long
//! continuation ladders; the heredoc form keeps one command per line.

use serde::Deserialize;

use crate::parser::{Instruction, RunInstr};
use crate::rules::{
    FixSafety, LintInput, Rule, RuleMetadata, Severity, SuggestedFix, TextEdit, Violation,
};
use crate::shell::{self, Connector, Variant};

pub const CODE: &str = "tally/prefer-run-heredoc";
pub const DOC_URL: &str =
    "https://github.com/tinovyatkin/tally/blob/main/docs/rules/tally/prefer-run-heredoc.md";

/// Default for the minimum chained commands before a RUN qualifies.
pub const DEFAULT_MIN_COMMANDS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PreferRunHeredocOptions {
    #[serde(default = "default_min_commands")]
    pub min_commands: usize,
}

fn default_min_commands() -> usize {
    DEFAULT_MIN_COMMANDS
}

impl Default for PreferRunHeredocOptions {
    fn default() -> Self {
        PreferRunHeredocOptions {
            min_commands: DEFAULT_MIN_COMMANDS,
        }
    }
}

pub struct PreferRunHeredoc;

impl Rule for PreferRunHeredoc {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            fix_priority: 90,
            ..RuleMetadata::new(
                CODE,
                "Prefer heredoc form for long RUN chains",
                "Chains of several commands read better as a heredoc RUN with one command per line",
                DOC_URL,
                Severity::Info,
                "style",
            )
        }
    }

    fn validate_options(&self, options: &toml::Table) -> Result<(), String> {
        toml::Value::Table(options.clone())
            .try_into::<PreferRunHeredocOptions>()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn options_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": {
                "min-commands": {
                    "type": "integer",
                    "minimum": 2,
                    "default": DEFAULT_MIN_COMMANDS,
                    "description": "Minimum chained commands before a RUN qualifies"
                }
            },
            "additionalProperties": false
        }))
    }

    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        let meta = self.metadata();
        let min_commands = input.heredoc_min_commands;
        let mut violations = Vec::new();

        for stage in input.stages() {
            let variant = input.shell_variant(stage.index);
            if variant.is_non_posix() {
                continue;
            }

            for cmd in &stage.commands {
                let Instruction::Run(run) = cmd else { continue };
                if !run.prepend_shell() || !run.heredocs.is_empty() {
                    continue;
                }
                let cmd_str = run.command_string();
                if !shell::is_heredoc_candidate(&cmd_str, variant, min_commands) {
                    continue;
                }

                let mut violation = Violation::new(
                    run.span.to_location(input.file),
                    meta.code,
                    "collapse this command chain into a heredoc RUN (one command per line)",
                    meta.default_severity,
                )
                .with_doc_url(meta.doc_url);

                if let Some(fix) =
                    build_heredoc_fix(input, run, &cmd_str, variant, meta.fix_priority)
                {
                    violation = violation.with_suggested_fix(fix);
                }

                violations.push(violation);
            }
        }

        violations
    }
}

/// Rewrites the instruction as `RUN <<EOF … EOF`. Withheld when the chain
/// contains `||` branches, whose short-circuit shape a line-per-command
/// script does not preserve.
fn build_heredoc_fix(
    input: &LintInput<'_>,
    run: &RunInstr,
    cmd_str: &str,
    variant: Variant,
    priority: i32,
) -> Option<SuggestedFix> {
    let script = shell::parse(cmd_str, variant).ok()?;
    if script
        .items
        .iter()
        .any(|item| item.connector == Connector::Or)
    {
        return None;
    }

    let mut body = Vec::new();
    let uses_and = script
        .items
        .iter()
        .any(|item| item.connector == Connector::And);
    if uses_and {
        // Preserve stop-on-failure semantics of the && chain.
        body.push("set -e".to_string());
    }
    for item in &script.items {
        body.push(cmd_str[item.start_byte..item.end_byte].trim().to_string());
    }

    let new_text = format!("RUN <<EOF\n{}\nEOF", body.join("\n"));

    Some(SuggestedFix {
        description: "Rewrite as heredoc RUN".to_string(),
        safety: FixSafety::Suggestion,
        priority,
        edits: vec![TextEdit {
            location: run.span.to_location(input.file),
            new_text,
        }],
        is_preferred: false,
        needs_resolve: false,
    })
}
