//! DL3027: do not use apt.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::{Instruction, RunInstr};
use crate::rules::{
    FixSafety, LintInput, Location, Rule, RuleMetadata, Severity, SuggestedFix, TextEdit,
    Violation,
};
use crate::shell::{self, Variant};

pub const CODE: &str = "hadolint/DL3027";
pub const DOC_URL: &str = "https://github.com/hadolint/hadolint/wiki/DL3027";

/// apt subcommands whose apt-get spelling is identical; only these get a
/// suggested fix.
const APT_GET_VERBS: &[&str] = &[
    "install",
    "update",
    "upgrade",
    "full-upgrade",
    "dist-upgrade",
    "remove",
    "purge",
    "autoremove",
];

/// Matches the `apt` token at a word boundary in an instruction line.
static APT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s;&|(])(apt)(?:\s)").unwrap());

pub struct Dl3027;

impl Rule for Dl3027 {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            CODE,
            "Do not use apt",
            "Do not use apt as it is meant to be an end-user tool, use apt-get or apt-cache instead",
            DOC_URL,
            Severity::Warning,
            "style",
        )
    }

    /// Warns when any RUN invokes apt. Skips stages with non-POSIX shells.
    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        let meta = self.metadata();
        let mut violations = Vec::new();

        for stage in input.stages() {
            let variant = input.shell_variant(stage.index);
            if variant.is_non_posix() {
                continue;
            }

            for cmd in &stage.commands {
                let Instruction::Run(run) = cmd else { continue };
                let cmd_str = run.command_string();
                if !shell::contains_command_with_variant(&cmd_str, "apt", variant) {
                    continue;
                }

                let mut violation = Violation::new(
                    run.span.to_location(input.file),
                    meta.code,
                    "do not use apt as it is meant to be an end-user tool, use apt-get or apt-cache instead",
                    meta.default_severity,
                )
                .with_doc_url(meta.doc_url)
                .with_detail(
                    "The apt command is designed for interactive use and has an unstable command-line interface. \
                     For scripting and automation (like Dockerfiles), use apt-get for package management \
                     or apt-cache for querying package information.",
                );

                if let Some(fix) = suggest_apt_get_fix(input, run, &cmd_str, variant) {
                    violation = violation.with_suggested_fix(fix);
                }

                violations.push(violation);
            }
        }

        violations
    }
}

/// Builds a fix replacing `apt` with `apt-get` when every apt invocation in
/// the RUN uses a verb apt-get spells identically.
fn suggest_apt_get_fix(
    input: &LintInput<'_>,
    run: &RunInstr,
    cmd_str: &str,
    variant: Variant,
) -> Option<SuggestedFix> {
    let invocations = shell::find_commands(cmd_str, variant, &["apt"]);
    if invocations.is_empty()
        || !invocations.iter().all(|c| {
            c.subcommand
                .as_deref()
                .is_some_and(|verb| APT_GET_VERBS.contains(&verb))
        })
    {
        return None;
    }

    let sm = input.source_map();
    let mut edits = Vec::new();
    for line in run.span.start.line..=run.span.end.line {
        let Some(text) = sm.line(line) else { continue };
        for caps in APT_TOKEN.captures_iter(text) {
            let m = caps.get(1).expect("group 1 always present");
            edits.push(TextEdit {
                location: Location::range(input.file, line, m.start(), line, m.end()),
                new_text: "apt-get".to_string(),
            });
        }
    }
    if edits.is_empty() {
        return None;
    }

    Some(SuggestedFix {
        description: "Replace apt with apt-get".to_string(),
        safety: FixSafety::Suggestion,
        priority: 0,
        edits,
        is_preferred: true,
        needs_resolve: false,
    })
}
