//! tally/prefer-add-unpack: use `ADD --unpack` instead of downloading and
//! extracting remote archives in RUN.
//!
//! `ADD --unpack` is a BuildKit feature that downloads and extracts a
//! remote archive in a single layer, reducing image size and build
//! complexity. Only tar-based extraction is detected: ADD --unpack does not
//! handle single-file decompressors (gunzip, bunzip2, …).

use std::collections::BTreeSet;

use crate::parser::{Instruction, RunInstr};
use crate::rules::{
    FixSafety, LintInput, Rule, RuleMetadata, Severity, SuggestedFix, TextEdit, Violation,
};
use crate::semantic::StageInfo;
use crate::shell::{self, Variant};

pub const CODE: &str = "tally/prefer-add-unpack";
pub const DOC_URL: &str =
    "https://github.com/tinovyatkin/tally/blob/main/docs/rules/tally/prefer-add-unpack.md";

/// Command names allowed in a RUN eligible for the whole-instruction
/// replacement fix. Anything else in the chain would be silently dropped
/// by the rewrite, so the fix is withheld.
const ALLOWED_FIX_COMMANDS: &[&str] = &["curl", "wget", "tar", "rm"];

pub struct PreferAddUnpack;

impl Rule for PreferAddUnpack {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            fix_priority: 95,
            ..RuleMetadata::new(
                CODE,
                "Prefer ADD --unpack for remote archives",
                "Use `ADD --unpack` instead of downloading and extracting remote archives in `RUN`",
                DOC_URL,
                Severity::Info,
                "performance",
            )
        }
    }

    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        let meta = self.metadata();
        let mut violations = Vec::new();

        for stage in input.stages() {
            let variant = input.shell_variant(stage.index);
            if variant.is_non_posix() {
                continue;
            }
            let info = input.semantic.stage_info(stage.index);

            for cmd in &stage.commands {
                let Instruction::Run(run) = cmd else { continue };
                if !run.prepend_shell() {
                    continue;
                }
                let cmd_str = run.command_string();
                if !has_remote_archive_extraction(&cmd_str, variant) {
                    continue;
                }

                let mut violation = Violation::new(
                    run.span.to_location(input.file),
                    meta.code,
                    "use `ADD --unpack <url> <dest>` instead of downloading and extracting in `RUN`",
                    meta.default_severity,
                )
                .with_doc_url(meta.doc_url)
                .with_detail(
                    "Instead of using curl/wget to download an archive and extracting it in a `RUN` command, \
                     use `ADD --unpack <url> <dest>` which downloads and extracts in a single layer. \
                     This reduces image size and build complexity. Requires BuildKit.",
                );

                if let Some(fix) =
                    build_add_unpack_fix(input, run, &cmd_str, variant, info, meta.fix_priority)
                {
                    violation = violation.with_suggested_fix(fix);
                }

                violations.push(violation);
            }
        }

        violations
    }
}

/// True when the command downloads a remote archive and extracts it with
/// tar.
fn has_remote_archive_extraction(cmd_str: &str, variant: Variant) -> bool {
    let downloads = shell::find_commands(cmd_str, variant, shell::DOWNLOAD_COMMANDS);
    if downloads.is_empty() {
        return false;
    }
    if !downloads
        .iter()
        .any(|dl| dl.args.iter().any(|a| shell::is_archive_url(a)))
    {
        return false;
    }

    shell::find_commands(cmd_str, variant, &["tar"])
        .iter()
        .any(shell::is_tar_extract)
}

/// Builds the whole-instruction replacement. Only simple chains qualify:
/// every command must be one whose effect `ADD --unpack` reproduces.
fn build_add_unpack_fix(
    input: &LintInput<'_>,
    run: &RunInstr,
    cmd_str: &str,
    variant: Variant,
    info: Option<&StageInfo>,
    priority: i32,
) -> Option<SuggestedFix> {
    let names: BTreeSet<String> = shell::command_names(cmd_str, variant).into_iter().collect();
    if !names.iter().all(|n| ALLOWED_FIX_COMMANDS.contains(&n.as_str())) {
        return None;
    }

    let downloads = shell::find_commands(cmd_str, variant, shell::DOWNLOAD_COMMANDS);
    let url = downloads.iter().find_map(|dl| {
        dl.args
            .iter()
            .find(|a| shell::is_archive_url(a))
            .map(|s| s.to_string())
    })?;

    let tar_cmds = shell::find_commands(cmd_str, variant, &["tar"]);
    let extract = tar_cmds.iter().find(|c| shell::is_tar_extract(c))?;
    let dest = shell::tar_destination(extract)
        .map(|d| d.to_string())
        .unwrap_or_else(|| {
            info.map(|i| i.workdir_at(run.span.start.line).to_string())
                .unwrap_or_else(|| "/".to_string())
        });

    Some(SuggestedFix {
        description: format!("Replace with ADD --unpack {url} {dest}"),
        safety: FixSafety::Suggestion,
        priority,
        edits: vec![TextEdit {
            location: run.span.to_location(input.file),
            new_text: format!("ADD --unpack {url} {dest}"),
        }],
        is_preferred: false,
        needs_resolve: false,
    })
}

#[cfg(test)]
mod tests {
    use crate::rules::testutil::check_rule;
    use crate::rules::FixSafety;

    #[test]
    fn test_curl_pipe_tar_flagged() {
        let source = "FROM alpine\nRUN curl -sL https://example.org/app.tar.gz | tar -xz -C /opt\n";
        let violations = check_rule("tally/prefer-add-unpack", source);
        assert_eq!(violations.len(), 1);
        let fix = violations[0].suggested_fix.as_ref().expect("expected fix");
        assert_eq!(fix.safety, FixSafety::Suggestion);
        assert_eq!(fix.priority, 95);
        assert_eq!(
            fix.edits[0].new_text,
            "ADD --unpack https://example.org/app.tar.gz /opt"
        );
    }

    #[test]
    fn test_download_then_extract_flagged() {
        let source = "FROM alpine\nRUN wget https://example.org/app.tar.gz && tar -xzf app.tar.gz && rm app.tar.gz\n";
        let violations = check_rule("tally/prefer-add-unpack", source);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].suggested_fix.is_some());
    }

    #[test]
    fn test_dest_falls_back_to_workdir() {
        let source = "FROM alpine\nWORKDIR /srv\nRUN curl -sL https://example.org/app.tar.gz | tar -xz\n";
        let violations = check_rule("tally/prefer-add-unpack", source);
        let fix = violations[0].suggested_fix.as_ref().expect("expected fix");
        assert!(fix.edits[0].new_text.ends_with(" /srv"));
    }

    #[test]
    fn test_fix_withheld_for_extra_commands() {
        // The chain does more than download+extract; a rewrite would drop
        // the chmod.
        let source = "FROM alpine\nRUN curl -sL https://example.org/app.tar.gz | tar -xz -C /opt && chmod +x /opt/app\n";
        let violations = check_rule("tally/prefer-add-unpack", source);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].suggested_fix.is_none());
    }

    #[test]
    fn test_plain_download_not_flagged() {
        let source = "FROM alpine\nRUN curl -o /bin/tool https://example.org/tool\n";
        assert!(check_rule("tally/prefer-add-unpack", source).is_empty());
    }

    #[test]
    fn test_local_archive_not_flagged() {
        let source = "FROM alpine\nRUN tar -xzf /tmp/app.tar.gz -C /opt\n";
        assert!(check_rule("tally/prefer-add-unpack", source).is_empty());
    }

    #[test]
    fn test_non_archive_url_not_flagged() {
        let source = "FROM alpine\nRUN curl -sL https://example.org/install.sh | sh\n";
        assert!(check_rule("tally/prefer-add-unpack", source).is_empty());
    }
}
