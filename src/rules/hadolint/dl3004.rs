//! DL3004: do not use sudo.

use crate::parser::Instruction;
use crate::rules::{LintInput, Rule, RuleMetadata, Severity, Violation};
use crate::shell;

pub const CODE: &str = "hadolint/DL3004";
pub const DOC_URL: &str = "https://github.com/hadolint/hadolint/wiki/DL3004";

pub struct Dl3004;

impl Rule for Dl3004 {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            CODE,
            "Do not use sudo",
            "Do not use sudo as it has unpredictable behavior in containers",
            DOC_URL,
            Severity::Error,
            "security",
        )
    }

    /// Warns on any RUN containing a sudo invocation. Skips stages using
    /// non-POSIX shells.
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
                if shell::contains_command_with_variant(&cmd_str, "sudo", variant) {
                    violations.push(
                        Violation::new(
                            run.span.to_location(input.file),
                            meta.code,
                            "do not use sudo in RUN commands; it has unpredictable TTY and signal handling",
                            meta.default_severity,
                        )
                        .with_doc_url(meta.doc_url)
                        .with_detail(
                            "sudo is designed for interactive use and doesn't work reliably in containers. \
                             Instead, use the USER instruction to switch users, or run specific commands \
                             as a different user with 'su -c' if necessary.",
                        ),
                    );
                }
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use crate::rules::testutil::check_rule;

    #[test]
    fn test_flags_sudo() {
        let violations = check_rule("hadolint/DL3004", "FROM alpine\nRUN sudo apk add curl\n");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].location.start.line, 2);
        assert_eq!(violations[0].severity, crate::rules::Severity::Error);
    }

    #[test]
    fn test_clean_run_passes() {
        assert!(check_rule("hadolint/DL3004", "FROM alpine\nRUN apk add curl\n").is_empty());
    }

    #[test]
    fn test_sudo_in_string_not_flagged() {
        assert!(
            check_rule("hadolint/DL3004", "FROM alpine\nRUN echo 'sudo is bad'\n").is_empty()
        );
    }

    #[test]
    fn test_sudo_in_chain() {
        let violations = check_rule(
            "hadolint/DL3004",
            "FROM alpine\nRUN apk update && sudo apk add curl\n",
        );
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_non_posix_stage_skipped() {
        let source = "FROM windows\nSHELL [\"pwsh\", \"-Command\"]\nRUN sudo something\n";
        assert!(check_rule("hadolint/DL3004", source).is_empty());
    }
}
