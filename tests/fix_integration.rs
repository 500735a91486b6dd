//! Integration tests for the fix engine driven through the full pipeline:
//! lint, apply fixes, re-lint the rewritten source.

use tally::{Config, FixOptions, FixSafety, Linter};

fn fixing_linter(threshold: FixSafety) -> Linter {
    Linter::new(Config::default()).with_fix(FixOptions {
        safety_threshold: threshold,
        rule_filter: None,
    })
}

fn lint_and_fix(source: &str, threshold: FixSafety) -> tally::FileReport {
    fixing_linter(threshold).lint_source("Dockerfile", source)
}

#[test]
fn test_stage_name_casing_round_trip() {
    let source = "FROM alpine:3.19 AS Builder\nFROM Builder\nCOPY --from=Builder /a /b\n";
    let report = lint_and_fix(source, FixSafety::Safe);
    let fix = report.fix.expect("fix outcome expected");
    assert!(fix.changed());
    assert_eq!(
        fix.modified,
        "FROM alpine:3.19 AS builder\nFROM builder\nCOPY --from=builder /a /b\n"
    );

    // Re-linting the rewritten source yields zero StageNameCasing
    // violations and no dangling stage references.
    let relint = Linter::new(Config::default()).lint_source("Dockerfile", &fix.modified);
    assert!(
        !relint
            .violations
            .iter()
            .any(|v| v.rule_code == "buildkit/StageNameCasing"),
        "got {:?}",
        relint.violations
    );
    assert!(
        !relint
            .violations
            .iter()
            .any(|v| v.rule_code == "hadolint/DL3023"),
        "rewrite must not introduce dangling references"
    );
}

#[test]
fn test_from_as_casing_round_trip() {
    let source = "FROM alpine:3.19 as builder\nFROM scratch\nCOPY --from=builder /a /b\n";
    let report = lint_and_fix(source, FixSafety::Safe);
    let fix = report.fix.expect("fix outcome expected");
    assert!(fix.modified.starts_with("FROM alpine:3.19 AS builder\n"));

    let relint = Linter::new(Config::default()).lint_source("Dockerfile", &fix.modified);
    assert!(!relint
        .violations
        .iter()
        .any(|v| v.rule_code == "buildkit/FromAsCasing"));
}

#[test]
fn test_safe_threshold_skips_suggestions() {
    let source = "FROM debian:12\nRUN apt install -y curl\n";
    let report = lint_and_fix(source, FixSafety::Safe);
    let fix = report.fix.expect("fix outcome expected");
    // The apt→apt-get rewrite is a Suggestion; at the Safe threshold it is
    // recorded as skipped.
    assert!(!fix.changed());
    assert!(fix
        .skipped
        .iter()
        .any(|s| s.rule_code == "hadolint/DL3027" && s.reason == tally::SkipReason::Safety));
}

#[test]
fn test_suggestion_threshold_applies_apt_fix() {
    let source = "FROM debian:12\nRUN apt install -y curl\n";
    let report = lint_and_fix(source, FixSafety::Suggestion);
    let fix = report.fix.expect("fix outcome expected");
    assert!(fix.modified.contains("RUN apt-get install -y curl"));

    let relint = Linter::new(Config::default()).lint_source("Dockerfile", &fix.modified);
    assert!(!relint
        .violations
        .iter()
        .any(|v| v.rule_code == "hadolint/DL3027"));
}

#[test]
fn test_pipefail_fix_inserts_shell_line() {
    let source = "FROM alpine:3.19\nRUN cat /etc/os-release | grep VERSION\n";
    let report = lint_and_fix(source, FixSafety::Suggestion);
    let fix = report.fix.expect("fix outcome expected");
    assert_eq!(
        fix.modified,
        "FROM alpine:3.19\nSHELL [\"/bin/ash\", \"-o\", \"pipefail\", \"-c\"]\nRUN cat /etc/os-release | grep VERSION\n"
    );

    let relint = Linter::new(Config::default()).lint_source("Dockerfile", &fix.modified);
    assert!(!relint
        .violations
        .iter()
        .any(|v| v.rule_code == "hadolint/DL4006"));
}

#[test]
fn test_fix_engine_idempotent() {
    let sources = [
        "FROM alpine:3.19 AS Builder\nFROM Builder\n",
        "FROM alpine:3.19 as builder\nFROM scratch\nCOPY --from=builder /a /b\n",
        "FROM debian:12\nRUN apt install -y curl\n",
        "FROM alpine:3.19\nRUN cat /etc/os-release | grep VERSION\n",
    ];
    for source in sources {
        let first = lint_and_fix(source, FixSafety::Suggestion)
            .fix
            .expect("fix outcome expected");
        let second = lint_and_fix(&first.modified, FixSafety::Suggestion)
            .fix
            .expect("fix outcome expected");
        assert_eq!(
            second.modified, first.modified,
            "second pass over {source:?} must not change the source again"
        );
    }
}

#[test]
fn test_add_unpack_replaces_whole_instruction() {
    let source = "FROM alpine:3.19\nRUN curl -sL https://example.invalid/app.tar.gz | tar -xz -C /opt\n";
    let report = lint_and_fix(source, FixSafety::Suggestion);
    let fix = report.fix.expect("fix outcome expected");
    assert_eq!(
        fix.modified,
        "FROM alpine:3.19\nADD --unpack https://example.invalid/app.tar.gz /opt\n"
    );

    let relint = Linter::new(Config::default()).lint_source("Dockerfile", &fix.modified);
    assert!(!relint
        .violations
        .iter()
        .any(|v| v.rule_code == "tally/prefer-add-unpack"));
}

#[test]
fn test_conflicting_fixes_resolved_by_priority() {
    // This RUN triggers both prefer-add-unpack (whole-instruction rewrite,
    // priority 95) and DL4006 (insert SHELL, priority 0) at overlapping
    // positions; the higher-priority rewrite wins.
    let source = "FROM alpine:3.19\nRUN curl -sL https://example.invalid/app.tar.gz | tar -xz -C /opt\n";
    let report = lint_and_fix(source, FixSafety::Suggestion);
    let fix = report.fix.expect("fix outcome expected");
    assert!(fix.modified.contains("ADD --unpack"));
    assert!(fix
        .applied
        .iter()
        .any(|a| a.rule_code == "tally/prefer-add-unpack"));
}

#[test]
fn test_fix_mode_never_respected() {
    let config: Config =
        toml::from_str("[rules.\"hadolint/DL3027\"]\nfix = \"never\"\n").unwrap();
    let report = Linter::new(config)
        .with_fix(FixOptions {
            safety_threshold: FixSafety::Suggestion,
            rule_filter: None,
        })
        .lint_source("Dockerfile", "FROM debian:12\nRUN apt install -y curl\n");
    let fix = report.fix.expect("fix outcome expected");
    assert!(!fix.changed());
    assert!(fix
        .skipped
        .iter()
        .any(|s| s.reason == tally::SkipReason::ModePolicy));
}

#[test]
fn test_fix_rule_filter() {
    let source = "FROM alpine:3.19 AS Builder\nFROM Builder\nRUN cat /x | grep y\n";
    let report = Linter::new(Config::default())
        .with_fix(FixOptions {
            safety_threshold: FixSafety::Suggestion,
            rule_filter: Some(
                ["buildkit/StageNameCasing".to_string()].into_iter().collect(),
            ),
        })
        .lint_source("Dockerfile", source);
    let fix = report.fix.expect("fix outcome expected");
    assert!(fix.modified.contains("AS builder"));
    // The pipefail fix was filtered out.
    assert!(!fix.modified.contains("pipefail"));
    assert!(fix
        .skipped
        .iter()
        .any(|s| s.rule_code == "hadolint/DL4006" && s.reason == tally::SkipReason::RuleFilter));
}

#[test]
fn test_heredoc_rewrite_round_trip() {
    let source = "FROM alpine:3.19\nRUN apk update && apk add curl && rm -rf /var/cache/apk\n";
    let report = lint_and_fix(source, FixSafety::Suggestion);
    let fix = report.fix.expect("fix outcome expected");
    assert_eq!(
        fix.modified,
        "FROM alpine:3.19\nRUN <<EOF\nset -e\napk update\napk add curl\nrm -rf /var/cache/apk\nEOF\n"
    );

    // The rewritten heredoc form parses and no longer triggers the rule.
    let relint = Linter::new(Config::default()).lint_source("Dockerfile", &fix.modified);
    assert!(!relint
        .violations
        .iter()
        .any(|v| v.rule_code == "tally/prefer-run-heredoc"));
    assert!(!relint
        .violations
        .iter()
        .any(|v| v.rule_code == "parse/invalid-syntax"));
}
