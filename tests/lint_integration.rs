//! Integration tests for the full lint pipeline.
//!
//! These drive `Linter::lint_source` end to end and pin down the behaviors
//! external consumers rely on: rule codes, messages, suppression
//! directives, ordering, and determinism.

use std::path::PathBuf;

use tally::{Config, Linter, Severity, Violation};

fn lint(source: &str) -> Vec<Violation> {
    Linter::new(Config::default())
        .lint_source("Dockerfile", source)
        .violations
}

fn lint_with_config(source: &str, config_toml: &str) -> Vec<Violation> {
    let config: Config = toml::from_str(config_toml).expect("config should parse");
    Linter::new(config)
        .lint_source("Dockerfile", source)
        .violations
}

fn codes(violations: &[Violation]) -> Vec<&str> {
    violations.iter().map(|v| v.rule_code.as_str()).collect()
}

fn testdata(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name);
    std::fs::read_to_string(path).expect("testdata fixture should exist")
}

#[test]
fn test_max_lines_scenario() {
    let violations = lint_with_config(
        "FROM alpine\nRUN echo a\nRUN echo b\n",
        "[rules.\"tally/max-lines\"]\noptions = { max = 2 }\n",
    );
    let max_lines: Vec<_> = violations
        .iter()
        .filter(|v| v.rule_code == "tally/max-lines")
        .collect();
    assert_eq!(max_lines.len(), 1);
    assert_eq!(max_lines[0].message, "file has 3 lines, maximum allowed is 2");
    assert!(max_lines[0].location.is_file_level());
}

#[test]
fn test_duplicate_stage_names_scenario() {
    let violations = lint("FROM node AS foo\nFROM scratch AS foo\n");
    let dl3024: Vec<_> = violations
        .iter()
        .filter(|v| v.rule_code == "hadolint/DL3024")
        .collect();
    assert_eq!(dl3024.len(), 1);
    assert_eq!(dl3024[0].location.start.line, 2);
    assert!(dl3024[0].message.contains("\"foo\""));
    assert!(dl3024[0].message.contains("stage 0"));
}

#[test]
fn test_self_referencing_copy_scenario() {
    let violations = lint("FROM alpine AS a\nCOPY --from=a /x /x\n");
    assert_eq!(
        violations
            .iter()
            .filter(|v| v.rule_code == "hadolint/DL3023")
            .count(),
        1
    );
}

#[test]
fn test_set_pipefail_scenario() {
    let violations = lint("FROM alpine\nRUN cat /etc/os-release | grep VERSION\n");
    let dl4006: Vec<_> = violations
        .iter()
        .filter(|v| v.rule_code == "hadolint/DL4006")
        .collect();
    assert_eq!(dl4006.len(), 1);
    assert_eq!(dl4006[0].location.start.line, 2);

    let fix = dl4006[0].suggested_fix.as_ref().expect("expected fix");
    assert_eq!(fix.edits.len(), 1);
    assert_eq!(fix.edits[0].location.start.line, 2);
    assert_eq!(
        fix.edits[0].new_text,
        "SHELL [\"/bin/ash\", \"-o\", \"pipefail\", \"-c\"]\n"
    );
}

#[test]
fn test_stage_name_casing_scenario() {
    let violations = lint("FROM alpine AS Builder\nFROM Builder\n");
    let casing: Vec<_> = violations
        .iter()
        .filter(|v| v.rule_code == "buildkit/StageNameCasing")
        .collect();
    assert_eq!(casing.len(), 1);
    let fix = casing[0].suggested_fix.as_ref().expect("expected safe fix");
    assert_eq!(fix.safety, tally::FixSafety::Safe);
    // Definition and reference both covered.
    assert_eq!(fix.edits.len(), 2);
}

#[test]
fn test_suppression_directive_scenarios() {
    // Each surface syntax suppresses DL3006 on the next instruction and
    // nothing else.
    for directive in [
        "# tally ignore=hadolint/DL3006",
        "# hadolint ignore=DL3006",
        "# check=skip=hadolint/DL3006",
    ] {
        let source = format!("{directive}\nFROM ubuntu\n");
        let violations = lint(&source);
        assert!(
            !codes(&violations).contains(&"hadolint/DL3006"),
            "{directive} should suppress DL3006, got {violations:?}"
        );

        // The same source without the directive does produce DL3006.
        let unsuppressed = lint("FROM ubuntu\n");
        assert!(codes(&unsuppressed).contains(&"hadolint/DL3006"));
    }
}

#[test]
fn test_suppression_is_code_specific() {
    // ubuntu:latest on the target line raises DL3007; the directive names
    // only DL3006 so DL3007 must survive.
    let source = "# tally ignore=hadolint/DL3006\nFROM ubuntu:latest\n";
    let violations = lint(source);
    assert!(codes(&violations).contains(&"hadolint/DL3007"));
    assert!(!codes(&violations).contains(&"hadolint/DL3006"));
}

#[test]
fn test_ignore_all_suppresses_everything_at_line() {
    let source = "# tally ignore=all\nFROM Ubuntu:latest AS Up\n";
    let violations = lint(source);
    assert!(
        violations
            .iter()
            .all(|v| v.location.start.line != 2),
        "all codes on line 2 should be suppressed, got {violations:?}"
    );
}

#[test]
fn test_unused_directive_advisory() {
    let source = "# tally ignore=hadolint/DL3006\nFROM ubuntu:22.04\n";
    let violations = lint(source);
    let advisories: Vec<_> = violations
        .iter()
        .filter(|v| v.rule_code == "tally/unused-ignore")
        .collect();
    assert_eq!(advisories.len(), 1);
    assert_eq!(advisories[0].location.start.line, 1);
    assert_eq!(advisories[0].severity, Severity::Info);
}

#[test]
fn test_determinism() {
    let source = testdata("messy.dockerfile");
    let first = lint(&source);
    for _ in 0..3 {
        assert_eq!(lint(&source), first);
    }
}

#[test]
fn test_violations_are_sorted() {
    let source = testdata("messy.dockerfile");
    let violations = lint(&source);
    let keys: Vec<_> = violations
        .iter()
        .map(|v| {
            (
                v.location.start.line,
                v.location.start.column,
                v.rule_code.clone(),
            )
        })
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn test_messy_fixture_finds_expected_rules() {
    let source = testdata("messy.dockerfile");
    let violations = lint(&source);
    let found = codes(&violations);
    for expected in [
        "buildkit/FromAsCasing",
        "buildkit/StageNameCasing",
        "buildkit/MaintainerDeprecated",
        "buildkit/JSONArgsRecommended",
        "hadolint/DL3004",
        "hadolint/DL3006",
        "hadolint/DL3023",
        "hadolint/DL4006",
        "tally/prefer-add-unpack",
    ] {
        assert!(found.contains(&expected), "missing {expected} in {found:?}");
    }
}

#[test]
fn test_clean_multi_stage_fixture() {
    let source = testdata("multi-stage.dockerfile");
    let violations = lint(&source);
    assert!(violations.is_empty(), "expected clean lint, got {violations:?}");
}

#[test]
fn test_all_violations_within_line_bounds() {
    let source = testdata("messy.dockerfile");
    let line_count = source.lines().count();
    for v in lint(&source) {
        if v.location.is_file_level() {
            continue;
        }
        assert!(v.location.start.line >= 1 && v.location.start.line <= line_count);
        assert!(v.location.end_line() <= line_count);
        assert!(v.location.start.line <= v.location.end_line());
    }
}

#[test]
fn test_empty_file_zero_violations() {
    assert!(lint("").is_empty());
}

#[test]
fn test_parse_error_stops_pipeline() {
    let violations = lint("FROM alpine\nBOGUS instruction here\n");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule_code, "parse/invalid-syntax");
    assert_eq!(violations[0].severity, Severity::Error);
}

#[test]
fn test_trailing_newline_line_counts() {
    // One trailing newline is a terminator; two make a blank line.
    let one = Linter::new(Config::default()).lint_source("Dockerfile", "FROM alpine:3.19\n");
    assert_eq!(one.total_lines, 1);
    let two = Linter::new(Config::default()).lint_source("Dockerfile", "FROM alpine:3.19\n\n");
    assert_eq!(two.total_lines, 2);
}

#[test]
fn test_continuation_location_spans_all_lines() {
    let source = "FROM alpine\nRUN sudo apk add \\\n    curl \\\n    git\n";
    let violations = lint(source);
    let sudo = violations
        .iter()
        .find(|v| v.rule_code == "hadolint/DL3004")
        .expect("expected DL3004");
    assert_eq!(sudo.location.start.line, 2);
    assert_eq!(sudo.location.end.line, 4);
}

#[test]
fn test_shell_mid_stage_and_reset() {
    // SHELL affects subsequent RUNs only; a new FROM resets to default.
    let source = "FROM alpine\nRUN a | b\nSHELL [\"/bin/ash\", \"-o\", \"pipefail\", \"-c\"]\nRUN c | d\nFROM alpine\nRUN e | f\n";
    let violations = lint(source);
    let dl4006_lines: Vec<usize> = violations
        .iter()
        .filter(|v| v.rule_code == "hadolint/DL4006")
        .map(|v| v.location.start.line)
        .collect();
    assert_eq!(dl4006_lines, vec![2, 6]);
}

#[test]
fn test_non_posix_shell_suppresses_shell_rules() {
    let source = "FROM img\nSHELL [\"pwsh\", \"-Command\"]\nRUN sudo Get-Thing | Select-Object x\n";
    let violations = lint(source);
    assert!(!codes(&violations).contains(&"hadolint/DL3004"));
    assert!(!codes(&violations).contains(&"hadolint/DL4006"));
}

#[test]
fn test_severity_override_applies() {
    let violations = lint_with_config(
        "FROM ubuntu\n",
        "[rules.\"hadolint/DL3006\"]\nseverity = \"info\"\n",
    );
    let dl3006 = violations
        .iter()
        .find(|v| v.rule_code == "hadolint/DL3006")
        .expect("expected DL3006");
    assert_eq!(dl3006.severity, Severity::Info);
}

#[test]
fn test_severity_off_drops() {
    let violations = lint_with_config(
        "FROM ubuntu\n",
        "[rules.\"hadolint/DL3006\"]\nseverity = \"off\"\n",
    );
    assert!(!codes(&violations).contains(&"hadolint/DL3006"));
}

#[test]
fn test_trusted_registries_contract() {
    // Off by default.
    let violations = lint("FROM gcr.io/proj/img:v1\n");
    assert!(!codes(&violations).contains(&"hadolint/DL3026"));

    // Auto-enabled by configuration.
    let violations = lint_with_config(
        "FROM gcr.io/proj/img:v1\n",
        "[rules.\"hadolint/DL3026\"]\noptions = { trusted-registries = [\"docker.io\"] }\n",
    );
    assert!(codes(&violations).contains(&"hadolint/DL3026"));
}
