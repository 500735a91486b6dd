//! Output format integration tests: the JSON violation schema, SARIF
//! shape, and BuildKit-style text rendering over real lint results.

use tally::{report, Config, Linter};

fn lint_report(source: &str) -> tally::FileReport {
    Linter::new(Config::default()).lint_source("Dockerfile", source)
}

#[test]
fn test_json_violation_schema() {
    let report = lint_report("FROM ubuntu\nRUN cat /a | grep b\n");
    let mut out = Vec::new();
    report::write_json(&mut out, &[report]).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();

    let violations = parsed["files"][0]["violations"]
        .as_array()
        .expect("violations array");
    assert!(!violations.is_empty());

    for v in violations {
        // Required fields of the canonical schema.
        assert!(v["file"].is_string());
        assert!(v["rule_code"].is_string());
        assert!(v["message"].is_string());
        let severity = v["severity"].as_str().unwrap();
        assert!(["error", "warning", "info", "style"].contains(&severity));
        assert!(v["location"]["start"]["line"].is_u64());
        assert!(v["location"]["start"]["column"].is_u64());
        assert!(v["location"]["end"]["line"].is_u64());

        if let Some(fix) = v.get("suggested_fix") {
            assert!(fix["description"].is_string());
            let safety = fix["safety"].as_str().unwrap();
            assert!(["safe", "suggestion", "unsafe"].contains(&safety));
            assert!(fix["priority"].is_i64() || fix["priority"].is_u64());
            assert!(fix["edits"].is_array());
            assert!(fix["is_preferred"].is_boolean());
            for edit in fix["edits"].as_array().unwrap() {
                assert!(edit["location"]["start"]["line"].is_u64());
                assert!(edit["new_text"].is_string());
            }
        }
    }
}

#[test]
fn test_json_severity_matches_config_override() {
    let config: Config =
        toml::from_str("[rules.\"hadolint/DL3006\"]\nseverity = \"error\"\n").unwrap();
    let report = Linter::new(config).lint_source("Dockerfile", "FROM ubuntu\n");
    let mut out = Vec::new();
    report::write_json(&mut out, &[report]).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();

    let v = parsed["files"][0]["violations"]
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["rule_code"] == "hadolint/DL3006")
        .expect("DL3006 present");
    assert_eq!(v["severity"], "error");
}

#[test]
fn test_sarif_run_shape() {
    let report = lint_report("FROM ubuntu\n");
    let mut out = Vec::new();
    report::write_sarif(&mut out, &[report]).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(parsed["version"], "2.1.0");
    assert!(parsed["$schema"].as_str().unwrap().contains("sarif-schema"));
    let driver = &parsed["runs"][0]["tool"]["driver"];
    assert_eq!(driver["name"], "tally");
    assert!(driver["rules"].as_array().map(|r| !r.is_empty()).unwrap_or(false));

    for result in parsed["runs"][0]["results"].as_array().unwrap() {
        assert!(result["ruleId"].is_string());
        assert!(["error", "warning", "note"].contains(&result["level"].as_str().unwrap()));
        let region = &result["locations"][0]["physicalLocation"]["region"];
        assert!(region["startLine"].as_u64().unwrap() >= 1);
    }
}

#[test]
fn test_text_format_snippets() {
    let source = "FROM ubuntu\nRUN cat /a | grep b\n";
    let report = lint_report(source);
    let mut out = Vec::new();
    report::write_text(
        &mut out,
        &[report],
        &[("Dockerfile".to_string(), source.to_string())],
    )
    .unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("WARNING: hadolint/DL4006"));
    assert!(text.contains("https://github.com/hadolint/hadolint/wiki/DL4006"));
    assert!(text.contains("Dockerfile:2"));
    assert!(text.contains(">>> RUN cat /a | grep b"));
}

#[test]
fn test_pretty_format_summary() {
    let report = lint_report("FROM ubuntu\n");
    let mut out = Vec::new();
    report::write_pretty(&mut out, &[report]).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("tally"));
    assert!(text.contains("hadolint/DL3006"));
    assert!(text.contains("issue"));
}

#[test]
fn test_formats_handle_clean_results() {
    let report = lint_report("FROM ubuntu:22.04\n");
    assert!(report.violations.is_empty());

    let mut json = Vec::new();
    report::write_json(&mut json, std::slice::from_ref(&report)).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed["violation_count"], 0);

    let mut sarif = Vec::new();
    report::write_sarif(&mut sarif, std::slice::from_ref(&report)).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&sarif).unwrap();
    assert_eq!(parsed["runs"][0]["results"].as_array().unwrap().len(), 0);

    let mut text = Vec::new();
    report::write_text(&mut text, &[report], &[]).unwrap();
    assert!(text.is_empty());
}
