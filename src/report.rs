//! Output formatting for lint results.
//!
//! Four formats:
//! - Pretty: colored terminal output for human readability
//! - Text: BuildKit-style warnings with source snippets, consistent with
//!   `docker buildx build --check`
//! - JSON: the canonical machine interface (the violation JSON schema)
//! - SARIF: Static Analysis Results Interchange Format for IDE/CI use

use std::collections::BTreeSet;
use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::lint::FileReport;
use crate::rules::{registry, Location, Position, Severity, SuggestedFix, Violation};

// =============================================================================
// JSON format (the canonical violation schema)
// =============================================================================

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    files: Vec<JsonFile<'a>>,
    violation_count: usize,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    file: &'a str,
    lines: usize,
    violations: Vec<JsonViolation<'a>>,
}

#[derive(Serialize)]
struct JsonViolation<'a> {
    file: &'a str,
    location: JsonLocation,
    rule_code: &'a str,
    message: &'a str,
    severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggested_fix: Option<JsonFix<'a>>,
}

#[derive(Serialize)]
struct JsonLocation {
    start: JsonPosition,
    end: JsonPosition,
}

#[derive(Serialize)]
struct JsonPosition {
    line: usize,
    column: usize,
}

#[derive(Serialize)]
struct JsonFix<'a> {
    description: &'a str,
    safety: crate::rules::FixSafety,
    priority: i32,
    edits: Vec<JsonEdit<'a>>,
    is_preferred: bool,
}

#[derive(Serialize)]
struct JsonEdit<'a> {
    location: JsonLocation,
    new_text: &'a str,
}

fn json_location(location: &Location) -> JsonLocation {
    let pos = |p: Position| JsonPosition {
        line: p.line,
        column: p.column,
    };
    JsonLocation {
        start: pos(location.start),
        end: pos(location.end),
    }
}

fn json_violation(v: &Violation) -> JsonViolation<'_> {
    JsonViolation {
        file: &v.location.file,
        location: json_location(&v.location),
        rule_code: &v.rule_code,
        message: &v.message,
        severity: v.severity,
        doc_url: v.doc_url.as_deref(),
        suggested_fix: v.suggested_fix.as_ref().map(json_fix),
    }
}

fn json_fix(fix: &SuggestedFix) -> JsonFix<'_> {
    JsonFix {
        description: &fix.description,
        safety: fix.safety,
        priority: fix.priority,
        edits: fix
            .edits
            .iter()
            .map(|e| JsonEdit {
                location: json_location(&e.location),
                new_text: &e.new_text,
            })
            .collect(),
        is_preferred: fix.is_preferred,
    }
}

/// Writes results as JSON.
pub fn write_json<W: Write>(w: &mut W, reports: &[FileReport]) -> anyhow::Result<()> {
    let files: Vec<JsonFile<'_>> = reports
        .iter()
        .map(|r| JsonFile {
            file: &r.file,
            lines: r.total_lines,
            violations: r.violations.iter().map(json_violation).collect(),
        })
        .collect();
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        violation_count: reports.iter().map(|r| r.violations.len()).sum(),
        files,
    };
    serde_json::to_writer_pretty(&mut *w, &report)?;
    writeln!(w)?;
    Ok(())
}

// =============================================================================
// SARIF format
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "tally";
const INFO_URI: &str = "https://github.com/tinovyatkin/tally";

#[derive(Serialize)]
struct SarifReport {
    version: &'static str,
    #[serde(rename = "$schema")]
    schema: &'static str,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: &'static str,
    version: &'static str,
    #[serde(rename = "informationUri")]
    information_uri: &'static str,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
struct SarifRule {
    id: String,
    name: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "helpUri", skip_serializing_if = "Option::is_none")]
    help_uri: Option<String>,
    #[serde(rename = "defaultConfiguration")]
    default_config: SarifRuleConfig,
}

#[derive(Serialize)]
struct SarifRuleConfig {
    level: &'static str,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: &'static str,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifact,
    region: SarifRegion,
}

#[derive(Serialize)]
struct SarifArtifact {
    uri: String,
}

#[derive(Serialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: usize,
}

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info | Severity::Style | Severity::Off => "note",
    }
}

/// Writes results in SARIF 2.1.0.
pub fn write_sarif<W: Write>(w: &mut W, reports: &[FileReport]) -> anyhow::Result<()> {
    // Rules seen in this run, with metadata from the registry.
    let rule_ids: BTreeSet<&str> = reports
        .iter()
        .flat_map(|r| r.violations.iter().map(|v| v.rule_code.as_str()))
        .collect();

    let rules: Vec<SarifRule> = rule_ids
        .iter()
        .map(|&id| match registry().get(id) {
            Some(rule) => {
                let meta = rule.metadata();
                SarifRule {
                    id: id.to_string(),
                    name: meta.name.to_string(),
                    short_description: SarifMessage {
                        text: meta.description.to_string(),
                    },
                    help_uri: (!meta.doc_url.is_empty()).then(|| meta.doc_url.to_string()),
                    default_config: SarifRuleConfig {
                        level: sarif_level(meta.default_severity),
                    },
                }
            }
            None => SarifRule {
                id: id.to_string(),
                name: id.to_string(),
                short_description: SarifMessage {
                    text: id.to_string(),
                },
                help_uri: None,
                default_config: SarifRuleConfig { level: "warning" },
            },
        })
        .collect();

    let results: Vec<SarifResult> = reports
        .iter()
        .flat_map(|r| r.violations.iter())
        .map(|v| SarifResult {
            rule_id: v.rule_code.clone(),
            level: sarif_level(v.severity),
            message: SarifMessage {
                text: v.message.clone(),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifact {
                        uri: v.location.file.replace('\\', "/"),
                    },
                    region: SarifRegion {
                        start_line: v.location.start.line.max(1),
                    },
                },
            }],
        })
        .collect();

    let report = SarifReport {
        version: SARIF_VERSION,
        schema: SARIF_SCHEMA,
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME,
                    version: env!("CARGO_PKG_VERSION"),
                    information_uri: INFO_URI,
                    rules,
                },
            },
            results,
        }],
    };

    serde_json::to_writer_pretty(&mut *w, &report)?;
    writeln!(w)?;
    Ok(())
}

// =============================================================================
// Text format (BuildKit style, matches `docker buildx build --check`)
// =============================================================================

/// Writes violations in BuildKit's text format with source snippets:
///
/// ```text
/// WARNING: buildkit/StageNameCasing - https://docs.docker.com/go/dockerfile/rule/stage-name-casing/
/// Stage name 'Builder' should be lowercase
///
/// Dockerfile:2
/// --------------------
///    1 |     FROM ubuntu AS Builder
///    2 | >>> RUN echo hello
/// --------------------
/// ```
pub fn write_text<W: Write>(
    w: &mut W,
    reports: &[FileReport],
    sources: &[(String, String)],
) -> anyhow::Result<()> {
    for report in reports {
        let source = sources
            .iter()
            .find(|(file, _)| file == &report.file)
            .map(|(_, s)| s.as_str());
        for violation in &report.violations {
            print_warning(w, violation, source)?;
        }
    }
    Ok(())
}

fn print_warning<W: Write>(
    w: &mut W,
    violation: &Violation,
    source: Option<&str>,
) -> anyhow::Result<()> {
    let severity = violation.severity.to_string().to_uppercase();
    write!(w, "\n{severity}: {}", violation.rule_code)?;
    if let Some(url) = &violation.doc_url {
        write!(w, " - {url}")?;
    }
    writeln!(w, "\n{}", violation.message)?;

    if !violation.location.is_file_level() {
        if let Some(source) = source {
            print_source(w, &violation.location, source)?;
        }
    }
    Ok(())
}

/// Renders the snippet with `>>>` markers and 2-4 lines of context.
fn print_source<W: Write>(w: &mut W, location: &Location, source: &str) -> anyhow::Result<()> {
    let lines: Vec<&str> = source.lines().collect();
    let affected_start = location.start.line;
    let affected_end = location.end_line();
    if affected_start == 0 || affected_start > lines.len() {
        return Ok(());
    }

    let mut start = affected_start;
    let mut end = affected_end.min(lines.len());
    let pad = if end == start { 4 } else { 2 };
    let mut p = 0;
    while p < pad {
        if start > 1 {
            start -= 1;
            p += 1;
        }
        if end < lines.len() {
            end += 1;
            p += 1;
        }
        p += 1;
    }

    writeln!(w, "\n{}:{affected_start}", location.file)?;
    writeln!(w, "--------------------")?;
    for n in start..=end {
        let marker = if n >= affected_start && n <= affected_end {
            ">>>"
        } else {
            "   "
        };
        writeln!(w, " {n:3} | {marker} {}", lines[n - 1])?;
    }
    writeln!(w, "--------------------")?;
    Ok(())
}

// =============================================================================
// Pretty format (colored terminal output)
// =============================================================================

/// Writes a colored human-readable report.
pub fn write_pretty<W: Write>(w: &mut W, reports: &[FileReport]) -> anyhow::Result<()> {
    writeln!(w)?;
    writeln!(w, "  {} v{}", "tally".cyan().bold(), env!("CARGO_PKG_VERSION"))?;
    writeln!(w)?;

    let total: usize = reports.iter().map(|r| r.violations.len()).sum();

    for report in reports {
        if report.violations.is_empty() && report.internal_warnings.is_empty() {
            continue;
        }
        writeln!(w, "  {}", report.file.blue())?;
        for v in &report.violations {
            write_severity_tag(w, v.severity)?;
            write!(w, " {:<24}", v.rule_code.dimmed())?;
            if v.line() > 0 {
                write!(w, "{}", format!(":{}", v.line()).dimmed())?;
            }
            writeln!(w)?;
            writeln!(w, "            {}", v.message)?;
            if let Some(fix) = &v.suggested_fix {
                writeln!(
                    w,
                    "            {}",
                    format!("fix available ({}): {}", fix.safety, fix.description).dimmed()
                )?;
            }
        }
        for warning in &report.internal_warnings {
            writeln!(w, "    {}", warning.yellow())?;
        }
        writeln!(w)?;
    }

    if let Some(fixed) = summarize_fixes(reports) {
        writeln!(w, "  {fixed}")?;
    }

    if total == 0 {
        writeln!(w, "  {}", "✓ no issues found".green())?;
    } else {
        let plural = if total == 1 { "" } else { "s" };
        writeln!(w, "  {}", format!("✗ {total} issue{plural} found").red())?;
    }
    writeln!(w)?;
    Ok(())
}

fn write_severity_tag<W: Write>(w: &mut W, severity: Severity) -> anyhow::Result<()> {
    match severity {
        Severity::Error => write!(w, "    {}", "ERROR".red())?,
        Severity::Warning => write!(w, "    {}", "WARN ".yellow())?,
        Severity::Info => write!(w, "    {}", "INFO ".blue())?,
        Severity::Style => write!(w, "    {}", "STYLE".magenta())?,
        Severity::Off => write!(w, "    {}", "OFF  ".dimmed())?,
    }
    Ok(())
}

fn summarize_fixes(reports: &[FileReport]) -> Option<String> {
    let applied: usize = reports
        .iter()
        .filter_map(|r| r.fix.as_ref())
        .map(|f| f.applied.len())
        .sum();
    let skipped: usize = reports
        .iter()
        .filter_map(|r| r.fix.as_ref())
        .map(|f| f.skipped.len())
        .sum();
    if applied == 0 && skipped == 0 {
        return None;
    }
    Some(format!("fixes: {applied} applied, {skipped} skipped"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::FileReport;
    use crate::rules::{Location, Severity, Violation};

    fn sample_report() -> FileReport {
        FileReport {
            file: "Dockerfile".to_string(),
            total_lines: 2,
            violations: vec![Violation::new(
                Location::line("Dockerfile", 2),
                "hadolint/DL3006",
                "always tag the version of an image explicitly",
                Severity::Warning,
            )
            .with_doc_url("https://github.com/hadolint/hadolint/wiki/DL3006")],
            fix: None,
            internal_warnings: Vec::new(),
        }
    }

    #[test]
    fn test_json_schema_shape() {
        let mut out = Vec::new();
        write_json(&mut out, &[sample_report()]).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let v = &parsed["files"][0]["violations"][0];
        assert_eq!(v["file"], "Dockerfile");
        assert_eq!(v["rule_code"], "hadolint/DL3006");
        assert_eq!(v["severity"], "warning");
        assert_eq!(v["location"]["start"]["line"], 2);
        assert_eq!(v["location"]["start"]["column"], 0);
        assert!(v.get("suggested_fix").is_none());
        assert_eq!(parsed["violation_count"], 1);
    }

    #[test]
    fn test_sarif_shape() {
        let mut out = Vec::new();
        write_sarif(&mut out, &[sample_report()]).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(parsed["version"], "2.1.0");
        let run = &parsed["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "tally");
        let result = &run["results"][0];
        assert_eq!(result["ruleId"], "hadolint/DL3006");
        assert_eq!(result["level"], "warning");
        assert_eq!(
            result["locations"][0]["physicalLocation"]["region"]["startLine"],
            2
        );
        // The driver carries metadata for every referenced rule.
        assert_eq!(run["tool"]["driver"]["rules"][0]["id"], "hadolint/DL3006");
    }

    #[test]
    fn test_text_snippet() {
        let mut out = Vec::new();
        let source = "FROM ubuntu\nRUN echo hello\n".to_string();
        write_text(
            &mut out,
            &[sample_report()],
            &[("Dockerfile".to_string(), source)],
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("WARNING: hadolint/DL3006"));
        assert!(text.contains("Dockerfile:2"));
        assert!(text.contains(">>> RUN echo hello"));
        assert!(text.contains("--------------------"));
    }

    #[test]
    fn test_pretty_runs() {
        let mut out = Vec::new();
        write_pretty(&mut out, &[sample_report()]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("hadolint/DL3006"));
        assert!(text.contains("1 issue found"));
    }

    #[test]
    fn test_pretty_clean() {
        let mut out = Vec::new();
        let clean = FileReport {
            file: "Dockerfile".to_string(),
            total_lines: 1,
            violations: Vec::new(),
            fix: None,
            internal_warnings: Vec::new(),
        };
        write_pretty(&mut out, &[clean]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("no issues found"));
    }
}
