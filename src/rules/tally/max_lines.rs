//! tally/max-lines: limit file length.

use serde::Deserialize;

use crate::rules::{LintInput, Location, Rule, RuleMetadata, Severity, Violation};

pub const CODE: &str = "tally/max-lines";
pub const DOC_URL: &str =
    "https://github.com/tinovyatkin/tally/blob/main/docs/rules/tally/max-lines.md";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MaxLinesOptions {
    /// Maximum allowed lines; 0 disables the rule.
    #[serde(default = "default_max")]
    pub max: usize,
    #[serde(default = "default_true")]
    pub skip_blank_lines: bool,
    #[serde(default = "default_true")]
    pub skip_comments: bool,
}

fn default_max() -> usize {
    50
}

fn default_true() -> bool {
    true
}

impl Default for MaxLinesOptions {
    fn default() -> Self {
        MaxLinesOptions {
            max: default_max(),
            skip_blank_lines: true,
            skip_comments: true,
        }
    }
}

pub struct MaxLines;

impl Rule for MaxLines {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            CODE,
            "Limit Dockerfile length",
            "Dockerfiles over the configured line count are hard to review; split stages or scripts out",
            DOC_URL,
            Severity::Error,
            "style",
        )
    }

    fn validate_options(&self, options: &toml::Table) -> Result<(), String> {
        toml::Value::Table(options.clone())
            .try_into::<MaxLinesOptions>()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn options_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": {
                "max": {
                    "type": "integer",
                    "minimum": 0,
                    "default": 50,
                    "description": "Maximum allowed lines; 0 disables the rule"
                },
                "skip-blank-lines": { "type": "boolean", "default": true },
                "skip-comments": { "type": "boolean", "default": true }
            },
            "additionalProperties": false
        }))
    }

    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        let opts: MaxLinesOptions = input.rule_options(CODE);
        if opts.max == 0 {
            return Vec::new();
        }

        let mut counted = input.parse.total_lines;
        if opts.skip_blank_lines {
            counted -= input.parse.blank_lines;
        }
        if opts.skip_comments {
            counted -= input.parse.comment_lines;
        }
        if counted <= opts.max {
            return Vec::new();
        }

        let meta = self.metadata();
        vec![Violation::new(
            Location::file_level(input.file),
            meta.code,
            format!("file has {counted} lines, maximum allowed is {}", opts.max),
            meta.default_severity,
        )
        .with_doc_url(meta.doc_url)]
    }
}

#[cfg(test)]
mod tests {
    use crate::rules::testutil::{check_rule, check_rule_with_config, config_from};

    fn with_max(max: usize) -> crate::config::Config {
        config_from(&format!(
            "[rules.\"tally/max-lines\"]\noptions = {{ max = {max} }}\n"
        ))
    }

    #[test]
    fn test_disabled_when_max_zero() {
        let violations = check_rule_with_config(
            "tally/max-lines",
            "FROM alpine\nRUN echo hello\nRUN echo world\n",
            &with_max(0),
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_under_limit_passes() {
        assert!(
            check_rule_with_config("tally/max-lines", "FROM alpine\n", &with_max(10)).is_empty()
        );
    }

    #[test]
    fn test_at_limit_passes() {
        assert!(check_rule_with_config(
            "tally/max-lines",
            "FROM alpine\nRUN echo hello\n",
            &with_max(2)
        )
        .is_empty());
    }

    #[test]
    fn test_over_limit_flagged() {
        let violations = check_rule_with_config(
            "tally/max-lines",
            "FROM alpine\nRUN echo a\nRUN echo b\n",
            &with_max(2),
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_code, "tally/max-lines");
        assert_eq!(
            violations[0].message,
            "file has 3 lines, maximum allowed is 2"
        );
        assert!(violations[0].location.is_file_level());
    }

    #[test]
    fn test_skip_blank_lines() {
        let violations = check_rule_with_config(
            "tally/max-lines",
            "FROM alpine\n\nRUN echo hello\n\n",
            &with_max(2),
        );
        // Only two non-blank lines with the default skips.
        assert!(violations.is_empty());
    }

    #[test]
    fn test_count_blank_lines_when_configured() {
        let config = config_from(
            "[rules.\"tally/max-lines\"]\noptions = { max = 2, skip-blank-lines = false }\n",
        );
        let violations = check_rule_with_config(
            "tally/max-lines",
            "FROM alpine\n\nRUN echo hello\n",
            &config,
        );
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("3 lines"));
    }

    #[test]
    fn test_skip_comments() {
        let violations = check_rule_with_config(
            "tally/max-lines",
            "# header\nFROM alpine\nRUN echo hello\n",
            &with_max(2),
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_default_limit_is_generous() {
        assert!(check_rule("tally/max-lines", "FROM alpine\nRUN echo hello\n").is_empty());
    }
}
