//! DL3026: use only allowed registries in FROM.
//!
//! Off unless configuration supplies `trusted-registries`; setting that
//! option auto-enables the rule. This auto-enable behavior is part of the
//! public contract.

use serde::Deserialize;

use crate::config::Config;
use crate::rules::{LintInput, Rule, RuleMetadata, Severity, Violation};

use super::image_ref::ImageRef;

pub const CODE: &str = "hadolint/DL3026";
pub const DOC_URL: &str = "https://github.com/hadolint/hadolint/wiki/DL3026";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Dl3026Options {
    /// Allowed registry domains. `*.example.com` matches subdomains.
    #[serde(default)]
    pub trusted_registries: Vec<String>,
}

pub struct Dl3026;

impl Dl3026 {
    fn options(&self, config: &Config) -> Dl3026Options {
        config
            .options(CODE)
            .and_then(|table| toml::Value::Table(table.clone()).try_into().ok())
            .unwrap_or_default()
    }
}

impl Rule for Dl3026 {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            enabled_by_default: false,
            ..RuleMetadata::new(
                CODE,
                "Use only trusted registries",
                "Use only an allowed registry in the FROM image",
                DOC_URL,
                Severity::Error,
                "security",
            )
        }
    }

    /// Enabled when explicitly switched on, or automatically when a
    /// `trusted-registries` list is configured.
    fn is_enabled(&self, config: &Config) -> bool {
        if let Some(explicit) = config.enabled_override(CODE) {
            return explicit;
        }
        !self.options(config).trusted_registries.is_empty()
    }

    fn validate_options(&self, options: &toml::Table) -> Result<(), String> {
        toml::Value::Table(options.clone())
            .try_into::<Dl3026Options>()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn options_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": {
                "trusted-registries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Registry domains allowed in FROM images"
                }
            },
            "additionalProperties": false
        }))
    }

    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        let opts = self.options(input.config);
        if opts.trusted_registries.is_empty() {
            return Vec::new();
        }

        let meta = self.metadata();
        let mut violations = Vec::new();

        for stage in input.stages() {
            if stage.base_name == "scratch" {
                continue;
            }
            if let Some(info) = input.semantic.stage_info(stage.index) {
                if info.base_image.is_stage_ref {
                    continue;
                }
            }
            let Some(image) = ImageRef::parse(&stage.base_name) else {
                continue;
            };

            let domain = image.domain();
            if opts.trusted_registries.iter().any(|t| domain_matches(t, domain)) {
                continue;
            }

            violations.push(
                Violation::new(
                    stage.span.to_location(input.file),
                    meta.code,
                    format!("use only an allowed registry in the FROM image; {domain:?} is not trusted"),
                    meta.default_severity,
                )
                .with_doc_url(meta.doc_url)
                .with_detail(format!(
                    "Trusted registries are: {}",
                    opts.trusted_registries.join(", ")
                )),
            );
        }

        violations
    }
}

fn domain_matches(pattern: &str, domain: &str) -> bool {
    let pattern = normalize_hub_domain(pattern);
    let domain = normalize_hub_domain(domain);
    if pattern == domain {
        return true;
    }
    // Wildcards match subdomains only, never the bare suffix or a domain
    // that merely ends with the same characters (`*.gcr.io` must not trust
    // `xgcr.io`).
    pattern.strip_prefix("*.").is_some_and(|suffix| {
        domain
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('.'))
    })
}

/// Docker Hub is reachable under several registry names; they all denote
/// the same registry and compare equal.
fn normalize_hub_domain(domain: &str) -> &str {
    match domain {
        "index.docker.io" | "registry-1.docker.io" => "docker.io",
        other => other,
    }
}
