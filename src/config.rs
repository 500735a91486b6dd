//! Configuration: `.tally.toml` discovery, parsing, and validation.
//!
//! Configuration resolves in layers — built-in defaults, then a file
//! discovered by walking upward from the linted file, then explicit
//! overrides from the driver — and collapses to a single [`Config`] before
//! the rule registry is consulted. Rules never see the layered form.
//!
//! ```toml
//! [rules."hadolint/DL3008"]
//! enabled  = true
//! severity = "error"
//! fix      = "always"
//!
//! [rules."tally/max-lines"]
//! options = { max = 50, skip-blank-lines = true, skip-comments = true }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rules::{Registry, Severity};

/// The configuration file name discovered by upward walk.
pub const CONFIG_FILE_NAME: &str = ".tally.toml";

/// Per-rule fix application policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixMode {
    /// Apply whenever the safety threshold allows.
    #[default]
    Always,
    /// Never apply this rule's fixes.
    Never,
    /// Apply only when the rule is named in the fix rule filter.
    Explicit,
    /// Apply only the rule's unsafe fixes (with the unsafe threshold).
    UnsafeOnly,
}

/// Overrides for a single rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<toml::Table>,
}

/// Resolved configuration handed to the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rules: BTreeMap<String, RuleOverride>,
}

impl Config {
    /// Walks upward from `start` looking for `.tally.toml`.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        let mut dir = if start.is_dir() {
            start.to_path_buf()
        } else {
            start.parent()?.to_path_buf()
        };
        loop {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Discovers and loads configuration for a file under lint; defaults
    /// when no configuration file exists.
    pub fn load_for(file: &Path) -> Result<Config, ConfigError> {
        match Config::discover(file) {
            Some(path) => Config::load(&path),
            None => Ok(Config::default()),
        }
    }

    /// Validates rule codes and rule options against the registry. Unknown
    /// codes and options that a rule rejects are configuration errors.
    pub fn validate(&self, registry: &Registry) -> Result<(), ConfigError> {
        for (code, over) in &self.rules {
            let Some(rule) = registry.get(code) else {
                return Err(ConfigError::UnknownRule { code: code.clone() });
            };
            if let Some(options) = &over.options {
                rule.validate_options(options)
                    .map_err(|message| ConfigError::InvalidOptions {
                        code: code.clone(),
                        message,
                    })?;
            }
        }
        Ok(())
    }

    pub fn enabled_override(&self, code: &str) -> Option<bool> {
        self.rules.get(code).and_then(|r| r.enabled)
    }

    pub fn severity_override(&self, code: &str) -> Option<Severity> {
        self.rules.get(code).and_then(|r| r.severity)
    }

    /// The fix policy for a rule; `Always` when unconfigured.
    pub fn fix_mode(&self, code: &str) -> FixMode {
        self.rules
            .get(code)
            .and_then(|r| r.fix)
            .unwrap_or_default()
    }

    pub fn options(&self, code: &str) -> Option<&toml::Table> {
        self.rules.get(code).and_then(|r| r.options.as_ref())
    }

    /// Merges another layer on top of this one; later layers win per rule
    /// field.
    pub fn merge(&mut self, other: Config) {
        for (code, over) in other.rules {
            let entry = self.rules.entry(code).or_default();
            if over.enabled.is_some() {
                entry.enabled = over.enabled;
            }
            if over.severity.is_some() {
                entry.severity = over.severity;
            }
            if over.fix.is_some() {
                entry.fix = over.fix;
            }
            if over.options.is_some() {
                entry.options = over.options;
            }
        }
    }
}
