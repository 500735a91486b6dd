//! Rule interface and registry.
//!
//! Every rule exposes static metadata and a pure `check` over the shared
//! [`LintInput`]. The registry is a process-wide, insertion-ordered
//! collection populated exactly once and immutable thereafter; iteration
//! order is the registration order, which makes rule dispatch — and with it
//! the violation stream — deterministic.

pub mod buildkit;
pub mod hadolint;
pub mod tally;

mod input;
#[cfg(test)]
pub(crate) mod testutil;
mod violation;

pub use input::LintInput;
pub use violation::{
    FixSafety, Location, Position, Severity, SuggestedFix, TextEdit, Violation,
};

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::config::Config;

/// Rule code namespaces. These prefix strings are part of the public
/// contract and are bit-exact.
pub const HADOLINT_PREFIX: &str = "hadolint/";
pub const BUILDKIT_PREFIX: &str = "buildkit/";
pub const TALLY_PREFIX: &str = "tally/";

/// Static information about a rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleMetadata {
    /// Unique identifier, e.g. `hadolint/DL3006`.
    pub code: &'static str,
    /// Human-readable rule name.
    pub name: &'static str,
    /// What the rule checks.
    pub description: &'static str,
    /// Link to detailed documentation; empty when none exists.
    pub doc_url: &'static str,
    /// Severity when not overridden by configuration.
    pub default_severity: Severity,
    /// Groups related rules: "security", "performance", "style", …
    pub category: &'static str,
    /// Whether the rule runs without explicit opt-in.
    pub enabled_by_default: bool,
    /// Rules that may change or be removed.
    pub experimental: bool,
    /// Higher-priority fixes win conflicts in the fix engine.
    pub fix_priority: i32,
}

impl RuleMetadata {
    pub const fn new(
        code: &'static str,
        name: &'static str,
        description: &'static str,
        doc_url: &'static str,
        default_severity: Severity,
        category: &'static str,
    ) -> Self {
        RuleMetadata {
            code,
            name,
            description,
            doc_url,
            default_severity,
            category,
            enabled_by_default: true,
            experimental: false,
            fix_priority: 0,
        }
    }
}

/// The interface all linting rules implement.
pub trait Rule: Send + Sync {
    /// Static information about the rule.
    fn metadata(&self) -> RuleMetadata;

    /// Runs the rule. Must be pure; the input may describe a partial model
    /// and rules degrade gracefully on missing fields.
    fn check(&self, input: &LintInput<'_>) -> Vec<Violation>;

    /// Whether the rule runs under the given configuration. The default
    /// honors an explicit `enabled` override, then the metadata default.
    /// Rules with auto-enable behavior (trusted registries) override this.
    fn is_enabled(&self, config: &Config) -> bool {
        let meta = self.metadata();
        config
            .enabled_override(meta.code)
            .unwrap_or(meta.enabled_by_default)
    }

    /// Validates rule options from configuration. The default accepts
    /// anything; configurable rules deserialize into their typed config.
    fn validate_options(&self, _options: &toml::Table) -> Result<(), String> {
        Ok(())
    }

    /// JSON-Schema document describing the rule's options, for tooling.
    fn options_schema(&self) -> Option<serde_json::Value> {
        None
    }
}

/// The process-wide rule collection: insertion-ordered iteration, O(1)
/// lookup by code.
pub struct Registry {
    rules: Vec<Box<dyn Rule>>,
    by_code: HashMap<&'static str, usize>,
}

impl Registry {
    fn build() -> Registry {
        let mut registry = Registry {
            rules: Vec::new(),
            by_code: HashMap::new(),
        };

        registry.register(Box::new(tally::max_lines::MaxLines));
        registry.register(Box::new(hadolint::dl3004::Dl3004));
        registry.register(Box::new(hadolint::dl3006::Dl3006));
        registry.register(Box::new(hadolint::dl3007::Dl3007));
        registry.register(Box::new(hadolint::dl3023::Dl3023));
        registry.register(Box::new(hadolint::dl3024::Dl3024));
        registry.register(Box::new(hadolint::dl3026::Dl3026));
        registry.register(Box::new(hadolint::dl3027::Dl3027));
        registry.register(Box::new(hadolint::dl4001::Dl4001));
        registry.register(Box::new(hadolint::dl4006::Dl4006));
        registry.register(Box::new(tally::prefer_add_unpack::PreferAddUnpack));
        registry.register(Box::new(tally::prefer_run_heredoc::PreferRunHeredoc));
        for rule in buildkit::warning_rules() {
            registry.register(rule);
        }

        registry
    }

    fn register(&mut self, rule: Box<dyn Rule>) {
        let code = rule.metadata().code;
        debug_assert!(
            !self.by_code.contains_key(code),
            "duplicate rule code {code}"
        );
        self.by_code.insert(code, self.rules.len());
        self.rules.push(rule);
    }

    pub fn get(&self, code: &str) -> Option<&dyn Rule> {
        self.by_code.get(code).map(|&i| self.rules[i].as_ref())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    /// Rules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in the given category, in registration order.
    pub fn by_category(&self, category: &str) -> Vec<&dyn Rule> {
        self.iter()
            .filter(|r| r.metadata().category == category)
            .collect()
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::build);

/// The global rule registry, populated on first use and immutable
/// thereafter. Concurrent reads are safe.
pub fn registry() -> &'static Registry {
    &REGISTRY
}
