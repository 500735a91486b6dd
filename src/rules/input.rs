//! The shared input handed to every rule.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::parser::{ParseResult, SourceMap, Stage};
use crate::semantic::Model;
use crate::shell::Variant;

use super::Location;

/// Everything a rule may consult. Rules are pure functions over this input:
/// no I/O, no globals, no time.
pub struct LintInput<'a> {
    /// Path of the file under lint.
    pub file: &'a str,
    /// The parsed Dockerfile: stages, meta-ARGs, line stats, warnings.
    pub parse: &'a ParseResult,
    /// The raw source text.
    pub source: &'a str,
    /// The semantic model.
    pub semantic: &'a Model,
    /// Resolved configuration.
    pub config: &'a Config,
    /// Codes of all enabled rules, for cooperative rule-interaction.
    pub enabled_rules: &'a BTreeSet<String>,
    /// Minimum chained commands before a RUN counts as a heredoc candidate.
    pub heredoc_min_commands: usize,
}

impl<'a> LintInput<'a> {
    pub fn stages(&self) -> &'a [Stage] {
        &self.parse.stages
    }

    pub fn source_map(&self) -> SourceMap<'a> {
        SourceMap::new(self.source)
    }

    /// True when the named rule is enabled for this lint. Rules use this to
    /// defer to another rule's fix.
    pub fn is_rule_enabled(&self, code: &str) -> bool {
        self.enabled_rules.contains(code)
    }

    /// The shell variant active for a stage.
    pub fn shell_variant(&self, stage_index: usize) -> Variant {
        self.semantic.shell_variant(stage_index)
    }

    /// Typed rule options from configuration, falling back to the type's
    /// defaults when absent or malformed. (Malformed options are reported
    /// as configuration errors before the core runs; the fallback here only
    /// covers partial models.)
    pub fn rule_options<T: DeserializeOwned + Default>(&self, code: &str) -> T {
        self.config
            .options(code)
            .and_then(|table| toml::Value::Table(table.clone()).try_into().ok())
            .unwrap_or_default()
    }

    /// Source text covered by a location: the whole lines for ranges, one
    /// line for points, empty for file-level locations.
    pub fn snippet_for(&self, location: &Location) -> String {
        if location.is_file_level() {
            return String::new();
        }
        let sm = self.source_map();
        sm.snippet(location.start.line, location.end_line())
    }
}
