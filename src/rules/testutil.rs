//! Shared helpers for rule unit tests.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;
use crate::directives::DirectiveSet;
use crate::parser;
use crate::semantic::Model;

use super::{registry, LintInput, Violation};

/// Builds a full lint input for `source` and hands it to `f`.
pub(crate) fn with_input<R>(source: &str, config: &Config, f: impl FnOnce(&LintInput<'_>) -> R) -> R {
    let parse = parser::parse(source).expect("test source should parse");
    let directives = DirectiveSet::scan(source);
    let semantic = Model::build(&parse, &directives, &BTreeMap::new(), "Dockerfile");
    let enabled: BTreeSet<String> = registry()
        .iter()
        .filter(|r| r.is_enabled(config))
        .map(|r| r.metadata().code.to_string())
        .collect();
    let input = LintInput {
        file: "Dockerfile",
        parse: &parse,
        source,
        semantic: &semantic,
        config,
        enabled_rules: &enabled,
        heredoc_min_commands: 3,
    };
    f(&input)
}

/// Runs a single registered rule against the source.
pub(crate) fn check_rule(code: &str, source: &str) -> Vec<Violation> {
    check_rule_with_config(code, source, &Config::default())
}

/// Runs a single registered rule with configuration.
pub(crate) fn check_rule_with_config(code: &str, source: &str, config: &Config) -> Vec<Violation> {
    with_input(source, config, |input| {
        registry()
            .get(code)
            .unwrap_or_else(|| panic!("rule {code} not registered"))
            .check(input)
    })
}

/// Parses a TOML fragment into a [`Config`].
pub(crate) fn config_from(toml_str: &str) -> Config {
    toml::from_str(toml_str).expect("test config should parse")
}
