//! The violation processor chain.
//!
//! An ordered sequence of pure `Vec<Violation> → Vec<Violation>`
//! transforms. The order is fixed: severity override, enable filter, inline
//! directive filter, deduplication, sorting. The chain is idempotent:
//! processing its own output changes nothing.
//!
//! Unused-ignore advisories enter the stream as candidates (one per ignore
//! directive, created by [`directive_advisories`]) before processing; the
//! directive filter removes the candidates whose directive suppressed
//! something, leaving advisories only for directives that matched nothing.

use std::collections::{BTreeSet, HashSet};

use crate::config::Config;
use crate::directives::{CodeSet, DirectiveSet, IgnoreDirective};
use crate::rules::{Location, Registry, Severity, Violation};

/// Code carried by unused-ignore advisories. Not a registered rule: the
/// enable filter passes it through, and it cannot be configured.
pub const UNUSED_IGNORE_CODE: &str = "tally/unused-ignore";

/// Context carried through the processors.
pub struct ProcessContext<'a> {
    pub config: &'a Config,
    pub directives: &'a DirectiveSet,
    pub enabled_rules: &'a BTreeSet<String>,
    pub registry: &'a Registry,
    pub file: &'a str,
}

/// Candidate advisories for every ignore directive in the file. The
/// directive filter drops those whose directive turned out to be used.
pub fn directive_advisories(
    directives: &DirectiveSet,
    registry: &Registry,
    file: &str,
) -> Vec<Violation> {
    directives
        .ignores
        .iter()
        .map(|d| {
            let mut message = format!(
                "ignore directive for {} suppressed nothing",
                describe_codes(&d.codes)
            );
            let unknown = unknown_codes(d, registry);
            if !unknown.is_empty() {
                message.push_str(&format!(" (unknown rule code {})", unknown.join(", ")));
            }
            Violation::new(
                Location::line(file, d.line),
                UNUSED_IGNORE_CODE,
                message,
                Severity::Info,
            )
        })
        .collect()
}

fn describe_codes(codes: &CodeSet) -> String {
    match codes {
        CodeSet::All => "\"all\"".to_string(),
        CodeSet::Codes(list) => list
            .iter()
            .map(|c| format!("{c:?}"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn unknown_codes(d: &IgnoreDirective, registry: &Registry) -> Vec<String> {
    match &d.codes {
        CodeSet::All => Vec::new(),
        CodeSet::Codes(list) => list
            .iter()
            .filter(|code| {
                !registry.iter().any(|r| {
                    let rc = r.metadata().code;
                    rc == code.as_str()
                        || rc.rsplit_once('/').is_some_and(|(_, tail)| tail == code.as_str())
                })
            })
            .map(|c| format!("{c:?}"))
            .collect(),
    }
}

/// Runs the full processor chain in canonical order.
pub fn process(violations: Vec<Violation>, ctx: &ProcessContext<'_>) -> Vec<Violation> {
    let violations = severity_override(violations, ctx);
    let violations = enable_filter(violations, ctx);
    let violations = directive_filter(violations, ctx);
    let violations = deduplicate(violations);
    sort(violations)
}

/// Applies per-rule severity from configuration; severity `off` drops the
/// violation.
fn severity_override(violations: Vec<Violation>, ctx: &ProcessContext<'_>) -> Vec<Violation> {
    violations
        .into_iter()
        .filter_map(|mut v| {
            if let Some(severity) = ctx.config.severity_override(&v.rule_code) {
                v.severity = severity;
            }
            if v.severity.is_off() {
                None
            } else {
                Some(v)
            }
        })
        .collect()
}

/// Drops violations from disabled rules. Codes outside the registry
/// (parse errors, advisories) pass through.
fn enable_filter(violations: Vec<Violation>, ctx: &ProcessContext<'_>) -> Vec<Violation> {
    violations
        .into_iter()
        .filter(|v| !ctx.registry.contains(&v.rule_code) || ctx.enabled_rules.contains(&v.rule_code))
        .collect()
}

/// Drops violations covered by ignore directives, and drops unused-ignore
/// advisory candidates whose directive suppressed something.
fn directive_filter(violations: Vec<Violation>, ctx: &ProcessContext<'_>) -> Vec<Violation> {
    let used: Vec<bool> = ctx
        .directives
        .ignores
        .iter()
        .map(|d| {
            violations.iter().any(|v| {
                v.rule_code != UNUSED_IGNORE_CODE
                    && d.covers(&v.rule_code, v.location.start.line, v.location.end_line())
            })
        })
        .collect();

    violations
        .into_iter()
        .filter(|v| {
            if v.rule_code == UNUSED_IGNORE_CODE {
                // Keep the advisory only while its directive stays unused.
                return ctx
                    .directives
                    .ignores
                    .iter()
                    .zip(&used)
                    .all(|(d, &u)| d.line != v.location.start.line || !u);
            }
            !ctx.directives
                .suppresses(&v.rule_code, v.location.start.line, v.location.end_line())
        })
        .collect()
}

/// Collapses exact duplicates (same rule code, location, and message); the
/// first wins.
fn deduplicate(violations: Vec<Violation>) -> Vec<Violation> {
    let mut seen = HashSet::new();
    violations
        .into_iter()
        .filter(|v| seen.insert(v.dedup_key()))
        .collect()
}

/// Total order: `(file, start.line, start.column, rule_code)`.
fn sort(mut violations: Vec<Violation>) -> Vec<Violation> {
    violations.sort_by(|a, b| {
        (
            &a.location.file,
            a.location.start.line,
            a.location.start.column,
            &a.rule_code,
        )
            .cmp(&(
                &b.location.file,
                b.location.start.line,
                b.location.start.column,
                &b.rule_code,
            ))
    });
    violations
}
