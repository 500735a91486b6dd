//! The fix engine: selects, orders, and applies non-conflicting text edits.
//!
//! Fixes are filtered by safety threshold, rule filter, and per-rule mode
//! policy; ordered by priority then source position; checked for byte-range
//! conflicts (higher priority wins); and applied in reverse source order so
//! earlier offsets stay valid. Applying the engine to its own output with
//! the same threshold yields no further changes.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::{Config, FixMode};
use crate::parser::SourceMap;
use crate::rules::{FixSafety, Violation};

/// Why a fix was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Above the safety threshold.
    Safety,
    /// Excluded by the fix rule filter.
    RuleFilter,
    /// Byte range overlaps a higher-priority fix.
    Conflict,
    /// An edit range was not a valid cut of the source.
    Invalid,
    /// The rule's configured fix mode excluded it.
    ModePolicy,
}

/// Options for one fix-engine run.
#[derive(Debug, Clone)]
pub struct FixOptions {
    /// Most permissive safety tier to apply.
    pub safety_threshold: FixSafety,
    /// When set, only fixes from these rules apply.
    pub rule_filter: Option<BTreeSet<String>>,
}

impl Default for FixOptions {
    fn default() -> Self {
        FixOptions {
            safety_threshold: FixSafety::Safe,
            rule_filter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedFix {
    pub rule_code: String,
    pub description: String,
    pub safety: FixSafety,
    pub edit_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFix {
    pub rule_code: String,
    pub description: String,
    pub reason: SkipReason,
}

/// The engine's per-file report.
#[derive(Debug, Clone, Serialize)]
pub struct FixOutcome {
    pub original: String,
    pub modified: String,
    pub applied: Vec<AppliedFix>,
    pub skipped: Vec<SkippedFix>,
}

impl FixOutcome {
    pub fn changed(&self) -> bool {
        self.original != self.modified
    }
}

/// A fix whose edits resolved to byte ranges.
struct Candidate<'a> {
    violation: &'a Violation,
    priority: i32,
    /// Resolved `(start, end, replacement)` ranges.
    ranges: Vec<(usize, usize, &'a str)>,
    start: usize,
}

/// Applies eligible fixes from `violations` to `source`.
pub fn apply_fixes(
    source: &str,
    violations: &[Violation],
    options: &FixOptions,
    config: &Config,
) -> FixOutcome {
    let sm = SourceMap::new(source);
    let mut skipped = Vec::new();
    let mut candidates: Vec<Candidate<'_>> = Vec::new();

    for violation in violations {
        let Some(fix) = &violation.suggested_fix else {
            continue;
        };
        // Async fixes are an external resolver's concern.
        if fix.needs_resolve {
            continue;
        }

        let skip = |reason| SkippedFix {
            rule_code: violation.rule_code.clone(),
            description: fix.description.clone(),
            reason,
        };

        if let Some(filter) = &options.rule_filter {
            if !filter.contains(&violation.rule_code) {
                skipped.push(skip(SkipReason::RuleFilter));
                continue;
            }
        }

        let mode = config.fix_mode(&violation.rule_code);
        let threshold = match mode {
            FixMode::Never => {
                skipped.push(skip(SkipReason::ModePolicy));
                continue;
            }
            FixMode::Explicit => {
                let named = options
                    .rule_filter
                    .as_ref()
                    .is_some_and(|f| f.contains(&violation.rule_code));
                if !named {
                    skipped.push(skip(SkipReason::ModePolicy));
                    continue;
                }
                options.safety_threshold
            }
            FixMode::UnsafeOnly => {
                if fix.safety != FixSafety::Unsafe {
                    skipped.push(skip(SkipReason::ModePolicy));
                    continue;
                }
                FixSafety::Unsafe
            }
            FixMode::Always => options.safety_threshold,
        };

        if fix.safety > threshold {
            skipped.push(skip(SkipReason::Safety));
            continue;
        }

        // Resolve and validate every edit; the fix applies atomically or
        // not at all.
        match resolve_ranges(fix, &sm, source.len()) {
            Some(ranges) => {
                let start = ranges.iter().map(|r| r.0).min().unwrap_or(0);
                candidates.push(Candidate {
                    violation,
                    priority: fix.priority,
                    ranges,
                    start,
                });
            }
            None => skipped.push(skip(SkipReason::Invalid)),
        }
    }

    // Priority descending, then source position, then stable tie-breakers
    // so the engine's output is a total order over its input.
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.start.cmp(&b.start))
            .then(a.violation.rule_code.cmp(&b.violation.rule_code))
            .then_with(|| {
                let da = a.violation.suggested_fix.as_ref().map(|f| &f.description);
                let db = b.violation.suggested_fix.as_ref().map(|f| &f.description);
                da.cmp(&db)
            })
    });

    // Conflict detection: the higher-priority fix is kept.
    let mut kept: Vec<&Candidate<'_>> = Vec::new();
    let mut applied = Vec::new();
    for candidate in &candidates {
        let conflicts = kept.iter().any(|k| {
            k.ranges.iter().any(|(ks, ke, _)| {
                candidate
                    .ranges
                    .iter()
                    .any(|(cs, ce, _)| ranges_overlap(*ks, *ke, *cs, *ce))
            })
        });
        let fix = candidate
            .violation
            .suggested_fix
            .as_ref()
            .expect("candidates carry fixes");
        if conflicts {
            skipped.push(SkippedFix {
                rule_code: candidate.violation.rule_code.clone(),
                description: fix.description.clone(),
                reason: SkipReason::Conflict,
            });
        } else {
            applied.push(AppliedFix {
                rule_code: candidate.violation.rule_code.clone(),
                description: fix.description.clone(),
                safety: fix.safety,
                edit_count: candidate.ranges.len(),
            });
            kept.push(candidate);
        }
    }

    // Apply surviving edits in reverse source order so earlier offsets
    // stay valid.
    let mut edits: Vec<(usize, usize, &str)> = kept
        .iter()
        .flat_map(|c| c.ranges.iter().copied())
        .collect();
    edits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

    let mut modified = source.to_string();
    for (start, end, text) in edits {
        modified.replace_range(start..end, text);
    }

    FixOutcome {
        original: source.to_string(),
        modified,
        applied,
        skipped,
    }
}

/// Resolves a fix's edits to byte ranges, validating each: positions must
/// exist in the source and edits within a fix must not overlap each other.
fn resolve_ranges<'a>(
    fix: &'a crate::rules::SuggestedFix,
    sm: &SourceMap<'_>,
    source_len: usize,
) -> Option<Vec<(usize, usize, &'a str)>> {
    let mut ranges = Vec::new();
    for edit in &fix.edits {
        let loc = &edit.location;
        if loc.is_file_level() {
            return None;
        }
        let start = sm.offset(loc.start.line, loc.start.column)?;
        let end = if loc.is_point() {
            start
        } else {
            sm.offset(loc.end.line, loc.end.column)?
        };
        if start > end || end > source_len {
            return None;
        }
        ranges.push((start, end, edit.new_text.as_str()));
    }
    // Overlapping edits within a single fix are disallowed.
    for (i, a) in ranges.iter().enumerate() {
        for b in ranges.iter().skip(i + 1) {
            if ranges_overlap(a.0, a.1, b.0, b.1) {
                return None;
            }
        }
    }
    Some(ranges)
}

fn ranges_overlap(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> bool {
    // An insertion conflicts when it lands inside another edit's range,
    // including its start boundary (inserting before text that another fix
    // replaces), but not its end boundary.
    if a_start == a_end {
        return b_start <= a_start && a_start < b_end;
    }
    if b_start == b_end {
        return a_start <= b_start && b_start < a_end;
    }
    a_start < b_end && b_start < a_end
}
