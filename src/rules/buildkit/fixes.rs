//! Fix generators for BuildKit parser-warning rules.
//!
//! These work by scanning the affected source lines for the tokens to
//! rewrite, so edits stay byte-accurate even when the parser normalized
//! the instruction text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::{FixSafety, LintInput, Location, SuggestedFix, TextEdit};

/// Extracts the stage name from BuildKit's warning message
/// ("Stage name 'Builder' should be lowercase").
static STAGE_CASING_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Stage name '([^']+)' should be lowercase").unwrap());

/// Byte ranges of whitespace-separated tokens in a line.
fn tokens(line: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, b) in line.bytes().enumerate() {
        if b.is_ascii_whitespace() {
            if let Some(s) = start.take() {
                out.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push((s, line.len()));
    }
    out
}

/// Finds the AS keyword and the stage name after it on a FROM line.
/// Returns (as_start, as_end, name_start, name_end).
fn find_as_keyword(line: &str) -> Option<(usize, usize, usize, usize)> {
    let toks = tokens(line);
    for (i, &(s, e)) in toks.iter().enumerate() {
        if line[s..e].eq_ignore_ascii_case("as") && i > 0 {
            let &(ns, ne) = toks.get(i + 1)?;
            return Some((s, e, ns, ne));
        }
    }
    None
}

/// Finds the base-image token on a FROM line, skipping the keyword and any
/// `--platform` flags.
fn find_from_base_name(line: &str) -> Option<(usize, usize)> {
    let toks = tokens(line);
    let mut iter = toks.iter();
    let &(s, e) = iter.next()?;
    if !line[s..e].eq_ignore_ascii_case("from") {
        return None;
    }
    for &(s, e) in iter {
        if line[s..e].starts_with("--") {
            continue;
        }
        return Some((s, e));
    }
    None
}

/// Finds the value range of `--from=` on a COPY line.
fn find_copy_from_value(line: &str) -> Option<(usize, usize)> {
    for (s, e) in tokens(line) {
        let tok = &line[s..e];
        if let Some(rest) = tok.strip_prefix("--from=") {
            let value_start = s + tok.len() - rest.len();
            return Some((value_start, e));
        }
    }
    None
}

/// Builds the multi-edit fix for StageNameCasing: lowercases the stage
/// definition and every `FROM <alias>` and `COPY --from=<alias>` reference.
pub(super) fn stage_name_casing_fix(
    message: &str,
    input: &LintInput<'_>,
) -> Option<SuggestedFix> {
    let caps = STAGE_CASING_MESSAGE.captures(message)?;
    let stage_name = caps.get(1)?.as_str();
    let lower = stage_name.to_lowercase();
    let stage_idx = input.semantic.stage_index_by_name(stage_name)?;
    let sm = input.source_map();

    let mut edits = Vec::new();

    // The stage definition itself.
    let stage = input.stages().get(stage_idx)?;
    let def_line = stage.span.start.line;
    if let Some(line) = sm.line(def_line) {
        if let Some((_, _, ns, ne)) = find_as_keyword(line) {
            if line[ns..ne].eq_ignore_ascii_case(stage_name) {
                edits.push(TextEdit {
                    location: Location::range(input.file, def_line, ns, def_line, ne),
                    new_text: lower.clone(),
                });
            }
        }
    }

    // Every reference in later stages.
    for info in input.semantic.stages() {
        let base = &info.base_image;
        if base.is_stage_ref && base.stage_index == Some(stage_idx) {
            let line_no = base.span.start.line;
            if let Some(line) = sm.line(line_no) {
                if let Some((s, e)) = find_from_base_name(line) {
                    if line[s..e].eq_ignore_ascii_case(stage_name) {
                        edits.push(TextEdit {
                            location: Location::range(input.file, line_no, s, line_no, e),
                            new_text: lower.clone(),
                        });
                    }
                }
            }
        }

        for copy_ref in &info.copy_from_refs {
            if !copy_ref.is_stage_ref || copy_ref.stage_index != Some(stage_idx) {
                continue;
            }
            let line_no = copy_ref.span.start.line;
            let Some(line) = sm.line(line_no) else { continue };
            let Some((s, e)) = find_copy_from_value(line) else {
                continue;
            };
            if line[s..e].eq_ignore_ascii_case(stage_name) {
                edits.push(TextEdit {
                    location: Location::range(input.file, line_no, s, line_no, e),
                    new_text: lower.clone(),
                });
            }
        }
    }

    if edits.is_empty() {
        return None;
    }

    Some(SuggestedFix {
        description: format!("Rename stage '{stage_name}' to '{lower}'"),
        safety: FixSafety::Safe,
        priority: 0,
        edits,
        is_preferred: true,
        needs_resolve: false,
    })
}

/// Builds the fix for FromAsCasing: rewrites the AS keyword to match the
/// FROM keyword's casing.
pub(super) fn from_as_casing_fix(line_no: usize, input: &LintInput<'_>) -> Option<SuggestedFix> {
    let sm = input.source_map();
    let line = sm.line(line_no)?;

    let toks = tokens(line);
    let &(fs, fe) = toks.first()?;
    let from_kw = &line[fs..fe];
    if !from_kw.eq_ignore_ascii_case("from") {
        return None;
    }
    let from_is_upper = !from_kw.chars().any(|c| c.is_ascii_lowercase());

    let (as_start, as_end, _, _) = find_as_keyword(line)?;
    let current = &line[as_start..as_end];
    let wanted = if from_is_upper { "AS" } else { "as" };
    if current == wanted {
        return None;
    }

    Some(SuggestedFix {
        description: format!("Change '{current}' to '{wanted}' to match FROM casing"),
        safety: FixSafety::Safe,
        priority: 0,
        edits: vec![TextEdit {
            location: Location::range(input.file, line_no, as_start, line_no, as_end),
            new_text: wanted.to_string(),
        }],
        is_preferred: true,
        needs_resolve: false,
    })
}

/// Shell metacharacters that make a naive shell→exec conversion unsafe.
const SHELL_META: &[char] = &[
    '$', '`', '|', '&', ';', '<', '>', '(', ')', '*', '?', '{', '}', '[', ']', '~', '#', '\\',
    '\'', '"',
];

/// Builds the fix for JSONArgsRecommended: converts a simple shell-form
/// CMD/ENTRYPOINT to exec form. Withheld when the command contains shell
/// metacharacters or spans continuation lines, where the rewrite would
/// change behavior.
pub(super) fn json_args_fix(
    line_no: usize,
    end_line: usize,
    input: &LintInput<'_>,
) -> Option<SuggestedFix> {
    if end_line != line_no {
        return None;
    }
    let sm = input.source_map();
    let line = sm.line(line_no)?;

    let toks = tokens(line);
    let &(ks, ke) = toks.first()?;
    let keyword = &line[ks..ke];
    if !keyword.eq_ignore_ascii_case("cmd") && !keyword.eq_ignore_ascii_case("entrypoint") {
        return None;
    }
    let args_start = toks.get(1)?.0;
    let args = &line[args_start..];
    if args.contains(SHELL_META) {
        return None;
    }

    let words: Vec<&str> = args.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let json = serde_json::to_string(&words).ok()?;

    Some(SuggestedFix {
        description: format!("Convert {} to exec (JSON array) form", keyword.to_uppercase()),
        safety: FixSafety::Suggestion,
        priority: 0,
        edits: vec![TextEdit {
            location: Location::range(input.file, line_no, args_start, line_no, line.len()),
            new_text: json,
        }],
        is_preferred: false,
        needs_resolve: false,
    })
}
