//! Inline suppression of violations via comments.
//!
//! Three equivalent surface syntaxes are recognized:
//! - `# tally ignore=CODE[,CODE…]` and `# tally global ignore=…`
//! - `# hadolint ignore=…` and `# hadolint global ignore=…` (migration
//!   compatibility)
//! - `# check=skip=…` (buildx compatibility)
//!
//! Non-global directives suppress the next non-comment instruction; global
//! directives suppress file-wide. `CODE` may be the literal `all`.
//! Whitespace around `=` and commas is ignored; codes are case-sensitive.
//!
//! A shell directive is also recognized: `# tally shell=pwsh` (or
//! `# hadolint shell=…`) pins the shell variant for stages that do not set
//! one via SHELL.

use lazy_static::lazy_static;
use regex::Regex;

/// How a suppression applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveScope {
    /// Applies to the next non-comment instruction.
    Line,
    /// Applies to the entire file.
    File,
}

/// The codes a directive names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSet {
    /// `ignore=all`
    All,
    Codes(Vec<String>),
}

impl CodeSet {
    /// True when this set covers the given rule code. A bare code matches
    /// the full rule code or its segment after the namespace prefix
    /// (`DL3006` matches `hadolint/DL3006`).
    pub fn matches(&self, rule_code: &str) -> bool {
        match self {
            CodeSet::All => true,
            CodeSet::Codes(codes) => codes.iter().any(|c| code_matches(c, rule_code)),
        }
    }
}

fn code_matches(code: &str, rule_code: &str) -> bool {
    if code == rule_code {
        return true;
    }
    rule_code
        .rsplit_once('/')
        .is_some_and(|(_, tail)| tail == code)
}

/// One ignore directive found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreDirective {
    pub scope: DirectiveScope,
    pub codes: CodeSet,
    /// 1-based line of the directive comment itself.
    pub line: usize,
    /// For `Line` scope: the 1-based line of the next non-comment
    /// instruction, when one exists.
    pub target_line: Option<usize>,
}

impl IgnoreDirective {
    /// True when this directive suppresses a violation with the given rule
    /// code starting at `start_line` (0 for file-level) and covering
    /// through `end_line`.
    pub fn covers(&self, rule_code: &str, start_line: usize, end_line: usize) -> bool {
        if !self.codes.matches(rule_code) {
            return false;
        }
        match self.scope {
            DirectiveScope::File => true,
            DirectiveScope::Line => match self.target_line {
                // File-level violations are only suppressed by global scope.
                Some(target) if start_line > 0 => start_line <= target && target <= end_line,
                _ => false,
            },
        }
    }
}

/// `# tally shell=…` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellDirective {
    pub shell: String,
    pub line: usize,
}

/// Everything the scanner extracted from comments.
#[derive(Debug, Clone, Default)]
pub struct DirectiveSet {
    pub ignores: Vec<IgnoreDirective>,
    pub shell_directives: Vec<ShellDirective>,
}

lazy_static! {
    static ref IGNORE_PATTERN: Regex =
        Regex::new(r"^#\s*(?:tally|hadolint)\s+(global\s+)?ignore\s*=\s*(.+)$").unwrap();
    static ref CHECK_SKIP_PATTERN: Regex =
        Regex::new(r"^#\s*check\s*=\s*skip\s*=\s*(.+)$").unwrap();
    static ref SHELL_PATTERN: Regex =
        Regex::new(r"^#\s*(?:tally|hadolint)\s+shell\s*=\s*(\S+)\s*$").unwrap();
}

impl DirectiveSet {
    /// Scans source comments for directives.
    pub fn scan(source: &str) -> DirectiveSet {
        let lines: Vec<&str> = source.lines().collect();
        let mut set = DirectiveSet::default();

        for (idx, raw) in lines.iter().enumerate() {
            let line_number = idx + 1;
            let trimmed = raw.trim();
            if !trimmed.starts_with('#') {
                continue;
            }

            if let Some(caps) = IGNORE_PATTERN.captures(trimmed) {
                let scope = if caps.get(1).is_some() {
                    DirectiveScope::File
                } else {
                    DirectiveScope::Line
                };
                set.push_ignore(scope, &caps[2], line_number, &lines);
                continue;
            }

            if let Some(caps) = CHECK_SKIP_PATTERN.captures(trimmed) {
                set.push_ignore(DirectiveScope::Line, &caps[1], line_number, &lines);
                continue;
            }

            if let Some(caps) = SHELL_PATTERN.captures(trimmed) {
                set.shell_directives.push(ShellDirective {
                    shell: caps[1].to_string(),
                    line: line_number,
                });
            }
        }

        set
    }

    fn push_ignore(&mut self, scope: DirectiveScope, spec: &str, line: usize, lines: &[&str]) {
        let codes = parse_codes(spec);
        let target_line = match scope {
            DirectiveScope::File => None,
            DirectiveScope::Line => next_instruction_line(lines, line),
        };
        self.ignores.push(IgnoreDirective {
            scope,
            codes,
            line,
            target_line,
        });
    }

    /// True when a violation with the given rule code, starting at
    /// `start_line` (0 for file-level) and covering through `end_line`, is
    /// suppressed.
    pub fn suppresses(&self, rule_code: &str, start_line: usize, end_line: usize) -> bool {
        self.ignores
            .iter()
            .any(|d| d.covers(rule_code, start_line, end_line))
    }
}

/// Splits a code list, normalizing whitespace; `all` collapses to `All`.
fn parse_codes(spec: &str) -> CodeSet {
    let codes: Vec<String> = spec
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if codes.iter().any(|c| c == "all") {
        CodeSet::All
    } else {
        CodeSet::Codes(codes)
    }
}

/// Finds the next non-blank, non-comment line after the directive.
fn next_instruction_line(lines: &[&str], directive_line: usize) -> Option<usize> {
    for (idx, raw) in lines.iter().enumerate().skip(directive_line) {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        return Some(idx + 1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_tally_ignore() {
        let set = DirectiveSet::scan("FROM alpine\n# tally ignore=hadolint/DL3006\nFROM ubuntu\n");
        assert_eq!(set.ignores.len(), 1);
        let d = &set.ignores[0];
        assert_eq!(d.scope, DirectiveScope::Line);
        assert_eq!(d.line, 2);
        assert_eq!(d.target_line, Some(3));
        assert_eq!(
            d.codes,
            CodeSet::Codes(vec!["hadolint/DL3006".to_string()])
        );
    }

    #[test]
    fn test_scan_hadolint_compat() {
        let set = DirectiveSet::scan("# hadolint ignore=DL3006,DL3007\nFROM ubuntu\n");
        let d = &set.ignores[0];
        assert_eq!(
            d.codes,
            CodeSet::Codes(vec!["DL3006".to_string(), "DL3007".to_string()])
        );
        assert!(d.codes.matches("hadolint/DL3006"));
        assert!(d.codes.matches("hadolint/DL3007"));
        assert!(!d.codes.matches("hadolint/DL3004"));
    }

    #[test]
    fn test_scan_check_skip() {
        let set = DirectiveSet::scan("# check=skip=hadolint/DL3006\nFROM ubuntu\n");
        assert_eq!(set.ignores.len(), 1);
        assert_eq!(set.ignores[0].target_line, Some(2));
        assert!(set.ignores[0].codes.matches("hadolint/DL3006"));
    }

    #[test]
    fn test_scan_global_ignore() {
        let set = DirectiveSet::scan("# tally global ignore=DL3006\nFROM ubuntu\nFROM node\n");
        assert_eq!(set.ignores[0].scope, DirectiveScope::File);
        assert!(set.suppresses("hadolint/DL3006", 2, 2));
        assert!(set.suppresses("hadolint/DL3006", 3, 3));
        // File-level violations are covered by global scope.
        assert!(set.suppresses("hadolint/DL3006", 0, 0));
    }

    #[test]
    fn test_ignore_all() {
        let set = DirectiveSet::scan("# tally ignore=all\nFROM ubuntu\n");
        assert_eq!(set.ignores[0].codes, CodeSet::All);
        assert!(set.suppresses("hadolint/DL3006", 2, 2));
        assert!(set.suppresses("tally/max-lines", 2, 2));
        assert!(!set.suppresses("hadolint/DL3006", 3, 3));
    }

    #[test]
    fn test_whitespace_tolerated() {
        let set = DirectiveSet::scan("# tally ignore = DL3006 , DL3007\nFROM ubuntu\n");
        assert!(set.ignores[0].codes.matches("hadolint/DL3006"));
        assert!(set.ignores[0].codes.matches("hadolint/DL3007"));
    }

    #[test]
    fn test_codes_case_sensitive() {
        let set = DirectiveSet::scan("# tally ignore=dl3006\nFROM ubuntu\n");
        assert!(!set.ignores[0].codes.matches("hadolint/DL3006"));
    }

    #[test]
    fn test_directive_skips_comments_to_target() {
        let set =
            DirectiveSet::scan("# tally ignore=DL3006\n# another comment\n\nFROM ubuntu\n");
        assert_eq!(set.ignores[0].target_line, Some(4));
    }

    #[test]
    fn test_directive_at_eof_has_no_target() {
        let set = DirectiveSet::scan("FROM alpine\n# tally ignore=DL3006\n");
        assert_eq!(set.ignores[0].target_line, None);
        assert!(!set.suppresses("hadolint/DL3006", 1, 1));
    }

    #[test]
    fn test_multiline_violation_covered() {
        let set = DirectiveSet::scan("# tally ignore=DL3047\nRUN apk add \\\n    curl\n");
        // A violation spanning lines 2-3 intersects the target line 2.
        assert!(set.suppresses("hadolint/DL3047", 2, 3));
    }

    #[test]
    fn test_shell_directive() {
        let set = DirectiveSet::scan("# tally shell=pwsh\nFROM windows\n");
        assert_eq!(set.shell_directives.len(), 1);
        assert_eq!(set.shell_directives[0].shell, "pwsh");

        let hado = DirectiveSet::scan("# hadolint shell=powershell\nFROM windows\n");
        assert_eq!(hado.shell_directives[0].shell, "powershell");
    }

    #[test]
    fn test_unknown_directive_is_ignored() {
        let set = DirectiveSet::scan("# just a comment mentioning ignore\nFROM alpine\n");
        assert!(set.ignores.is_empty());
    }
}
