//! Core violation types: locations, severities, suggested fixes.

use serde::{Deserialize, Serialize};

/// Severity levels for violations.
///
/// `Off` is only meaningful as a configuration override: a violation whose
/// severity resolves to `Off` is dropped by the processor chain and never
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Style,
    Off,
}

impl Severity {
    /// Numeric rank for threshold comparisons; higher is more severe.
    fn rank(self) -> u8 {
        match self {
            Severity::Error => 4,
            Severity::Warning => 3,
            Severity::Info => 2,
            Severity::Style => 1,
            Severity::Off => 0,
        }
    }

    /// True when `self` is at least as severe as `threshold`.
    pub fn at_least(self, threshold: Severity) -> bool {
        self.rank() >= threshold.rank()
    }

    pub fn is_off(self) -> bool {
        matches!(self, Severity::Off)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Style => "style",
            Severity::Off => "off",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            "style" => Ok(Severity::Style),
            "off" => Ok(Severity::Off),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// A single point in a source file. Lines are 1-based; columns are 0-based
/// byte offsets within the line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    #[serde(default)]
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }

    pub fn is_zero(self) -> bool {
        self.line == 0 && self.column == 0
    }
}

/// A range in a source file. When `end` is the zero value this is a point
/// location; when `start.line` is 0 this is a file-level location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub start: Position,
    #[serde(default)]
    pub end: Position,
}

impl Location {
    /// A location for file-level issues (no specific line).
    pub fn file_level(file: impl Into<String>) -> Self {
        Location {
            file: file.into(),
            start: Position::default(),
            end: Position::default(),
        }
    }

    /// A point location on a specific line.
    pub fn line(file: impl Into<String>, line: usize) -> Self {
        Location {
            file: file.into(),
            start: Position::new(line, 0),
            end: Position::default(),
        }
    }

    /// A location spanning lines/columns.
    pub fn range(
        file: impl Into<String>,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Location {
            file: file.into(),
            start: Position::new(start_line, start_col),
            end: Position::new(end_line, end_col),
        }
    }

    pub fn is_file_level(&self) -> bool {
        self.start.line == 0
    }

    pub fn is_point(&self) -> bool {
        self.end.is_zero()
    }

    /// The last line covered by this location (equal to the start line for
    /// point locations).
    pub fn end_line(&self) -> usize {
        if self.is_point() || self.end.line < self.start.line {
            self.start.line
        } else {
            self.end.line
        }
    }

    /// True when the given 1-based line falls inside this location.
    pub fn covers_line(&self, line: usize) -> bool {
        !self.is_file_level() && line >= self.start.line && line <= self.end_line()
    }
}

/// Safety tier of a suggested fix, from lossless to semantics-changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixSafety {
    /// Lossless, semantics-preserving (casing, keyword normalization).
    Safe,
    /// Likely correct but needs review (apt → apt-get).
    Suggestion,
    /// Semantic transformation; requires explicit opt-in.
    Unsafe,
}

impl std::fmt::Display for FixSafety {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FixSafety::Safe => "safe",
            FixSafety::Suggestion => "suggestion",
            FixSafety::Unsafe => "unsafe",
        };
        write!(f, "{s}")
    }
}

/// A single text replacement. The location is resolved to a byte range
/// against the source at apply time; the fix engine validates the cut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub location: Location,
    pub new_text: String,
}

/// A non-executable repair proposal attached to a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedFix {
    pub description: String,
    pub safety: FixSafety,
    /// Higher-priority fixes win conflicts and apply first.
    #[serde(default)]
    pub priority: i32,
    pub edits: Vec<TextEdit>,
    #[serde(default)]
    pub is_preferred: bool,
    /// Marks async fixes an external resolver produces; the core fix engine
    /// drops these.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_resolve: bool,
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub location: Location,
    pub rule_code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<SuggestedFix>,
}

impl Violation {
    pub fn new(
        location: Location,
        rule_code: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Violation {
            location,
            rule_code: rule_code.into(),
            message: message.into(),
            detail: String::new(),
            severity,
            doc_url: None,
            source_code: None,
            suggested_fix: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }

    pub fn with_source_code(mut self, code: impl Into<String>) -> Self {
        self.source_code = Some(code.into());
        self
    }

    pub fn with_suggested_fix(mut self, fix: SuggestedFix) -> Self {
        self.suggested_fix = Some(fix);
        self
    }

    pub fn file(&self) -> &str {
        &self.location.file
    }

    /// Start line; 0 for file-level violations.
    pub fn line(&self) -> usize {
        self.location.start.line
    }

    /// Key for exact-duplicate collapsing: same rule code, same location,
    /// same message.
    pub fn dedup_key(&self) -> (String, usize, usize, usize, usize, String) {
        (
            self.rule_code.clone(),
            self.location.start.line,
            self.location.start.column,
            self.location.end.line,
            self.location.end.column,
            self.message.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error.at_least(Severity::Warning));
        assert!(Severity::Warning.at_least(Severity::Warning));
        assert!(!Severity::Info.at_least(Severity::Warning));
        assert!(!Severity::Off.at_least(Severity::Style));
    }

    #[test]
    fn test_severity_roundtrip() {
        for s in ["error", "warning", "info", "style", "off"] {
            let sev: Severity = s.parse().unwrap();
            assert_eq!(sev.to_string(), s);
        }
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn test_location_kinds() {
        let file = Location::file_level("Dockerfile");
        assert!(file.is_file_level());

        let point = Location::line("Dockerfile", 5);
        assert!(!point.is_file_level());
        assert!(point.is_point());
        assert_eq!(point.end_line(), 5);

        let range = Location::range("Dockerfile", 2, 0, 4, 10);
        assert!(!range.is_point());
        assert_eq!(range.end_line(), 4);
        assert!(range.covers_line(3));
        assert!(!range.covers_line(5));
    }

    #[test]
    fn test_violation_builder() {
        let v = Violation::new(
            Location::line("Dockerfile", 1),
            "hadolint/DL3004",
            "do not use sudo",
            Severity::Error,
        )
        .with_detail("use USER instead")
        .with_doc_url("https://github.com/hadolint/hadolint/wiki/DL3004");

        assert_eq!(v.file(), "Dockerfile");
        assert_eq!(v.line(), 1);
        assert_eq!(v.detail, "use USER instead");
        assert!(v.doc_url.is_some());
        assert!(v.suggested_fix.is_none());
    }

    #[test]
    fn test_violation_json_roundtrip() {
        let v = Violation::new(
            Location::range("Dockerfile", 2, 4, 2, 7),
            "hadolint/DL3027",
            "do not use apt",
            Severity::Warning,
        )
        .with_suggested_fix(SuggestedFix {
            description: "Replace apt with apt-get".to_string(),
            safety: FixSafety::Suggestion,
            priority: 0,
            edits: vec![TextEdit {
                location: Location::range("Dockerfile", 2, 4, 2, 7),
                new_text: "apt-get".to_string(),
            }],
            is_preferred: false,
            needs_resolve: false,
        });

        let json = serde_json::to_string(&v).unwrap();
        let parsed: Violation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, v);

        // Severity serializes lowercase per the violation JSON schema.
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("\"safety\":\"suggestion\""));
    }
}
