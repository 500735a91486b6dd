//! Line-indexed view over a source buffer.

/// A line index over a UTF-8 source buffer. Lines are addressed 1-based to
/// match violation locations; columns are 0-based byte offsets within the
/// line.
#[derive(Debug, Clone)]
pub struct SourceMap<'a> {
    source: &'a str,
    /// Byte offset of the start of each line.
    line_starts: Vec<usize>,
}

impl<'a> SourceMap<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        // A trailing newline is a terminator, not a new line.
        if source.ends_with('\n') {
            line_starts.pop();
        }
        if source.is_empty() {
            line_starts.clear();
        }
        SourceMap {
            source,
            line_starts,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Returns the 1-based line `n` without its trailing newline, or `None`
    /// when out of range.
    pub fn line(&self, n: usize) -> Option<&'a str> {
        if n == 0 || n > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[n - 1];
        let end = self
            .line_starts
            .get(n)
            .map(|&next| next - 1)
            .unwrap_or_else(|| {
                let mut end = self.source.len();
                if self.source.ends_with('\n') {
                    end -= 1;
                }
                end
            });
        Some(&self.source[start..end])
    }

    /// Resolves a (1-based line, 0-based column) pair to a byte offset.
    /// The column may equal the line length (pointing just past the last
    /// character, before the newline).
    pub fn offset(&self, line: usize, column: usize) -> Option<usize> {
        let text = self.line(line)?;
        if column > text.len() {
            return None;
        }
        Some(self.line_starts[line - 1] + column)
    }

    /// Inclusive snippet of lines `start..=end` (1-based), clamped to the
    /// buffer.
    pub fn snippet(&self, start: usize, end: usize) -> String {
        let start = start.max(1);
        let end = end.min(self.line_count());
        if start > end {
            return String::new();
        }
        (start..=end)
            .filter_map(|n| self.line(n))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
