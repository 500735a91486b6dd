//! Tokenizer for POSIX-family shell scripts embedded in RUN instructions.
//!
//! Backslash-newline continuations are treated as whitespace; quoted text
//! collapses into the containing word; command substitutions (`$(…)` and
//! backticks) are captured on the word so queries can descend into them.

use super::Variant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokKind {
    Word,
    /// One of `&&`, `||`, `;`, `;;`, `|`, `|&`, `&`, `(`, `)`, `{`, `}`, `\n`.
    Op(&'static str),
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokKind,
    /// Word text with quotes resolved; operator text for ops.
    pub text: String,
    /// Inner scripts of `$(…)`/backtick substitutions within this word.
    pub substitutions: Vec<String>,
    /// 1-based line within the script.
    pub line: usize,
    /// 0-based byte column within the line.
    pub col: usize,
    /// Byte offsets into the original script.
    pub start_byte: usize,
    pub end_byte: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub message: String,
}

pub(crate) fn lex(script: &str, variant: Variant) -> Result<Vec<Token>, LexError> {
    Lexer::new(script, variant).run()
}

struct Lexer<'a> {
    src: &'a [u8],
    script: &'a str,
    variant: Variant,
    pos: usize,
    line: usize,
    col: usize,
    tokens: Vec<Token>,
    /// Heredoc delimiters awaiting their body after the next newline.
    pending_heredocs: Vec<String>,
}

impl<'a> Lexer<'a> {
    fn new(script: &'a str, variant: Variant) -> Self {
        Lexer {
            src: script.as_bytes(),
            script,
            variant,
            pos: 0,
            line: 1,
            col: 0,
            tokens: Vec::new(),
            pending_heredocs: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            match b {
                b' ' | b'\t' | b'\r' => self.advance(1),
                b'\\' if self.peek(1) == Some(b'\n') => {
                    // Continuation: swallow both characters.
                    self.advance(1);
                    self.newline_advance();
                }
                b'\n' => {
                    let start = self.pos;
                    self.push_op("\n", start);
                    self.newline_advance();
                    self.consume_heredoc_bodies()?;
                }
                b'#' => {
                    // Comment to end of line.
                    while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
                        self.advance(1);
                    }
                }
                b'&' | b'|' | b';' | b'(' | b')' | b'<' | b'>' => self.lex_operator()?,
                _ if b.is_ascii_digit() && self.redirect_after_digits() => self.lex_operator()?,
                _ => self.lex_word()?,
            }
        }
        Ok(self.tokens)
    }

    fn peek(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
        self.col += n;
    }

    fn newline_advance(&mut self) {
        self.pos += 1;
        self.line += 1;
        self.col = 0;
    }

    fn push_op(&mut self, op: &'static str, start_byte: usize) {
        self.tokens.push(Token {
            kind: TokKind::Op(op),
            text: op.to_string(),
            substitutions: Vec::new(),
            line: self.line,
            col: self.col,
            start_byte,
            end_byte: start_byte + op.len(),
        });
    }

    /// True when the bytes at `pos` are digits immediately followed by a
    /// redirect character (`2>`, `2>&1`).
    fn redirect_after_digits(&self) -> bool {
        let mut i = self.pos;
        while i < self.src.len() && self.src[i].is_ascii_digit() {
            i += 1;
        }
        i > self.pos && matches!(self.src.get(i), Some(b'>') | Some(b'<'))
    }

    fn lex_operator(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        // Swallow a leading fd number on redirects.
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
            self.advance(1);
        }
        let b = self.src[self.pos];
        match b {
            b'&' => {
                if self.peek(1) == Some(b'&') {
                    self.push_op("&&", start);
                    self.advance(2);
                } else if self.peek(1) == Some(b'>') {
                    // `&>file`: redirect, discarded with its target.
                    self.advance(2);
                    self.skip_redirect_target();
                } else {
                    self.push_op("&", start);
                    self.advance(1);
                }
            }
            b'|' => {
                if self.peek(1) == Some(b'|') {
                    self.push_op("||", start);
                    self.advance(2);
                } else if self.peek(1) == Some(b'&')
                    && matches!(self.variant, Variant::Bash | Variant::Zsh)
                {
                    self.push_op("|&", start);
                    self.advance(2);
                } else {
                    self.push_op("|", start);
                    self.advance(1);
                }
            }
            b';' => {
                if self.peek(1) == Some(b';') {
                    self.push_op(";;", start);
                    self.advance(2);
                } else {
                    self.push_op(";", start);
                    self.advance(1);
                }
            }
            b'(' => {
                self.push_op("(", start);
                self.advance(1);
            }
            b')' => {
                self.push_op(")", start);
                self.advance(1);
            }
            b'<' => {
                if self.peek(1) == Some(b'<') {
                    // Heredoc: `<<` or `<<-`, delimiter word follows.
                    self.advance(2);
                    if self.peek(0) == Some(b'-') {
                        self.advance(1);
                    }
                    self.skip_blanks();
                    let delim = self.read_raw_word();
                    if delim.is_empty() {
                        return Err(LexError {
                            message: "heredoc without delimiter".to_string(),
                        });
                    }
                    self.pending_heredocs.push(unquote(&delim));
                } else {
                    // Input redirect, discarded with its target.
                    self.advance(1);
                    self.skip_redirect_target();
                }
            }
            b'>' => {
                // `>`, `>>`, `>&1` forms, discarded with their target.
                self.advance(1);
                if self.peek(0) == Some(b'>') {
                    self.advance(1);
                }
                if self.peek(0) == Some(b'&') {
                    self.advance(1);
                    while self
                        .peek(0)
                        .map(|c| c.is_ascii_digit() || c == b'-')
                        .unwrap_or(false)
                    {
                        self.advance(1);
                    }
                } else {
                    self.skip_redirect_target();
                }
            }
            _ => unreachable!("lex_operator called on non-operator"),
        }
        Ok(())
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(0), Some(b' ') | Some(b'\t')) {
            self.advance(1);
        }
    }

    /// Skips a redirect's target word without emitting a token.
    fn skip_redirect_target(&mut self) {
        self.skip_blanks();
        let _ = self.read_raw_word();
    }

    /// Reads a bare word without quote processing (used for redirect
    /// targets and heredoc delimiters).
    fn read_raw_word(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            if b.is_ascii_whitespace() || matches!(b, b'&' | b'|' | b';' | b'(' | b')') {
                break;
            }
            self.advance(1);
        }
        self.script[start..self.pos].to_string()
    }

    /// After a newline, swallows pending heredoc bodies up to and including
    /// each delimiter line.
    fn consume_heredoc_bodies(&mut self) -> Result<(), LexError> {
        let delims = std::mem::take(&mut self.pending_heredocs);
        for delim in delims {
            loop {
                if self.pos >= self.src.len() {
                    return Err(LexError {
                        message: format!("unterminated heredoc {delim:?}"),
                    });
                }
                let line_end = self.script[self.pos..]
                    .find('\n')
                    .map(|i| self.pos + i)
                    .unwrap_or(self.src.len());
                let line = &self.script[self.pos..line_end];
                let stripped = line.trim_start_matches('\t');
                let matched = stripped == delim;
                self.pos = line_end;
                self.col = 0;
                if self.pos < self.src.len() {
                    self.newline_advance();
                } else {
                    self.line += 1;
                }
                if matched {
                    break;
                }
            }
        }
        Ok(())
    }

    fn lex_word(&mut self) -> Result<(), LexError> {
        let start_byte = self.pos;
        let line = self.line;
        let col = self.col;
        let mut text = String::new();
        let mut substitutions = Vec::new();

        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => break,
                b'&' | b'|' | b';' | b'(' | b')' | b'<' | b'>' => break,
                b'\\' => {
                    if self.peek(1) == Some(b'\n') {
                        break; // continuation handled by the main loop
                    }
                    // Escaped char becomes literal.
                    self.advance(1);
                    if self.pos < self.src.len() {
                        let ch = self.script[self.pos..].chars().next().unwrap();
                        text.push(ch);
                        self.advance(ch.len_utf8());
                    }
                }
                b'\'' => {
                    self.advance(1);
                    let close = self.script[self.pos..].find('\'').ok_or_else(|| LexError {
                        message: "unterminated single quote".to_string(),
                    })?;
                    text.push_str(&self.script[self.pos..self.pos + close]);
                    self.advance_over(close + 1);
                }
                b'"' => {
                    self.advance(1);
                    self.lex_double_quoted(&mut text, &mut substitutions)?;
                }
                b'`' => {
                    self.advance(1);
                    let close = self.script[self.pos..].find('`').ok_or_else(|| LexError {
                        message: "unterminated backquote".to_string(),
                    })?;
                    let inner = &self.script[self.pos..self.pos + close];
                    substitutions.push(inner.to_string());
                    text.push('`');
                    text.push_str(inner);
                    text.push('`');
                    self.advance_over(close + 1);
                }
                b'$' if self.peek(1) == Some(b'(') => {
                    let inner = self.read_balanced_paren()?;
                    substitutions.push(inner.clone());
                    text.push_str("$(");
                    text.push_str(&inner);
                    text.push(')');
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    let start = self.pos;
                    self.advance(2);
                    let mut depth = 1;
                    while self.pos < self.src.len() && depth > 0 {
                        match self.src[self.pos] {
                            b'{' => depth += 1,
                            b'}' => depth -= 1,
                            _ => {}
                        }
                        self.advance(1);
                    }
                    text.push_str(&self.script[start..self.pos]);
                }
                _ => {
                    let ch = self.script[self.pos..].chars().next().unwrap();
                    text.push(ch);
                    self.advance(ch.len_utf8());
                }
            }
        }

        if !text.is_empty() {
            self.tokens.push(Token {
                kind: TokKind::Word,
                text,
                substitutions,
                line,
                col,
                start_byte,
                end_byte: self.pos,
            });
        }
        Ok(())
    }

    fn lex_double_quoted(
        &mut self,
        text: &mut String,
        substitutions: &mut Vec<String>,
    ) -> Result<(), LexError> {
        loop {
            if self.pos >= self.src.len() {
                return Err(LexError {
                    message: "unterminated double quote".to_string(),
                });
            }
            match self.src[self.pos] {
                b'"' => {
                    self.advance(1);
                    return Ok(());
                }
                b'\\' => {
                    self.advance(1);
                    if self.peek(0) == Some(b'\n') {
                        self.newline_advance();
                    } else if self.pos < self.src.len() {
                        let ch = self.script[self.pos..].chars().next().unwrap();
                        text.push(ch);
                        self.advance(ch.len_utf8());
                    }
                }
                b'$' if self.peek(1) == Some(b'(') => {
                    let inner = self.read_balanced_paren()?;
                    substitutions.push(inner.clone());
                    text.push_str("$(");
                    text.push_str(&inner);
                    text.push(')');
                }
                b'\n' => {
                    text.push('\n');
                    self.newline_advance();
                }
                _ => {
                    let ch = self.script[self.pos..].chars().next().unwrap();
                    text.push(ch);
                    self.advance(ch.len_utf8());
                }
            }
        }
    }

    /// Reads `$( … )` starting at `$`, returning the inner text.
    fn read_balanced_paren(&mut self) -> Result<String, LexError> {
        self.advance(2); // `$(`
        let start = self.pos;
        let mut depth = 1;
        let mut in_single = false;
        let mut in_double = false;
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            match b {
                b'\'' if !in_double => in_single = !in_single,
                b'"' if !in_single => in_double = !in_double,
                b'(' if !in_single && !in_double => depth += 1,
                b')' if !in_single && !in_double => {
                    depth -= 1;
                    if depth == 0 {
                        let inner = self.script[start..self.pos].to_string();
                        self.advance(1);
                        return Ok(inner);
                    }
                }
                b'\n' => {
                    self.newline_advance();
                    continue;
                }
                _ => {}
            }
            self.advance(1);
        }
        Err(LexError {
            message: "unterminated command substitution".to_string(),
        })
    }

    fn advance_over(&mut self, n: usize) {
        for c in self.script[self.pos..self.pos + n].bytes() {
            if c == b'\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += 1;
            }
        }
        self.pos += n;
    }
}

/// Removes one layer of quotes from a heredoc delimiter.
fn unquote(s: &str) -> String {
    let b = s.as_bytes();
    if b.len() >= 2
        && ((b[0] == b'"' && b[b.len() - 1] == b'"') || (b[0] == b'\'' && b[b.len() - 1] == b'\''))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(script: &str) -> Vec<String> {
        lex(script, Variant::Bash)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TokKind::Word)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_simple_words() {
        assert_eq!(words("echo hello world"), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn test_quoted_words() {
        assert_eq!(
            words(r#"echo "hello world" 'single quoted'"#),
            vec!["echo", "hello world", "single quoted"]
        );
    }

    #[test]
    fn test_operators() {
        let toks = lex("a && b || c | d ; e", Variant::Bash).unwrap();
        let ops: Vec<String> = toks
            .iter()
            .filter(|t| matches!(t.kind, TokKind::Op(_)))
            .map(|t| t.text.clone())
            .collect();
        assert_eq!(ops, vec!["&&", "||", "|", ";"]);
    }

    #[test]
    fn test_pipe_amp_variant() {
        let bash = lex("a |& b", Variant::Bash).unwrap();
        assert!(bash.iter().any(|t| t.kind == TokKind::Op("|&")));

        // POSIX has no |&: it lexes as `|` then `&`.
        let posix = lex("a |& b", Variant::Posix).unwrap();
        assert!(posix.iter().any(|t| t.kind == TokKind::Op("|")));
        assert!(posix.iter().any(|t| t.kind == TokKind::Op("&")));
    }

    #[test]
    fn test_continuation_joined() {
        assert_eq!(words("apk add \\\n  curl"), vec!["apk", "add", "curl"]);
    }

    #[test]
    fn test_redirects_dropped() {
        assert_eq!(
            words("curl -o out.tar http://x/y.tar 2>/dev/null"),
            vec!["curl", "-o", "out.tar", "http://x/y.tar"]
        );
        assert_eq!(words("echo hi > /tmp/file"), vec!["echo", "hi"]);
    }

    #[test]
    fn test_command_substitution_captured() {
        let toks = lex("echo $(date +%s)", Variant::Bash).unwrap();
        let word = toks
            .iter()
            .find(|t| t.text.starts_with("$("))
            .expect("substitution word");
        assert_eq!(word.substitutions, vec!["date +%s"]);
    }

    #[test]
    fn test_backtick_substitution() {
        let toks = lex("echo `uname -m`", Variant::Bash).unwrap();
        let word = toks.iter().find(|t| !t.substitutions.is_empty()).unwrap();
        assert_eq!(word.substitutions, vec!["uname -m"]);
    }

    #[test]
    fn test_unterminated_quote_errors() {
        assert!(lex("echo \"oops", Variant::Bash).is_err());
        assert!(lex("echo 'oops", Variant::Bash).is_err());
    }

    #[test]
    fn test_positions() {
        let toks = lex("a\nbb ccc", Variant::Bash).unwrap();
        let bb = toks.iter().find(|t| t.text == "bb").unwrap();
        assert_eq!((bb.line, bb.col), (2, 0));
        let ccc = toks.iter().find(|t| t.text == "ccc").unwrap();
        assert_eq!((ccc.line, ccc.col), (2, 3));
    }

    #[test]
    fn test_heredoc_body_skipped() {
        let toks = lex("cat <<EOF\nnot a command\nEOF\necho done", Variant::Bash).unwrap();
        let names: Vec<&str> = toks
            .iter()
            .filter(|t| t.kind == TokKind::Word)
            .map(|t| t.text.as_str())
            .collect();
        assert!(names.contains(&"cat"));
        assert!(names.contains(&"echo"));
        assert!(!names.contains(&"not"));
    }
}
