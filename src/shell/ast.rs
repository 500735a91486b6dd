//! Shell script AST and recursive-descent parser.
//!
//! The grammar is the POSIX-compatible subset that matters for linting RUN
//! commands: sequences, and-or chains, pipelines, subshells, brace groups,
//! `if`/`for`/`while`/`until` compounds, assignments, and command
//! substitutions. `case` bodies are skipped wholesale. On parse failure the
//! caller degrades to operator word-splitting (see `fallback_command_names`).

use super::lexer::{lex, TokKind, Token};
use super::Variant;

/// Connector preceding a chain item; the first item carries `Seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `;`, newline, or `&`
    Seq,
    /// `&&`
    And,
    /// `||`
    Or,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub items: Vec<ChainItem>,
}

#[derive(Debug, Clone)]
pub struct ChainItem {
    pub connector: Connector,
    pub pipeline: Pipeline,
    /// Byte range of this item within the original script text.
    pub start_byte: usize,
    pub end_byte: usize,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub segments: Vec<CmdNode>,
    /// Operators between segments: `"|"` or `"|&"`; length is
    /// `segments.len() - 1`.
    pub pipe_ops: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub enum CmdNode {
    Simple(SimpleCommand),
    /// `( … )`
    Subshell(Script),
    /// `{ …; }`, `if`, `for`, `while`, `until` — bodies flattened into one
    /// script whose commands surface in queries.
    Compound(Script),
}

/// A word with any command substitutions that appeared inside it.
#[derive(Debug, Clone)]
pub struct Word {
    pub text: String,
    pub substitutions: Vec<String>,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct SimpleCommand {
    /// Leading `VAR=value` assignments.
    pub assignments: Vec<String>,
    /// Command name and arguments.
    pub words: Vec<Word>,
    pub line: usize,
    pub col: usize,
}

impl SimpleCommand {
    pub fn name(&self) -> Option<&str> {
        self.words.first().map(|w| w.text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
}

/// Parses a shell script for the given variant.
pub fn parse(script: &str, variant: Variant) -> Result<Script, ParseError> {
    let tokens = lex(script, variant).map_err(|e| ParseError { message: e.message })?;
    let mut parser = ShellParser {
        tokens,
        pos: 0,
        script_len: script.len(),
    };
    let script = parser.parse_script(&[])?;
    if parser.pos < parser.tokens.len() {
        return Err(ParseError {
            message: format!(
                "unexpected token {:?}",
                parser.tokens[parser.pos].text
            ),
        });
    }
    Ok(script)
}

const RESERVED_STOPS: &[&str] = &[
    "then", "elif", "else", "fi", "do", "done", "esac", "}",
];

struct ShellParser {
    tokens: Vec<Token>,
    pos: usize,
    script_len: usize,
}

impl ShellParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn at_word(&self, text: &str) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokKind::Word && t.text == text)
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(t) if matches!(t.kind, TokKind::Op(o) if o == op))
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        self.pos += 1;
        t
    }

    fn skip_separators(&mut self) {
        while self.at_op("\n") || self.at_op(";") {
            self.pos += 1;
        }
    }

    /// Parses chain items until EOF or until a reserved stop word in
    /// command position (left unconsumed).
    fn parse_script(&mut self, stops: &[&str]) -> Result<Script, ParseError> {
        let mut items = Vec::new();
        self.skip_separators();
        loop {
            match self.peek() {
                None => break,
                Some(t) if t.kind == TokKind::Word && stops.contains(&t.text.as_str()) => break,
                Some(t) if matches!(t.kind, TokKind::Op(")")) => break,
                _ => {}
            }
            let connector = Connector::Seq;
            let item = self.parse_chain_item(connector)?;
            items.push(item);

            // Trailing connector decides how the next item attaches.
            loop {
                if self.at_op("&&") {
                    self.bump();
                    self.skip_newlines();
                    let item = self.parse_chain_item(Connector::And)?;
                    items.push(item);
                } else if self.at_op("||") {
                    self.bump();
                    self.skip_newlines();
                    let item = self.parse_chain_item(Connector::Or)?;
                    items.push(item);
                } else {
                    break;
                }
            }

            if self.at_op(";") || self.at_op("\n") || self.at_op("&") || self.at_op(";;") {
                self.bump();
                self.skip_separators();
                continue;
            }
            break;
        }
        Ok(Script { items })
    }

    fn skip_newlines(&mut self) {
        while self.at_op("\n") {
            self.pos += 1;
        }
    }

    fn parse_chain_item(&mut self, connector: Connector) -> Result<ChainItem, ParseError> {
        let start_byte = self.peek().map(|t| t.start_byte).unwrap_or(self.script_len);
        let pipeline = self.parse_pipeline()?;
        let end_byte = if self.pos > 0 {
            self.tokens[self.pos - 1].end_byte
        } else {
            self.script_len
        };
        Ok(ChainItem {
            connector,
            pipeline,
            start_byte,
            end_byte,
        })
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let mut segments = vec![self.parse_command()?];
        let mut pipe_ops = Vec::new();
        loop {
            if self.at_op("|") {
                self.bump();
                self.skip_newlines();
                pipe_ops.push("|");
                segments.push(self.parse_command()?);
            } else if self.at_op("|&") {
                self.bump();
                self.skip_newlines();
                pipe_ops.push("|&");
                segments.push(self.parse_command()?);
            } else {
                break;
            }
        }
        Ok(Pipeline { segments, pipe_ops })
    }

    fn parse_command(&mut self) -> Result<CmdNode, ParseError> {
        // Bang prefix on a pipeline.
        if self.at_word("!") {
            self.bump();
        }

        if self.at_op("(") {
            self.bump();
            let inner = self.parse_script(&[])?;
            if !self.at_op(")") {
                return Err(ParseError {
                    message: "unbalanced subshell".to_string(),
                });
            }
            self.bump();
            return Ok(CmdNode::Subshell(inner));
        }

        if self.at_word("{") {
            self.bump();
            let inner = self.parse_script(&["}"])?;
            if !self.at_word("}") {
                return Err(ParseError {
                    message: "unbalanced brace group".to_string(),
                });
            }
            self.bump();
            return Ok(CmdNode::Compound(inner));
        }

        if self.at_word("if") {
            return self.parse_if();
        }
        if self.at_word("for") {
            return self.parse_for();
        }
        if self.at_word("while") || self.at_word("until") {
            return self.parse_while();
        }
        if self.at_word("case") {
            return self.parse_case();
        }

        self.parse_simple()
    }

    fn parse_if(&mut self) -> Result<CmdNode, ParseError> {
        self.bump(); // if
        let mut all = Vec::new();
        loop {
            let cond = self.parse_script(&["then"])?;
            all.extend(cond.items);
            if !self.at_word("then") {
                return Err(ParseError {
                    message: "if without then".to_string(),
                });
            }
            self.bump();
            let body = self.parse_script(&["elif", "else", "fi"])?;
            all.extend(body.items);
            if self.at_word("elif") {
                self.bump();
                continue;
            }
            if self.at_word("else") {
                self.bump();
                let body = self.parse_script(&["fi"])?;
                all.extend(body.items);
            }
            if !self.at_word("fi") {
                return Err(ParseError {
                    message: "if without fi".to_string(),
                });
            }
            self.bump();
            break;
        }
        Ok(CmdNode::Compound(Script { items: all }))
    }

    fn parse_for(&mut self) -> Result<CmdNode, ParseError> {
        self.bump(); // for
        // Loop variable, optional `in words…`, up to the `do`.
        while let Some(t) = self.peek() {
            if t.kind == TokKind::Word && t.text == "do" {
                break;
            }
            if self.pos >= self.tokens.len() {
                break;
            }
            self.pos += 1;
        }
        if !self.at_word("do") {
            return Err(ParseError {
                message: "for without do".to_string(),
            });
        }
        self.bump();
        let body = self.parse_script(&["done"])?;
        if !self.at_word("done") {
            return Err(ParseError {
                message: "for without done".to_string(),
            });
        }
        self.bump();
        Ok(CmdNode::Compound(body))
    }

    fn parse_while(&mut self) -> Result<CmdNode, ParseError> {
        self.bump(); // while / until
        let cond = self.parse_script(&["do"])?;
        if !self.at_word("do") {
            return Err(ParseError {
                message: "while without do".to_string(),
            });
        }
        self.bump();
        let body = self.parse_script(&["done"])?;
        if !self.at_word("done") {
            return Err(ParseError {
                message: "while without done".to_string(),
            });
        }
        self.bump();
        let mut items = cond.items;
        items.extend(body.items);
        Ok(CmdNode::Compound(Script { items }))
    }

    /// `case` bodies are skipped: tokens are consumed until `esac`.
    fn parse_case(&mut self) -> Result<CmdNode, ParseError> {
        self.bump(); // case
        let mut depth = 1;
        while let Some(t) = self.peek() {
            if t.kind == TokKind::Word {
                if t.text == "case" {
                    depth += 1;
                } else if t.text == "esac" {
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        return Ok(CmdNode::Compound(Script::default()));
                    }
                }
            }
            self.pos += 1;
        }
        Err(ParseError {
            message: "case without esac".to_string(),
        })
    }

    fn parse_simple(&mut self) -> Result<CmdNode, ParseError> {
        let mut assignments = Vec::new();
        let mut words: Vec<Word> = Vec::new();
        let mut line = 0;
        let mut col = 0;

        while let Some(t) = self.peek() {
            match &t.kind {
                TokKind::Word => {
                    if words.is_empty() && RESERVED_STOPS.contains(&t.text.as_str()) {
                        break;
                    }
                    let t = self.bump();
                    if words.is_empty() && is_assignment(&t.text) {
                        assignments.push(t.text);
                        continue;
                    }
                    if words.is_empty() {
                        line = t.line;
                        col = t.col;
                    }
                    words.push(Word {
                        text: t.text,
                        substitutions: t.substitutions,
                        line: t.line,
                        col: t.col,
                    });
                }
                TokKind::Op(_) => break,
            }
        }

        if assignments.is_empty() && words.is_empty() {
            return Err(ParseError {
                message: "expected command".to_string(),
            });
        }
        if line == 0 {
            // Assignment-only command.
            line = 1;
        }
        Ok(CmdNode::Simple(SimpleCommand {
            assignments,
            words,
            line,
            col,
        }))
    }
}

/// `VAR=value` word in command-leading position.
fn is_assignment(text: &str) -> bool {
    match text.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.chars().next().unwrap().is_ascii_digit()
        }
        None => false,
    }
}

/// Fallback when structured parsing fails: splits on shell operators and
/// returns the first non-assignment, non-flag token of each sequence,
/// path-stripped. Narrower than the structured walk, but never gives up.
pub fn fallback_command_names(script: &str) -> Vec<String> {
    let mut cleaned = script.replace("\\\n", " ");
    for sep in ["&&", "||", ";", "|", "`", "$(", "(", "\n"] {
        cleaned = cleaned.replace(sep, "\u{0}");
    }
    let cleaned = cleaned.replace(')', " ");

    let mut names = Vec::new();
    for seq in cleaned.split('\u{0}') {
        let seq = seq.trim();
        if seq.is_empty() {
            continue;
        }
        for part in seq.split_whitespace() {
            if part.contains('=') && !part.starts_with('-') {
                continue;
            }
            if part.starts_with('-') {
                continue;
            }
            names.push(super::basename(part).to_string());
            break;
        }
    }
    names
}
