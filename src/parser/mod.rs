//! Dockerfile parser adapter.
//!
//! Consumes source bytes and produces typed instructions grouped into
//! stages, meta-ARGs, line statistics, and BuildKit-compatible parser
//! warnings. Logical instructions merge backslash continuations; heredoc
//! bodies are captured opaquely with their delimiter so rules can reason
//! about them without tripping over their content.

mod instruction;
mod source;

pub use instruction::{
    AddInstr, ArgInstr, CmdInstr, CopyInstr, EnvInstr, ExposeInstr, Heredoc, HealthcheckInstr,
    Instruction, LabelInstr, MaintainerInstr, OnbuildInstr, RunInstr, ShellForm, ShellInstr, Span,
    Stage, StopsignalInstr, UserInstr, VolumeInstr, WorkdirInstr,
};
pub use source::SourceMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;
use crate::rules::Position;

/// Default cap on source size; oversize input is a fatal parse error.
pub const DEFAULT_MAX_SOURCE_SIZE: usize = 512 * 1024;

/// A lint warning emitted by the parser itself, in the shape of BuildKit's
/// linter callback: rule name, description, documentation URL, formatted
/// message, and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub rule_name: String,
    pub description: String,
    pub url: String,
    pub message: String,
    pub span: Span,
}

/// The parsed Dockerfile.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub total_lines: usize,
    pub blank_lines: usize,
    pub comment_lines: usize,
    pub stages: Vec<Stage>,
    /// ARG instructions appearing before the first FROM.
    pub meta_args: Vec<ArgInstr>,
    pub warnings: Vec<ParseWarning>,
    pub escape_char: char,
}

/// Parses a Dockerfile with the default size cap.
pub fn parse(source: &str) -> Result<ParseResult, Error> {
    Parser::new().parse(source)
}

/// Dockerfile parser with a configurable source-size cap.
#[derive(Debug, Clone)]
pub struct Parser {
    max_source_size: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Parser {
            max_source_size: DEFAULT_MAX_SOURCE_SIZE,
        }
    }
}

static HEREDOC_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<<(-?)(["']?)([A-Za-z_][A-Za-z0-9_]*)(["']?)"#).unwrap());

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    pub fn with_max_source_size(mut self, max: usize) -> Self {
        self.max_source_size = max;
        self
    }

    pub fn parse(&self, source: &str) -> Result<ParseResult, Error> {
        if source.len() > self.max_source_size {
            return Err(Error::Oversize {
                size: source.len(),
                limit: self.max_source_size,
            });
        }

        let lines: Vec<&str> = source.lines().collect();
        let mut result = ParseResult {
            total_lines: lines.len(),
            escape_char: '\\',
            ..ParseResult::default()
        };

        // Parser directives are only recognized at the very top, before any
        // instruction or blank line. Unknown directives are no-ops.
        let mut body_start = 0;
        for line in &lines {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix('#') {
                let directive = rest.trim();
                if let Some(value) = directive.strip_prefix("escape=") {
                    let value = value.trim();
                    match value {
                        "\\" => result.escape_char = '\\',
                        "`" => result.escape_char = '`',
                        _ => {
                            return Err(Error::parse(
                                format!("invalid escape directive: {value:?}"),
                                Some(body_start + 1),
                            ))
                        }
                    }
                } else if !directive.contains('=') {
                    // A plain comment ends the directive block.
                    break;
                }
                body_start += 1;
            } else {
                break;
            }
        }

        // Count blank and comment lines over the whole file.
        for line in &lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                result.blank_lines += 1;
            } else if trimmed.starts_with('#') {
                result.comment_lines += 1;
            }
        }

        let mut li = 0; // 0-based physical line index
        while li < lines.len() {
            let raw = lines[li];
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                li += 1;
                continue;
            }

            let logical = self.assemble_logical_line(&lines, &mut li, result.escape_char)?;
            self.build_instruction(&lines, &mut li, logical, &mut result)?;
        }

        Ok(result)
    }

    /// Joins a logical instruction starting at `*li`, advancing past its
    /// continuation lines. Comment lines inside a continuation are skipped.
    fn assemble_logical_line(
        &self,
        lines: &[&str],
        li: &mut usize,
        escape: char,
    ) -> Result<LogicalLine, Error> {
        let start_line = *li + 1;
        let first = lines[*li];
        let indent = first.len() - first.trim_start().len();
        let mut text = String::from(first.trim());
        let mut end_line = *li + 1;

        while text.ends_with(escape) {
            text.pop();
            let mut next = *li + 1;
            // Skip comment lines embedded in a continuation.
            while next < lines.len() && lines[next].trim().starts_with('#') {
                next += 1;
            }
            if next >= lines.len() {
                return Err(Error::parse(
                    "line continuation at end of file",
                    Some(end_line),
                ));
            }
            let continued = lines[next].trim();
            if !text.is_empty() && !text.ends_with(' ') {
                text.push(' ');
            }
            text.push_str(continued);
            *li = next;
            end_line = next + 1;
        }

        let end_col = lines[end_line - 1].len();
        *li += 1;

        Ok(LogicalLine {
            text,
            start_line,
            start_col: indent,
            end_line,
            end_col,
        })
    }

    /// Parses one logical line into a typed instruction, consuming heredoc
    /// body lines where present, and attaches it to the current stage.
    fn build_instruction(
        &self,
        lines: &[&str],
        li: &mut usize,
        logical: LogicalLine,
        result: &mut ParseResult,
    ) -> Result<(), Error> {
        let (keyword, rest) = split_keyword(&logical.text);
        let upper = keyword.to_uppercase();
        let mut span = Span {
            start: Position::new(logical.start_line, logical.start_col),
            end: Position::new(logical.end_line, logical.end_col),
        };

        // Heredoc bodies extend the instruction span.
        let heredocs = if matches!(upper.as_str(), "RUN" | "COPY" | "ADD") {
            let collected = self.collect_heredocs(lines, li, rest, logical.end_line)?;
            if let Some(last) = collected.last() {
                span.end = Position::new(last.end_line, lines[last.end_line - 1].len());
            }
            collected.into_iter().map(|h| h.heredoc).collect()
        } else {
            Vec::new()
        };

        let instruction = match upper.as_str() {
            "FROM" => {
                self.build_stage(rest, keyword, span, result, logical.start_line)?;
                return Ok(());
            }
            "RUN" => {
                let (flags, command) = take_leading_flags(rest);
                let (args, form) = parse_command_args(command);
                Instruction::Run(RunInstr {
                    args,
                    form,
                    flags,
                    heredocs,
                    span,
                })
            }
            "CMD" | "ENTRYPOINT" => {
                let (args, form) = parse_command_args(rest);
                if form == ShellForm::Shell && !args.iter().all(|a| a.trim().is_empty()) {
                    result.warnings.push(json_args_warning(&upper, span));
                }
                let instr = CmdInstr { args, form, span };
                if upper == "CMD" {
                    Instruction::Cmd(instr)
                } else {
                    Instruction::Entrypoint(instr)
                }
            }
            "COPY" => {
                let (flags, remainder) = take_leading_flags(rest);
                let from = flag_value(&flags, "from");
                let words = split_words(remainder);
                let (sources, dest) = split_sources_dest(words, span.start.line)?;
                Instruction::Copy(CopyInstr {
                    sources,
                    dest,
                    from,
                    flags,
                    heredocs,
                    span,
                })
            }
            "ADD" => {
                let (flags, remainder) = take_leading_flags(rest);
                let words = split_words(remainder);
                let (sources, dest) = split_sources_dest(words, span.start.line)?;
                Instruction::Add(AddInstr {
                    sources,
                    dest,
                    flags,
                    heredocs,
                    span,
                })
            }
            "ARG" => Instruction::Arg(parse_arg(rest, span)),
            "ENV" => Instruction::Env(EnvInstr {
                pairs: parse_key_values(rest, span.start.line, "ENV")?,
                span,
            }),
            "LABEL" => Instruction::Label(LabelInstr {
                pairs: parse_key_values(rest, span.start.line, "LABEL")?,
                span,
            }),
            "EXPOSE" => Instruction::Expose(ExposeInstr {
                ports: split_words(rest),
                span,
            }),
            "VOLUME" => {
                let (args, _) = parse_command_args(rest);
                let paths = if args.len() == 1 && !rest.trim_start().starts_with('[') {
                    split_words(rest)
                } else {
                    args
                };
                Instruction::Volume(VolumeInstr { paths, span })
            }
            "USER" => Instruction::User(UserInstr {
                user: rest.trim().to_string(),
                span,
            }),
            "WORKDIR" => Instruction::Workdir(WorkdirInstr {
                path: drop_quotes(rest.trim()).to_string(),
                span,
            }),
            "SHELL" => {
                let (args, form) = parse_command_args(rest);
                if form != ShellForm::Exec {
                    return Err(Error::parse(
                        "SHELL requires the arguments to be in JSON form",
                        Some(span.start.line),
                    ));
                }
                Instruction::Shell(ShellInstr { shell: args, span })
            }
            "HEALTHCHECK" => Instruction::Healthcheck(parse_healthcheck(rest, span)?),
            "STOPSIGNAL" => Instruction::Stopsignal(StopsignalInstr {
                signal: rest.trim().to_string(),
                span,
            }),
            "ONBUILD" => self.parse_onbuild(rest, span)?,
            "MAINTAINER" => {
                result.warnings.push(ParseWarning {
                    rule_name: "MaintainerDeprecated".to_string(),
                    description: "The MAINTAINER instruction is deprecated, use a label instead to define an image author".to_string(),
                    url: "https://docs.docker.com/go/dockerfile/rule/maintainer-deprecated/"
                        .to_string(),
                    message: "Maintainer instruction is deprecated in favor of using label"
                        .to_string(),
                    span,
                });
                Instruction::Maintainer(MaintainerInstr {
                    name: rest.trim().to_string(),
                    span,
                })
            }
            _ => {
                return Err(Error::parse(
                    format!("unknown instruction: {keyword}"),
                    Some(span.start.line),
                ))
            }
        };

        match result.stages.last_mut() {
            Some(stage) => stage.commands.push(instruction),
            None => match instruction {
                Instruction::Arg(arg) => result.meta_args.push(arg),
                _ => {
                    return Err(Error::parse(
                        "no build stage in current context",
                        Some(span.start.line),
                    ))
                }
            },
        }

        Ok(())
    }

    /// Parses a FROM line, opening a new stage and emitting casing warnings.
    fn build_stage(
        &self,
        rest: &str,
        from_keyword: &str,
        span: Span,
        result: &mut ParseResult,
        line: usize,
    ) -> Result<(), Error> {
        let (flags, remainder) = take_leading_flags(rest);
        let platform = flag_value(&flags, "platform");
        let words = split_words(remainder);

        let (base_name, name) = match words.len() {
            1 => (words[0].clone(), None),
            3 => {
                let as_kw = &words[1];
                if !as_kw.eq_ignore_ascii_case("as") {
                    return Err(Error::parse(
                        format!("FROM requires AS keyword, got {as_kw:?}"),
                        Some(line),
                    ));
                }
                let from_upper = from_keyword.chars().all(|c| !c.is_ascii_lowercase());
                let as_upper = as_kw.chars().all(|c| !c.is_ascii_lowercase());
                if from_upper != as_upper {
                    let expected = if from_upper { "AS" } else { "as" };
                    result.warnings.push(ParseWarning {
                        rule_name: "FromAsCasing".to_string(),
                        description: "The 'as' keyword should match the case of the 'from' keyword"
                            .to_string(),
                        url: "https://docs.docker.com/go/dockerfile/rule/from-as-casing/"
                            .to_string(),
                        message: format!("'{as_kw}' and '{from_keyword}' keywords' casing do not match (expected '{expected}')"),
                        span,
                    });
                }
                (words[0].clone(), Some(words[2].clone()))
            }
            _ => {
                return Err(Error::parse(
                    "FROM requires either one or three arguments",
                    Some(line),
                ))
            }
        };

        if let Some(alias) = &name {
            if alias.chars().any(|c| c.is_ascii_uppercase()) {
                result.warnings.push(ParseWarning {
                    rule_name: "StageNameCasing".to_string(),
                    description: "Stage names should be lowercase".to_string(),
                    url: "https://docs.docker.com/go/dockerfile/rule/stage-name-casing/"
                        .to_string(),
                    message: format!("Stage name '{alias}' should be lowercase"),
                    span,
                });
            }
        }

        result.stages.push(Stage {
            index: result.stages.len(),
            name,
            base_name,
            platform,
            commands: Vec::new(),
            span,
        });

        Ok(())
    }

    fn parse_onbuild(&self, rest: &str, span: Span) -> Result<Instruction, Error> {
        let (trigger_kw, _) = split_keyword(rest.trim());
        let trigger = trigger_kw.to_uppercase();
        if matches!(trigger.as_str(), "ONBUILD" | "FROM" | "MAINTAINER") {
            return Err(Error::parse(
                format!("{trigger} isn't allowed as an ONBUILD trigger"),
                Some(span.start.line),
            ));
        }

        // Parse the trigger when it is an instruction we understand; COPY
        // matters most, for ONBUILD COPY --from tracking.
        let mut inner = ParseResult {
            stages: vec![Stage {
                index: 0,
                name: None,
                base_name: String::new(),
                platform: None,
                commands: Vec::new(),
                span,
            }],
            ..ParseResult::default()
        };
        let logical = LogicalLine {
            text: rest.trim().to_string(),
            start_line: span.start.line,
            start_col: span.start.column,
            end_line: span.end.line,
            end_col: span.end.column,
        };
        let mut cursor = 0;
        let parsed = self
            .build_instruction(&[], &mut cursor, logical, &mut inner)
            .ok()
            .and_then(|_| inner.stages.into_iter().next())
            .and_then(|s| s.commands.into_iter().next())
            .map(Box::new);

        Ok(Instruction::Onbuild(OnbuildInstr {
            trigger,
            expression: rest.trim().to_string(),
            parsed,
            span,
        }))
    }

    /// Consumes heredoc bodies referenced by the instruction text, starting
    /// at the line after the instruction.
    fn collect_heredocs(
        &self,
        lines: &[&str],
        li: &mut usize,
        text: &str,
        instr_end_line: usize,
    ) -> Result<Vec<CollectedHeredoc>, Error> {
        let mut collected = Vec::new();
        for caps in HEREDOC_MARKER.captures_iter(text) {
            let strip_tabs = &caps[1] == "-";
            let open_quote = &caps[2];
            let close_quote = &caps[4];
            if open_quote != close_quote {
                continue;
            }
            let name = caps[3].to_string();
            let expand = open_quote.is_empty();

            let mut body = Vec::new();
            let mut found = false;
            let mut cursor = (*li).max(instr_end_line);
            while cursor < lines.len() {
                let line = lines[cursor];
                let candidate = if strip_tabs {
                    line.trim_start_matches('\t')
                } else {
                    line
                };
                cursor += 1;
                if candidate == name {
                    found = true;
                    break;
                }
                body.push(line.to_string());
            }
            if !found {
                return Err(Error::parse(
                    format!("unterminated heredoc {name:?}"),
                    Some(instr_end_line),
                ));
            }
            *li = cursor;
            collected.push(CollectedHeredoc {
                heredoc: Heredoc {
                    name,
                    content: body.join("\n"),
                    strip_tabs,
                    expand,
                },
                end_line: cursor,
            });
        }
        Ok(collected)
    }
}

struct LogicalLine {
    text: String,
    start_line: usize,
    start_col: usize,
    end_line: usize,
    end_col: usize,
}

struct CollectedHeredoc {
    heredoc: Heredoc,
    end_line: usize,
}

/// Splits the instruction keyword from the remainder of the line.
fn split_keyword(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim_start()),
        None => (text, ""),
    }
}

/// Takes leading `--flag` / `--flag=value` tokens off the front of an
/// instruction's arguments.
fn take_leading_flags(text: &str) -> (Vec<String>, &str) {
    let mut flags = Vec::new();
    let mut rest = text.trim_start();
    while rest.starts_with("--") {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        flags.push(rest[..end].to_string());
        rest = rest[end..].trim_start();
    }
    (flags, rest)
}

/// Looks up `--name=value` in a collected flag list.
fn flag_value(flags: &[String], name: &str) -> Option<String> {
    let prefix = format!("--{name}=");
    flags
        .iter()
        .find_map(|f| f.strip_prefix(&prefix).map(|v| drop_quotes(v).to_string()))
}

/// Parses RUN/CMD/ENTRYPOINT arguments: a JSON array is exec form, anything
/// else is shell form carried as a single raw string.
fn parse_command_args(text: &str) -> (Vec<String>, ShellForm) {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        if let Ok(args) = serde_json::from_str::<Vec<String>>(trimmed) {
            return (args, ShellForm::Exec);
        }
    }
    (vec![trimmed.to_string()], ShellForm::Shell)
}

/// Splits whitespace-separated words, honoring double and single quotes.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in text.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => {
                if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                    current.push(ch);
                } else if ch.is_whitespace() {
                    if !current.is_empty() {
                        words.push(current.clone());
                        current.clear();
                    }
                } else {
                    current.push(ch);
                }
            }
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Strips one layer of surrounding quotes.
fn drop_quotes(s: &str) -> &str {
    let b = s.as_bytes();
    if b.len() >= 2 && ((b[0] == b'"' && b[b.len() - 1] == b'"') || (b[0] == b'\'' && b[b.len() - 1] == b'\'')) {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Splits COPY/ADD arguments into sources and destination (the last word).
fn split_sources_dest(
    mut words: Vec<String>,
    line: usize,
) -> Result<(Vec<String>, String), Error> {
    if words.len() < 2 {
        return Err(Error::parse(
            "COPY/ADD requires at least two arguments",
            Some(line),
        ));
    }
    let dest = words.pop().expect("length checked above");
    Ok((words, dest))
}

fn parse_arg(rest: &str, span: Span) -> ArgInstr {
    let mut args = Vec::new();
    for word in split_words(rest) {
        match word.split_once('=') {
            Some((name, value)) => {
                args.push((name.to_string(), Some(drop_quotes(value).to_string())))
            }
            None => args.push((word, None)),
        }
    }
    ArgInstr { args, span }
}

/// Parses ENV/LABEL pairs: `KEY=VAL…` form or the legacy `KEY VALUE` form.
fn parse_key_values(
    rest: &str,
    line: usize,
    keyword: &str,
) -> Result<Vec<(String, String)>, Error> {
    let words = split_words(rest);
    if words.is_empty() {
        return Err(Error::parse(
            format!("{keyword} requires at least one argument"),
            Some(line),
        ));
    }
    if words[0].contains('=') {
        let mut pairs = Vec::new();
        for word in &words {
            match word.split_once('=') {
                Some((k, v)) => pairs.push((k.to_string(), drop_quotes(v).to_string())),
                None => {
                    return Err(Error::parse(
                        format!("{keyword} must be followed by key=value pairs, got {word:?}"),
                        Some(line),
                    ))
                }
            }
        }
        Ok(pairs)
    } else {
        // Legacy form: a single key, value is the rest of the line.
        let key = words[0].clone();
        let value = rest.trim()[key.len()..].trim_start().to_string();
        Ok(vec![(key, drop_quotes(&value).to_string())])
    }
}

fn parse_healthcheck(rest: &str, span: Span) -> Result<HealthcheckInstr, Error> {
    let trimmed = rest.trim();
    if trimmed.eq_ignore_ascii_case("none") {
        return Ok(HealthcheckInstr {
            is_none: true,
            args: Vec::new(),
            form: ShellForm::Shell,
            span,
        });
    }
    // Skip --interval/--timeout/… options before CMD.
    let (_, remainder) = take_leading_flags(trimmed);
    let (kw, cmd_rest) = split_keyword(remainder);
    if !kw.eq_ignore_ascii_case("cmd") {
        return Err(Error::parse(
            format!("HEALTHCHECK expects CMD or NONE, got {kw:?}"),
            Some(span.start.line),
        ));
    }
    let (args, form) = parse_command_args(cmd_rest);
    Ok(HealthcheckInstr {
        is_none: false,
        args,
        form,
        span,
    })
}

fn json_args_warning(keyword: &str, span: Span) -> ParseWarning {
    ParseWarning {
        rule_name: "JSONArgsRecommended".to_string(),
        description: "JSON arguments recommended for ENTRYPOINT/CMD to prevent unintended behavior related to OS signals".to_string(),
        url: "https://docs.docker.com/go/dockerfile/rule/json-args-recommended/".to_string(),
        message: format!(
            "JSON arguments recommended for {keyword} to prevent unintended behavior related to OS signals"
        ),
        span,
    }
}
