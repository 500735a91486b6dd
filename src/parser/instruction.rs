//! Typed Dockerfile instructions.
//!
//! The instruction set is a tagged sum; rules dispatch by matching on the
//! variant and reading its fields directly. Every instruction carries the
//! source span of its logical line(s), including continuation lines and
//! heredoc bodies.

use crate::rules::{Location, Position};

/// A source range within the file being linted. Lines are 1-based, columns
/// are 0-based byte offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Span {
            start: Position::new(start_line, start_col),
            end: Position::new(end_line, end_col),
        }
    }

    pub fn to_location(self, file: &str) -> Location {
        Location {
            file: file.to_string(),
            start: self.start,
            end: self.end,
        }
    }
}

/// Whether RUN/CMD/ENTRYPOINT used the string form (default shell prepends)
/// or the JSON-array form (no shell).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellForm {
    Shell,
    Exec,
}

/// An opaque heredoc body attached to RUN/COPY/ADD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heredoc {
    /// Delimiter name, without quotes.
    pub name: String,
    /// Body text, excluding the delimiter line.
    pub content: String,
    /// True for `<<-NAME` (leading tabs stripped).
    pub strip_tabs: bool,
    /// False when the delimiter was quoted (`<<"NAME"`), which disables
    /// variable expansion in the body.
    pub expand: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunInstr {
    /// Command words. Shell form carries a single element: the raw command
    /// string. Exec form carries the JSON array elements.
    pub args: Vec<String>,
    pub form: ShellForm,
    pub flags: Vec<String>,
    pub heredocs: Vec<Heredoc>,
    pub span: Span,
}

impl RunInstr {
    /// The command as a single string, for shell analysis.
    pub fn command_string(&self) -> String {
        self.args.join(" ")
    }

    /// True when the default shell wraps this command at build time.
    pub fn prepend_shell(&self) -> bool {
        self.form == ShellForm::Shell
    }
}

/// CMD and ENTRYPOINT share this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CmdInstr {
    pub args: Vec<String>,
    pub form: ShellForm,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyInstr {
    pub sources: Vec<String>,
    pub dest: String,
    /// Value of `--from=`, verbatim.
    pub from: Option<String>,
    pub flags: Vec<String>,
    pub heredocs: Vec<Heredoc>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddInstr {
    pub sources: Vec<String>,
    pub dest: String,
    pub flags: Vec<String>,
    pub heredocs: Vec<Heredoc>,
    pub span: Span,
}

/// ARG can declare several names in one instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgInstr {
    pub args: Vec<(String, Option<String>)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvInstr {
    pub pairs: Vec<(String, String)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelInstr {
    pub pairs: Vec<(String, String)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExposeInstr {
    pub ports: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeInstr {
    pub paths: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserInstr {
    pub user: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkdirInstr {
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShellInstr {
    pub shell: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthcheckInstr {
    /// True for `HEALTHCHECK NONE`.
    pub is_none: bool,
    /// The CMD arguments when not NONE.
    pub args: Vec<String>,
    pub form: ShellForm,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopsignalInstr {
    pub signal: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnbuildInstr {
    /// The trigger's instruction keyword, uppercased.
    pub trigger: String,
    /// The raw trigger expression after ONBUILD.
    pub expression: String,
    /// The parsed trigger, when it parses cleanly.
    pub parsed: Option<Box<Instruction>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaintainerInstr {
    pub name: String,
    pub span: Span,
}

/// A typed Dockerfile instruction. FROM is not part of this sum: it opens a
/// stage and lives on [`Stage`](super::Stage) directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Run(RunInstr),
    Cmd(CmdInstr),
    Entrypoint(CmdInstr),
    Copy(CopyInstr),
    Add(AddInstr),
    Arg(ArgInstr),
    Env(EnvInstr),
    Label(LabelInstr),
    Expose(ExposeInstr),
    Volume(VolumeInstr),
    User(UserInstr),
    Workdir(WorkdirInstr),
    Shell(ShellInstr),
    Healthcheck(HealthcheckInstr),
    Stopsignal(StopsignalInstr),
    Onbuild(OnbuildInstr),
    Maintainer(MaintainerInstr),
}

impl Instruction {
    pub fn span(&self) -> Span {
        match self {
            Instruction::Run(i) => i.span,
            Instruction::Cmd(i) | Instruction::Entrypoint(i) => i.span,
            Instruction::Copy(i) => i.span,
            Instruction::Add(i) => i.span,
            Instruction::Arg(i) => i.span,
            Instruction::Env(i) => i.span,
            Instruction::Label(i) => i.span,
            Instruction::Expose(i) => i.span,
            Instruction::Volume(i) => i.span,
            Instruction::User(i) => i.span,
            Instruction::Workdir(i) => i.span,
            Instruction::Shell(i) => i.span,
            Instruction::Healthcheck(i) => i.span,
            Instruction::Stopsignal(i) => i.span,
            Instruction::Onbuild(i) => i.span,
            Instruction::Maintainer(i) => i.span,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Instruction::Run(_) => "RUN",
            Instruction::Cmd(_) => "CMD",
            Instruction::Entrypoint(_) => "ENTRYPOINT",
            Instruction::Copy(_) => "COPY",
            Instruction::Add(_) => "ADD",
            Instruction::Arg(_) => "ARG",
            Instruction::Env(_) => "ENV",
            Instruction::Label(_) => "LABEL",
            Instruction::Expose(_) => "EXPOSE",
            Instruction::Volume(_) => "VOLUME",
            Instruction::User(_) => "USER",
            Instruction::Workdir(_) => "WORKDIR",
            Instruction::Shell(_) => "SHELL",
            Instruction::Healthcheck(_) => "HEALTHCHECK",
            Instruction::Stopsignal(_) => "STOPSIGNAL",
            Instruction::Onbuild(_) => "ONBUILD",
            Instruction::Maintainer(_) => "MAINTAINER",
        }
    }
}

/// A build stage: its FROM plus every instruction up to the next FROM.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// 0-based stage index.
    pub index: usize,
    /// The `AS` alias, as written.
    pub name: Option<String>,
    /// The base image expression after FROM, as written (may contain
    /// variable references).
    pub base_name: String,
    /// `--platform` value, as written.
    pub platform: Option<String>,
    pub commands: Vec<Instruction>,
    /// Span of the FROM line(s).
    pub span: Span,
}

impl Stage {
    /// Alias lowered for comparisons; stage names compare case-insensitively.
    pub fn normalized_name(&self) -> Option<String> {
        self.name.as_ref().map(|n| n.to_lowercase())
    }
}
