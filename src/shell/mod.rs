//! Shell command analysis for RUN instructions.
//!
//! Parses shell scripts to a structural AST and exposes the queries rules
//! need: invoked command names, flag inspection, pipe detection, chain
//! splitting, and archive/download helpers. When the structured parser
//! fails, queries degrade to operator word-splitting rather than giving up;
//! this narrows precision but never silences a rule entirely.

mod archive;
mod ast;
mod chain;
mod command;
mod lexer;

pub use archive::{
    download_output_file, download_url, is_archive_filename, is_archive_url, is_tar_extract,
    tar_destination, ARCHIVE_EXTENSIONS, DOWNLOAD_COMMANDS, EXTRACTION_COMMANDS,
};
pub use ast::{fallback_command_names, parse, ChainItem, CmdNode, Connector, Pipeline, Script, SimpleCommand};
pub use chain::{find_command_in_chain, ChainPosition};
pub use command::CommandInfo;

/// The shell dialect active for a stage, inferred from `argv[0]` of the
/// stage's SHELL setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Posix,
    Bash,
    Zsh,
    Ash,
    PowerShell,
    Cmd,
    Other,
}

impl Variant {
    /// Infers the variant from a shell path (`/bin/bash`, `pwsh.exe`, …).
    pub fn from_shell(path: &str) -> Variant {
        let name = basename(path).to_lowercase();
        let name = name.strip_suffix(".exe").unwrap_or(&name);
        match name {
            "bash" => Variant::Bash,
            "zsh" => Variant::Zsh,
            "ash" => Variant::Ash,
            "sh" | "dash" | "ksh" => Variant::Posix,
            "pwsh" | "powershell" => Variant::PowerShell,
            "cmd" => Variant::Cmd,
            _ => Variant::Other,
        }
    }

    /// Infers the variant from a SHELL instruction's argv.
    pub fn from_shell_cmd(cmd: &[String]) -> Variant {
        match cmd.first() {
            Some(argv0) => Variant::from_shell(argv0),
            None => Variant::Posix,
        }
    }

    /// Non-POSIX variants suppress shell-analysis rules for their stage.
    pub fn is_non_posix(self) -> bool {
        matches!(self, Variant::PowerShell | Variant::Cmd | Variant::Other)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Variant::Posix => "posix",
            Variant::Bash => "bash",
            Variant::Zsh => "zsh",
            Variant::Ash => "ash",
            Variant::PowerShell => "powershell",
            Variant::Cmd => "cmd",
            Variant::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Strips quotes and path components (both separators) from a program word.
pub fn basename(p: &str) -> &str {
    let mut p = p;
    let b = p.as_bytes();
    if b.len() >= 2
        && ((b[0] == b'"' && b[b.len() - 1] == b'"') || (b[0] == b'\'' && b[b.len() - 1] == b'\''))
    {
        p = &p[1..p.len() - 1];
    }
    if let Some(i) = p.rfind('\\') {
        p = &p[i + 1..];
    }
    if let Some(i) = p.rfind('/') {
        p = &p[i + 1..];
    }
    p
}

/// Shells whose `-c` argument is itself a shell script worth descending
/// into. `sudo` is deliberately absent: the sudo-detection rule must see it.
static WRAPPER_SHELLS: phf::Set<&'static str> = phf::phf_set! {
    "sh", "bash", "dash", "ash", "zsh", "ksh",
};

/// An invocation surfaced during a walk, with env/`sh -c` wrappers already
/// unwrapped.
struct Invocation<'a> {
    name: &'a str,
    words: &'a [ast::Word],
    line: usize,
    col: usize,
}

/// Walks every command invocation in a script, descending into subshells,
/// compounds, command substitutions, `env` prefixes, and `sh -c` strings.
fn walk_invocations(script: &Script, variant: Variant, f: &mut impl FnMut(&Invocation<'_>)) {
    for item in &script.items {
        walk_pipeline(&item.pipeline, variant, f);
    }
}

fn walk_pipeline(pipeline: &Pipeline, variant: Variant, f: &mut impl FnMut(&Invocation<'_>)) {
    for segment in &pipeline.segments {
        match segment {
            CmdNode::Simple(cmd) => walk_simple(cmd, variant, f),
            CmdNode::Subshell(inner) | CmdNode::Compound(inner) => {
                walk_invocations(inner, variant, f)
            }
        }
    }
}

fn walk_simple(cmd: &SimpleCommand, variant: Variant, f: &mut impl FnMut(&Invocation<'_>)) {
    // Commands inside $(…) or backticks count as invocations.
    for word in &cmd.words {
        for sub in &word.substitutions {
            walk_script_text(sub, variant, f);
        }
    }

    let Some(name) = cmd.name() else { return };
    f(&Invocation {
        name,
        words: &cmd.words,
        line: cmd.line,
        col: cmd.col,
    });

    unwrap_wrappers(&cmd.words, variant, f);
}

/// Surfaces the inner command of `env VAR=val cmd …` and `sh -c 'inner'`.
fn unwrap_wrappers(words: &[ast::Word], variant: Variant, f: &mut impl FnMut(&Invocation<'_>)) {
    let Some(first) = words.first() else { return };
    let name = basename(&first.text);

    if name == "env" {
        let mut idx = 1;
        while idx < words.len() {
            let w = &words[idx].text;
            if w.starts_with('-') || (w.contains('=') && !w.starts_with('=')) {
                idx += 1;
            } else {
                break;
            }
        }
        if idx < words.len() {
            let inner = &words[idx..];
            f(&Invocation {
                name: &inner[0].text,
                words: inner,
                line: inner[0].line,
                col: inner[0].col,
            });
            unwrap_wrappers(inner, variant, f);
        }
        return;
    }

    if WRAPPER_SHELLS.contains(name) {
        let mut saw_c = false;
        for w in &words[1..] {
            if saw_c {
                walk_script_text(&w.text, Variant::from_shell(&first.text), f);
                break;
            }
            if w.text == "-c" || (w.text.starts_with('-') && !w.text.starts_with("--") && w.text.contains('c')) {
                saw_c = true;
            }
        }
    }
}

fn walk_script_text(text: &str, variant: Variant, f: &mut impl FnMut(&Invocation<'_>)) {
    if let Ok(inner) = ast::parse(text, variant) {
        walk_invocations(&inner, variant, f);
    }
}

/// Extracts all invoked program names from a shell script, in order,
/// path-stripped. Falls back to word splitting when parsing fails.
pub fn command_names(script: &str, variant: Variant) -> Vec<String> {
    match ast::parse(script, variant) {
        Ok(parsed) => {
            let mut names = Vec::new();
            walk_invocations(&parsed, variant, &mut |inv| {
                names.push(basename(inv.name).to_string());
            });
            names
        }
        Err(_) => fallback_command_names(script),
    }
}

/// Checks if a script invokes a command, parsing as bash (the common
/// default for RUN).
pub fn contains_command(script: &str, command: &str) -> bool {
    contains_command_with_variant(script, command, Variant::Bash)
}

/// Variant-aware form of [`contains_command`].
pub fn contains_command_with_variant(script: &str, command: &str, variant: Variant) -> bool {
    command_names(script, variant).iter().any(|n| n == command)
}

/// Finds structured invocations of the named programs.
pub fn find_commands(script: &str, variant: Variant, names: &[&str]) -> Vec<CommandInfo> {
    let Ok(parsed) = ast::parse(script, variant) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    walk_invocations(&parsed, variant, &mut |inv| {
        let base = basename(inv.name);
        if !names.contains(&base) {
            return;
        }
        let args: Vec<String> = inv.words[1..].iter().map(|w| w.text.clone()).collect();
        let (subcommand, subcommand_position) = args
            .iter()
            .enumerate()
            .find(|(_, a)| !a.starts_with('-'))
            .map(|(i, a)| (Some(a.clone()), Some(i)))
            .unwrap_or((None, None));
        found.push(CommandInfo {
            name: base.to_string(),
            args,
            subcommand,
            subcommand_position,
            start_line: inv.line,
            start_col: inv.col,
        });
    });
    found
}

/// True when the script contains a plain `|` pipe. `|&` is not a plain pipe
/// in the variants that recognize it (bash, zsh).
pub fn has_pipes(script: &str, variant: Variant) -> bool {
    match ast::parse(script, variant) {
        Ok(parsed) => {
            let mut found = false;
            walk_pipelines(&parsed, &mut |p| {
                if p.pipe_ops.iter().any(|&op| op == "|") {
                    found = true;
                }
            });
            found
        }
        Err(_) => raw_pipe_scan(script, variant),
    }
}

fn walk_pipelines(script: &Script, f: &mut impl FnMut(&Pipeline)) {
    for item in &script.items {
        f(&item.pipeline);
        for segment in &item.pipeline.segments {
            if let CmdNode::Subshell(inner) | CmdNode::Compound(inner) = segment {
                walk_pipelines(inner, f);
            }
        }
    }
}

fn raw_pipe_scan(script: &str, variant: Variant) -> bool {
    let bytes = script.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'|' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'|' {
                i += 2;
                continue;
            }
            if i + 1 < bytes.len()
                && bytes[i + 1] == b'&'
                && matches!(variant, Variant::Bash | Variant::Zsh)
            {
                i += 2;
                continue;
            }
            return true;
        }
        i += 1;
    }
    false
}

/// True when the script is a chain of at least `min_commands` top-level
/// commands with no heredoc already present — the shape the
/// prefer-run-heredoc rule rewrites.
pub fn is_heredoc_candidate(script: &str, variant: Variant, min_commands: usize) -> bool {
    if min_commands == 0 || script.contains("<<") {
        return false;
    }
    match ast::parse(script, variant) {
        Ok(parsed) => parsed.items.len() >= min_commands,
        Err(_) => false,
    }
}
