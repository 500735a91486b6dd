//! DL4006: set the SHELL option -o pipefail before RUN with a pipe.

use crate::parser::{Instruction, RunInstr};
use crate::rules::{
    FixSafety, LintInput, Location, Rule, RuleMetadata, Severity, SuggestedFix, TextEdit,
    Violation,
};
use crate::semantic::ShellSource;
use crate::shell::{self, basename, Variant};

pub const CODE: &str = "hadolint/DL4006";
pub const DOC_URL: &str = "https://github.com/hadolint/hadolint/wiki/DL4006";

/// Shells that support `-o pipefail`. Plain /bin/sh does not reliably
/// (varies by distro), so it is excluded.
static PIPEFAIL_SHELLS: phf::Set<&'static str> = phf::phf_set! {
    "bash", "zsh", "ash",
};

/// Per-stage pipefail tracking, reset at each FROM.
#[derive(Default)]
struct StageState {
    pipefail_set: bool,
    non_posix: bool,
}

impl StageState {
    fn update_from_shell(&mut self, shell_cmd: &[String]) {
        if is_non_posix_shell_cmd(shell_cmd) {
            self.non_posix = true;
            self.pipefail_set = false;
        } else {
            self.non_posix = false;
            self.pipefail_set = has_pipefail_option(shell_cmd);
        }
    }
}

pub struct Dl4006;

impl Rule for Dl4006 {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            CODE,
            "Set pipefail",
            "Set the SHELL option -o pipefail before RUN with a pipe in it",
            DOC_URL,
            Severity::Warning,
            "reliability",
        )
    }

    /// Tracks a per-stage pipefail bit updated by SHELL instructions and
    /// raises on shell-form RUNs containing a pipe while it is unset.
    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        let meta = self.metadata();
        let mut violations = Vec::new();

        for stage in input.stages() {
            let mut state = StageState::default();
            if let Some(info) = input.semantic.stage_info(stage.index) {
                if info.shell_setting.source == ShellSource::Directive {
                    state.non_posix = info.shell_setting.variant.is_non_posix();
                }
            }

            for cmd in &stage.commands {
                match cmd {
                    Instruction::Shell(sh) => state.update_from_shell(&sh.shell),
                    Instruction::Run(run) => {
                        if let Some(v) = check_run(input, run, &state, stage.index, &meta) {
                            violations.push(v);
                        }
                    }
                    _ => {}
                }
            }
        }

        violations
    }
}

fn check_run(
    input: &LintInput<'_>,
    run: &RunInstr,
    state: &StageState,
    stage_index: usize,
    meta: &RuleMetadata,
) -> Option<Violation> {
    if state.non_posix || !run.prepend_shell() || state.pipefail_set {
        return None;
    }

    let cmd_str = run.command_string();
    let variant = input.shell_variant(stage_index);
    if !shell::has_pipes(&cmd_str, variant) {
        return None;
    }

    let mut violation = Violation::new(
        run.span.to_location(input.file),
        meta.code,
        "set the SHELL option -o pipefail before RUN with a pipe in it",
        meta.default_severity,
    )
    .with_doc_url(meta.doc_url)
    .with_detail(
        "If you are using /bin/sh in an alpine image or if your shell is symlinked to busybox \
         then consider explicitly setting your SHELL to /bin/ash, or disable this check. \
         Use SHELL [\"/bin/bash\", \"-o\", \"pipefail\", \"-c\"] before the RUN instruction.",
    );

    if let Some(fix) = generate_fix(input, run, &cmd_str, stage_index, variant) {
        violation = violation.with_suggested_fix(fix);
    }

    Some(violation)
}

/// Builds a fix inserting a SHELL line with -o pipefail before the RUN.
///
/// When prefer-run-heredoc is enabled and this RUN is a heredoc candidate,
/// the fix is withheld: heredoc conversion handles pipefail differently
/// (shebang plus set -o pipefail), and competing edits would conflict.
fn generate_fix(
    input: &LintInput<'_>,
    run: &RunInstr,
    cmd_str: &str,
    stage_index: usize,
    variant: Variant,
) -> Option<SuggestedFix> {
    if !run.prepend_shell() {
        return None;
    }
    if input.is_rule_enabled(crate::rules::tally::prefer_run_heredoc::CODE)
        && shell::is_heredoc_candidate(cmd_str, variant, input.heredoc_min_commands)
    {
        return None;
    }

    let fix_shell = determine_fix_shell(input, stage_index);
    let line = run.span.start.line;
    let col = run.span.start.column;
    let shell_line = format!("SHELL [\"{fix_shell}\", \"-o\", \"pipefail\", \"-c\"]\n");

    Some(SuggestedFix {
        description: "Add SHELL with -o pipefail before RUN".to_string(),
        safety: FixSafety::Suggestion,
        priority: 0,
        edits: vec![TextEdit {
            location: Location::range(input.file, line, col, line, col),
            new_text: shell_line,
        }],
        is_preferred: false,
        needs_resolve: false,
    })
}

/// Picks the shell path for the SHELL fix: the stage's own shell when it
/// supports pipefail, /bin/ash for alpine-based stages, /bin/bash
/// otherwise.
fn determine_fix_shell(input: &LintInput<'_>, stage_index: usize) -> String {
    if let Some(info) = input.semantic.stage_info(stage_index) {
        if let Some(argv0) = info.shell_setting.shell.first() {
            let base = basename(argv0).to_lowercase();
            let base = base.strip_suffix(".exe").unwrap_or(&base);
            if PIPEFAIL_SHELLS.contains(base) {
                return argv0.clone();
            }
        }
        let resolved = &info.from_args.resolved_base_name;
        if resolved.starts_with("alpine") || info.base_image.raw.starts_with("alpine") {
            return "/bin/ash".to_string();
        }
    }
    "/bin/bash".to_string()
}

fn is_non_posix_shell_cmd(shell_cmd: &[String]) -> bool {
    match shell_cmd.first() {
        Some(argv0) => Variant::from_shell(argv0).is_non_posix(),
        None => false,
    }
}

/// Checks a SHELL argv for `-o pipefail` with a shell that supports it.
///
/// Valid patterns include:
///   ["/bin/bash", "-o", "pipefail", "-c"]
///   ["/bin/bash", "-eo", "pipefail", "-c"]
///   ["/bin/bash", "-o", "errexit", "-o", "pipefail", "-c"]
fn has_pipefail_option(shell_cmd: &[String]) -> bool {
    if shell_cmd.len() < 2 {
        return false;
    }

    let name = basename(&shell_cmd[0]).to_lowercase();
    let name = name.strip_suffix(".exe").unwrap_or(&name);
    if !PIPEFAIL_SHELLS.contains(name) {
        return false;
    }

    let args = &shell_cmd[1..];
    for (i, arg) in args.iter().enumerate() {
        let next_is_pipefail = args.get(i + 1).map(|a| a == "pipefail").unwrap_or(false);
        if arg == "-o" && next_is_pipefail {
            return true;
        }
        if arg.len() > 1
            && arg.starts_with('-')
            && !arg.starts_with("--")
            && arg[1..].contains('o')
            && next_is_pipefail
        {
            return true;
        }
    }
    false
}
