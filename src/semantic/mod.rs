//! Semantic model construction.
//!
//! Transforms the parser's stage/instruction stream into a [`Model`]:
//! resolved stage aliases, per-stage shell settings, variable scopes,
//! WORKDIR traces, base-image and COPY --from references, FROM-expression
//! evaluation, and package tracking. Problems found while building
//! (duplicate stage names, self-referencing COPY --from) become
//! construction issues that flow into the main violation stream unchanged.

mod expand;
mod stage;
mod variables;

pub use expand::{expand_word, Env, ExpandResult};
pub use stage::{
    join_workdir, BaseImageRef, CopyFromRef, FromArgRef, FromArgsInfo, PackageInstall,
    PackageManager, ShellSetting, ShellSource, StageInfo, WorkdirStep, DEFAULT_SHELL,
};
pub use variables::{VarKind, VariableScope};

use std::collections::{BTreeMap, BTreeSet};

use crate::directives::DirectiveSet;
use crate::parser::{Instruction, ParseResult, RunInstr, Span};
use crate::rules::hadolint::{dl3023, dl3024};
use crate::rules::{Severity, Violation};
use crate::shell::{self, Variant};

/// Automatic build arguments available to FROM expressions.
const AUTOMATIC_PLATFORM_ARGS: &[&str] = &[
    "TARGETPLATFORM",
    "TARGETOS",
    "TARGETARCH",
    "TARGETVARIANT",
    "BUILDPLATFORM",
    "BUILDOS",
    "BUILDARCH",
    "BUILDVARIANT",
];

/// The semantic model of one Dockerfile.
#[derive(Debug, Clone, Default)]
pub struct Model {
    stages: Vec<StageInfo>,
    meta_args: Vec<(String, Option<String>)>,
    /// Lowercased alias → stage index; first binding wins.
    stages_by_name: BTreeMap<String, usize>,
    construction_issues: Vec<Violation>,
}

impl Model {
    /// Builds the semantic model. Building never fails: partial models are
    /// emitted and rules degrade gracefully on missing fields.
    pub fn build(
        parse: &ParseResult,
        directives: &DirectiveSet,
        build_args: &BTreeMap<String, String>,
        file: &str,
    ) -> Model {
        Builder {
            parse,
            directives,
            build_args,
            file,
        }
        .build()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_info(&self, index: usize) -> Option<&StageInfo> {
        self.stages.get(index)
    }

    pub fn stages(&self) -> &[StageInfo] {
        &self.stages
    }

    /// Case-insensitive stage lookup by alias.
    pub fn stage_index_by_name(&self, name: &str) -> Option<usize> {
        self.stages_by_name.get(&name.to_lowercase()).copied()
    }

    pub fn stages_by_name(&self) -> &BTreeMap<String, usize> {
        &self.stages_by_name
    }

    pub fn meta_args(&self) -> &[(String, Option<String>)] {
        &self.meta_args
    }

    /// Violations discovered while building the model.
    pub fn construction_issues(&self) -> &[Violation] {
        &self.construction_issues
    }

    /// The shell variant for a stage, defaulting to POSIX when the stage is
    /// missing from a partial model.
    pub fn shell_variant(&self, stage_index: usize) -> Variant {
        self.stage_info(stage_index)
            .map(|info| info.shell_setting.variant)
            .unwrap_or(Variant::Posix)
    }
}

struct Builder<'a> {
    parse: &'a ParseResult,
    directives: &'a DirectiveSet,
    build_args: &'a BTreeMap<String, String>,
    file: &'a str,
}

impl<'a> Builder<'a> {
    fn build(self) -> Model {
        let mut model = Model::default();

        for arg in &self.parse.meta_args {
            for (name, default) in &arg.args {
                model.meta_args.push((name.clone(), default.clone()));
            }
        }

        let eval = FromArgEval::new(&model.meta_args, self.build_args);
        let stage_total = self.parse.stages.len();

        for stage in &self.parse.stages {
            // Register the alias first so COPY --from=<own alias> resolves
            // to the current stage. First binding wins on duplicates.
            if let Some(alias) = stage.normalized_name() {
                if let Some(&existing) = model.stages_by_name.get(&alias) {
                    model.construction_issues.push(
                        Violation::new(
                            stage.span.to_location(self.file),
                            dl3024::CODE,
                            dl3024::message(stage.name.as_deref().unwrap_or(&alias), existing),
                            Severity::Error,
                        )
                        .with_doc_url(dl3024::DOC_URL),
                    );
                } else {
                    model.stages_by_name.insert(alias, stage.index);
                }
            }

            let (info, issues) = self.build_stage(stage, &model, &eval, stage_total);
            model.construction_issues.extend(issues);
            model.stages.push(info);
        }

        model
    }

    fn build_stage(
        &self,
        stage: &crate::parser::Stage,
        model: &Model,
        eval: &FromArgEval,
        stage_total: usize,
    ) -> (StageInfo, Vec<Violation>) {
        let base_ref = stage.base_name.to_lowercase();
        let base_stage_index = model
            .stages_by_name
            .get(&base_ref)
            .copied()
            .filter(|&i| i < stage.index);

        let mut info = StageInfo {
            index: stage.index,
            shell_setting: self.initial_shell(stage.span),
            base_image: BaseImageRef {
                raw: stage.base_name.clone(),
                is_stage_ref: base_stage_index.is_some(),
                stage_index: base_stage_index,
                platform: stage.platform.clone(),
                span: stage.span,
            },
            variables: VariableScope::new(&model.meta_args, self.build_args),
            copy_from_refs: Vec::new(),
            onbuild_copy_from_refs: Vec::new(),
            installed_packages: Vec::new(),
            from_args: eval.evaluate(stage),
            workdir_trace: vec![WorkdirStep {
                line: stage.span.start.line,
                path: "/".to_string(),
            }],
            is_last_stage: stage.index + 1 == stage_total,
        };

        let mut issues = Vec::new();
        for cmd in &stage.commands {
            self.walk_command(cmd, stage, model, &mut info, &mut issues);
        }

        (info, issues)
    }

    fn walk_command(
        &self,
        cmd: &Instruction,
        stage: &crate::parser::Stage,
        model: &Model,
        info: &mut StageInfo,
        issues: &mut Vec<Violation>,
    ) {
        match cmd {
            Instruction::Shell(sh) => {
                info.shell_setting = ShellSetting {
                    shell: sh.shell.clone(),
                    variant: Variant::from_shell_cmd(&sh.shell),
                    source: ShellSource::Instruction,
                    line: Some(sh.span.start.line),
                };
            }
            Instruction::Arg(arg) => {
                for (name, default) in &arg.args {
                    info.variables
                        .declare_arg(name, default.as_deref(), arg.span.start.line);
                }
            }
            Instruction::Env(env) => {
                for (name, value) in &env.pairs {
                    info.variables
                        .declare_env(name, value, env.span.start.line);
                }
            }
            Instruction::Workdir(wd) => {
                let current = info
                    .workdir_trace
                    .last()
                    .map(|s| s.path.clone())
                    .unwrap_or_else(|| "/".to_string());
                info.workdir_trace.push(WorkdirStep {
                    line: wd.span.start.line,
                    path: join_workdir(&current, &wd.path),
                });
            }
            Instruction::Copy(copy) => {
                if let Some(from) = &copy.from {
                    let resolved = self.resolve_copy_from(from, stage, model, copy.span);
                    if resolved.is_stage_ref && resolved.stage_index == Some(stage.index) {
                        issues.push(
                            Violation::new(
                                copy.span.to_location(self.file),
                                dl3023::CODE,
                                dl3023::message(
                                    stage.name.as_deref().unwrap_or(&stage.index.to_string()),
                                    from,
                                ),
                                Severity::Error,
                            )
                            .with_doc_url(dl3023::DOC_URL),
                        );
                    }
                    info.copy_from_refs.push(resolved);
                }
            }
            Instruction::Onbuild(ob) => {
                if let Some(Instruction::Copy(copy)) = ob.parsed.as_deref() {
                    if let Some(from) = &copy.from {
                        info.onbuild_copy_from_refs
                            .push(self.resolve_copy_from(from, stage, model, ob.span));
                    }
                }
            }
            Instruction::Run(run) => {
                if !info.shell_setting.variant.is_non_posix() && run.prepend_shell() {
                    info.installed_packages.extend(track_packages(
                        run,
                        info.shell_setting.variant,
                    ));
                }
            }
            _ => {}
        }
    }

    fn resolve_copy_from(
        &self,
        from: &str,
        stage: &crate::parser::Stage,
        model: &Model,
        span: Span,
    ) -> CopyFromRef {
        let lowered = from.to_lowercase();
        let by_name = model.stages_by_name.get(&lowered).copied();
        let by_index = from
            .parse::<usize>()
            .ok()
            .filter(|&n| n <= stage.index);
        let stage_index = by_name.or(by_index);
        CopyFromRef {
            from: from.to_string(),
            is_stage_ref: stage_index.is_some(),
            stage_index,
            span,
        }
    }

    /// The stage's shell before any SHELL instruction: the default, unless
    /// a shell directive precedes the stage.
    fn initial_shell(&self, stage_span: Span) -> ShellSetting {
        let directive = self
            .directives
            .shell_directives
            .iter()
            .filter(|d| d.line < stage_span.start.line)
            .last();
        match directive {
            Some(d) => ShellSetting {
                shell: vec![d.shell.clone()],
                variant: Variant::from_shell(&d.shell),
                source: ShellSource::Directive,
                line: Some(d.line),
            },
            None => ShellSetting::default(),
        }
    }
}

/// Two expansion environments for FROM expressions: the effective one
/// (build-arg overrides included) and the defaults-only one, used to detect
/// references that would be empty in a plain build.
struct FromArgEval {
    effective: Env,
    defaults: Env,
    declared: BTreeSet<String>,
}

impl FromArgEval {
    fn new(meta_args: &[(String, Option<String>)], build_args: &BTreeMap<String, String>) -> Self {
        let mut effective = Env::new();
        let mut defaults = Env::new();
        let mut declared = BTreeSet::new();

        for name in AUTOMATIC_PLATFORM_ARGS {
            declared.insert(name.to_string());
        }
        for (name, value) in automatic_platform_values() {
            effective.set(name.clone(), value.clone());
            defaults.set(name, value);
        }
        for (name, value) in build_args {
            if declared.contains(name) {
                effective.set(name.clone(), value.clone());
            }
        }

        for (name, default) in meta_args {
            declared.insert(name.clone());
            if let Some(v) = default {
                defaults.set(name.clone(), v.clone());
            }
            match build_args.get(name) {
                Some(over) => effective.set(name.clone(), over.clone()),
                None => {
                    if let Some(v) = default {
                        effective.set(name.clone(), v.clone());
                    }
                }
            }
        }

        FromArgEval {
            effective,
            defaults,
            declared,
        }
    }

    fn evaluate(&self, stage: &crate::parser::Stage) -> FromArgsInfo {
        let mut info = FromArgsInfo::default();

        let base = expand_word(&stage.base_name, &self.defaults, '\\');
        info.undefined_base_name = base
            .unmatched
            .iter()
            .filter(|name| !self.declared.contains(*name))
            .map(|name| FromArgRef { name: name.clone() })
            .collect();
        info.invalid_default_base_name =
            base.result.trim().is_empty() || base.result.contains(char::is_whitespace);
        info.resolved_base_name = base.result;

        if let Some(platform) = &stage.platform {
            let p = expand_word(platform, &self.defaults, '\\');
            info.undefined_platform = p
                .unmatched
                .iter()
                .filter(|name| !self.declared.contains(*name))
                .map(|name| FromArgRef { name: name.clone() })
                .collect();
        }

        info.effective_base_name = expand_word(&stage.base_name, &self.effective, '\\').result;

        info
    }
}

/// Host platform values for the automatic ARGs, honoring
/// DOCKER_DEFAULT_PLATFORM.
fn automatic_platform_values() -> Vec<(String, String)> {
    let platform = default_platform();
    let (os, arch) = match platform.split_once('/') {
        Some((os, rest)) => (
            os.to_string(),
            rest.split('/').next().unwrap_or(rest).to_string(),
        ),
        None => (platform.clone(), String::new()),
    };
    vec![
        ("TARGETPLATFORM".to_string(), platform.clone()),
        ("TARGETOS".to_string(), os.clone()),
        ("TARGETARCH".to_string(), arch.clone()),
        ("BUILDPLATFORM".to_string(), platform),
        ("BUILDOS".to_string(), os),
        ("BUILDARCH".to_string(), arch),
    ]
}

fn default_platform() -> String {
    if let Ok(dp) = std::env::var("DOCKER_DEFAULT_PLATFORM") {
        if !dp.is_empty() {
            return dp;
        }
    }
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };
    format!("{}/{}", std::env::consts::OS, arch)
}

/// Shallow package-install parsing for RUN commands.
fn track_packages(run: &RunInstr, variant: Variant) -> Vec<PackageInstall> {
    const MANAGERS: &[&str] = &[
        "apt-get", "apt", "apk", "yum", "dnf", "zypper", "pacman", "emerge",
    ];
    let cmd_str = run.command_string();
    let line = run.span.start.line;
    let mut installs = Vec::new();

    for cmd in shell::find_commands(&cmd_str, variant, MANAGERS) {
        let manager = match cmd.name.as_str() {
            "apt-get" | "apt" => PackageManager::Apt,
            "apk" => PackageManager::Apk,
            "yum" => PackageManager::Yum,
            "dnf" => PackageManager::Dnf,
            "zypper" => PackageManager::Zypper,
            "pacman" => PackageManager::Pacman,
            "emerge" => PackageManager::Emerge,
            _ => continue,
        };

        let packages: Vec<String> = match manager {
            PackageManager::Pacman => {
                if !cmd.has_flag("-S") {
                    continue;
                }
                non_flag_args(&cmd.args, 0)
            }
            PackageManager::Emerge => non_flag_args(&cmd.args, 0),
            _ => {
                let verb_ok = match (&manager, cmd.subcommand.as_deref()) {
                    (PackageManager::Apt, Some("install")) => true,
                    (PackageManager::Apk, Some("add")) => true,
                    (PackageManager::Yum | PackageManager::Dnf, Some("install")) => true,
                    (PackageManager::Zypper, Some("install" | "in")) => true,
                    _ => false,
                };
                if !verb_ok {
                    continue;
                }
                let after = cmd.subcommand_position.map(|p| p + 1).unwrap_or(0);
                non_flag_args(&cmd.args, after)
            }
        };

        if !packages.is_empty() {
            installs.push(PackageInstall {
                manager,
                packages,
                line,
            });
        }
    }

    installs
}

fn non_flag_args(args: &[String], from: usize) -> Vec<String> {
    args.iter()
        .skip(from)
        .filter(|a| !a.starts_with('-'))
        .cloned()
        .collect()
}
