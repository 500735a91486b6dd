//! Per-stage semantic records: shell settings, base image references,
//! COPY --from references, package tracking, and the WORKDIR trace.

use crate::parser::Span;
use crate::shell::Variant;

use super::variables::VariableScope;

/// The default shell Docker uses for RUN instructions.
pub const DEFAULT_SHELL: &[&str] = &["/bin/sh", "-c"];

/// A system package manager recognized by package tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Apk,
    Yum,
    Dnf,
    Zypper,
    Pacman,
    Emerge,
}

impl PackageManager {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Apk => "apk",
            PackageManager::Yum => "yum",
            PackageManager::Dnf => "dnf",
            PackageManager::Zypper => "zypper",
            PackageManager::Pacman => "pacman",
            PackageManager::Emerge => "emerge",
        }
    }
}

/// A package installation observed in a RUN command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInstall {
    pub manager: PackageManager,
    pub packages: Vec<String>,
    /// 1-based line of the RUN instruction.
    pub line: usize,
}

/// Where a stage's shell setting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellSource {
    Default,
    Instruction,
    Directive,
}

/// The active shell configuration for a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSetting {
    pub shell: Vec<String>,
    pub variant: Variant,
    pub source: ShellSource,
    /// 1-based line where the shell was set; `None` for the default.
    pub line: Option<usize>,
}

impl Default for ShellSetting {
    fn default() -> Self {
        ShellSetting {
            shell: DEFAULT_SHELL.iter().map(|s| s.to_string()).collect(),
            variant: Variant::Posix,
            source: ShellSource::Default,
            line: None,
        }
    }
}

/// Information about a stage's base image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseImageRef {
    /// The original base image string, as written.
    pub raw: String,
    /// True when this references an earlier stage.
    pub is_stage_ref: bool,
    /// Index of the referenced stage; `None` for external images.
    pub stage_index: Option<usize>,
    /// `--platform` value if specified.
    pub platform: Option<String>,
    pub span: Span,
}

/// A `COPY --from` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFromRef {
    /// The original `--from` value.
    pub from: String,
    pub is_stage_ref: bool,
    pub stage_index: Option<usize>,
    pub span: Span,
}

/// A variable reference in a FROM expression that was not declared in the
/// global ARG scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromArgRef {
    pub name: String,
}

/// FROM-expression evaluation results for a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FromArgsInfo {
    /// Undeclared references in the base image expression.
    pub undefined_base_name: Vec<FromArgRef>,
    /// Undeclared references in the `--platform` expression.
    pub undefined_platform: Vec<FromArgRef>,
    /// True when defaults-only evaluation of the base image expression
    /// yields an empty or invalid name.
    pub invalid_default_base_name: bool,
    /// The base image after defaults-only expansion.
    pub resolved_base_name: String,
    /// The base image after effective expansion (build-arg overrides
    /// included); differs from `resolved_base_name` when overrides apply.
    pub effective_base_name: String,
}

/// One step of the WORKDIR trace: the directory in effect from the given
/// line onward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkdirStep {
    pub line: usize,
    pub path: String,
}

/// Semantic information about one build stage.
#[derive(Debug, Clone)]
pub struct StageInfo {
    /// 0-based stage index.
    pub index: usize,
    pub shell_setting: ShellSetting,
    pub base_image: BaseImageRef,
    pub variables: VariableScope,
    pub copy_from_refs: Vec<CopyFromRef>,
    /// COPY --from references inside ONBUILD triggers.
    pub onbuild_copy_from_refs: Vec<CopyFromRef>,
    pub installed_packages: Vec<PackageInstall>,
    pub from_args: FromArgsInfo,
    /// The WORKDIR trace, beginning at `/`; each WORKDIR applies POSIX
    /// join/clean semantics.
    pub workdir_trace: Vec<WorkdirStep>,
    pub is_last_stage: bool,
}

impl StageInfo {
    /// Checks if a package was installed in this stage.
    pub fn has_package(&self, pkg: &str) -> bool {
        self.installed_packages
            .iter()
            .any(|i| i.packages.iter().any(|p| p == pkg))
    }

    /// The distinct package managers used in this stage, in first-use order.
    pub fn package_managers(&self) -> Vec<PackageManager> {
        let mut seen = Vec::new();
        for install in &self.installed_packages {
            if !seen.contains(&install.manager) {
                seen.push(install.manager);
            }
        }
        seen
    }

    /// The working directory in effect at the given 1-based line.
    pub fn workdir_at(&self, line: usize) -> &str {
        self.workdir_trace
            .iter()
            .rev()
            .find(|step| step.line <= line)
            .map(|step| step.path.as_str())
            .unwrap_or("/")
    }
}

/// POSIX path join/clean for WORKDIR tracking: relative paths join onto the
/// current directory, absolute paths reset, `.` and `..` segments collapse.
pub fn join_workdir(current: &str, next: &str) -> String {
    let combined = if next.starts_with('/') {
        next.to_string()
    } else {
        format!("{}/{}", current.trim_end_matches('/'), next)
    };

    let mut parts: Vec<&str> = Vec::new();
    for seg in combined.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}
