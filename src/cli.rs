//! Command-line interface for tally.
//!
//! The CLI is a thin driver over the lint kernel: it discovers files,
//! resolves configuration, fans out per-file lints (in parallel via rayon;
//! each file gets its own input and model), renders results, and maps the
//! violation stream to exit codes.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::Config;
use crate::fix::FixOptions;
use crate::lint::{FileReport, Linter};
use crate::report;
use crate::rules::{registry, FixSafety, Severity};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// File names recognized during directory discovery.
const DOCKERFILE_NAMES: &[&str] = &["Dockerfile", "Containerfile"];

/// Static linter for container build files (Dockerfile / Containerfile).
///
/// Parses build files, runs a registry of rules against a semantic model,
/// optionally applies auto-fixes, and reports diagnostics in several
/// formats.
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lint build files
    #[command(visible_alias = "check")]
    Lint(LintArgs),
    /// Create a starter .tally.toml
    Init(InitArgs),
}

/// Arguments for the lint command.
#[derive(Parser)]
pub struct LintArgs {
    /// Files or directories to lint ("-" reads stdin)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output format: pretty, text, json, or sarif
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Path to a configuration file (default: discover .tally.toml upward)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Fail when violations at or above this severity exist
    #[arg(short, long, default_value = "warning")]
    pub threshold: Severity,

    /// Apply safe and suggested fixes, rewriting files in place
    #[arg(long)]
    pub fix: bool,

    /// Also apply unsafe fixes (implies --fix)
    #[arg(long)]
    pub fix_unsafe: bool,

    /// Only apply fixes from these rules (can be repeated)
    #[arg(long = "fix-rule", value_name = "CODE")]
    pub fix_rules: Vec<String>,

    /// Build arguments, as KEY=VALUE (can be repeated)
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    pub build_args: Vec<String>,

    /// Glob patterns to exclude during directory discovery (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude_patterns: Vec<String>,

    /// Convenience override for tally/max-lines
    #[arg(long)]
    pub max_lines: Option<usize>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = ".tally.toml")]
    pub output: PathBuf,
}

const INIT_TEMPLATE: &str = r#"# tally configuration
# https://github.com/tinovyatkin/tally

# [rules."hadolint/DL3007"]
# severity = "error"

# [rules."hadolint/DL3026"]
# options = { trusted-registries = ["docker.io", "gcr.io"] }

# [rules."tally/max-lines"]
# options = { max = 120, skip-blank-lines = true, skip-comments = true }
"#;

pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        anyhow::bail!("{} already exists", args.output.display());
    }
    std::fs::write(&args.output, INIT_TEMPLATE)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("wrote {}", args.output.display());
    Ok(EXIT_SUCCESS)
}

pub fn run_lint(args: &LintArgs) -> anyhow::Result<i32> {
    let files = discover_files(&args.paths, &args.exclude_patterns)?;
    if files.is_empty() {
        anyhow::bail!("no build files found under the given paths");
    }

    let config = resolve_config(args, &files)?;
    config.validate(registry())?;

    let mut linter = Linter::new(config).with_build_args(parse_build_args(&args.build_args)?);
    let fixing = args.fix || args.fix_unsafe || !args.fix_rules.is_empty();
    if fixing {
        linter = linter.with_fix(FixOptions {
            safety_threshold: if args.fix_unsafe {
                FixSafety::Unsafe
            } else {
                FixSafety::Suggestion
            },
            rule_filter: if args.fix_rules.is_empty() {
                None
            } else {
                Some(args.fix_rules.iter().cloned().collect::<BTreeSet<_>>())
            },
        });
    }

    // Read sources up front; the text format needs them for snippets.
    let mut sources = Vec::new();
    for file in &files {
        let content = if file.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?
        };
        sources.push((file.to_string_lossy().to_string(), content));
    }

    let progress = (sources.len() > 1 && args.format == "pretty").then(|| {
        let bar = ProgressBar::new(sources.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("  linting {pos}/{len} {wide_bar}")
                .expect("static template"),
        );
        bar
    });

    // One lint call per file, no shared mutable state between files.
    let mut reports: Vec<FileReport> = sources
        .par_iter()
        .map(|(file, content)| {
            let report = linter.lint_source(file, content);
            if let Some(bar) = &progress {
                bar.inc(1);
            }
            report
        })
        .collect();
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    reports.sort_by(|a, b| a.file.cmp(&b.file));

    // Write rewritten sources back (never for stdin).
    if fixing {
        for report in &reports {
            if report.file == "-" {
                continue;
            }
            if let Some(fix) = &report.fix {
                if fix.changed() {
                    std::fs::write(&report.file, &fix.modified)
                        .with_context(|| format!("writing {}", report.file))?;
                }
            }
        }
    }

    let mut stdout = std::io::stdout().lock();
    match args.format.as_str() {
        "pretty" => report::write_pretty(&mut stdout, &reports)?,
        "text" => report::write_text(&mut stdout, &reports, &sources)?,
        "json" => report::write_json(&mut stdout, &reports)?,
        "sarif" => report::write_sarif(&mut stdout, &reports)?,
        other => anyhow::bail!("unknown format {other:?} (expected pretty, text, json, sarif)"),
    }

    let parse_failed = reports.iter().any(|r| {
        r.violations
            .iter()
            .any(|v| v.rule_code == crate::error::PARSE_ERROR_CODE)
    });
    if parse_failed {
        return Ok(EXIT_ERROR);
    }

    let failed = reports
        .iter()
        .any(|r| r.has_violations_at_least(args.threshold));
    Ok(if failed { EXIT_FAILED } else { EXIT_SUCCESS })
}

fn resolve_config(args: &LintArgs, files: &[PathBuf]) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let anchor = files
                .iter()
                .find(|f| f.as_os_str() != "-")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("."));
            Config::load_for(&anchor)?
        }
    };

    if let Some(max) = args.max_lines {
        let layer: Config = toml::from_str(&format!(
            "[rules.\"tally/max-lines\"]\noptions = {{ max = {max} }}\n"
        ))
        .expect("generated config is valid");
        config.merge(layer);
    }

    Ok(config)
}

fn parse_build_args(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("--build-arg {pair:?} is not KEY=VALUE"))?;
        out.insert(key.to_string(), value.to_string());
    }
    Ok(out)
}

fn build_exclude_set(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid --exclude {pattern:?}"))?);
    }
    Ok(builder.build()?)
}

/// Expands the given paths: files are taken as-is, directories are walked
/// for Dockerfile/Containerfile names and *.dockerfile suffixes.
fn discover_files(paths: &[PathBuf], excludes: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let exclude_set = build_exclude_set(excludes)?;
    let mut files = Vec::new();

    for path in paths {
        if path.as_os_str() == "-" || path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            anyhow::bail!("{} does not exist", path.display());
        }
        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if !is_dockerfile_name(entry.path()) {
                continue;
            }
            if exclude_set.is_match(entry.path()) {
                continue;
            }
            files.push(entry.into_path());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn is_dockerfile_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if DOCKERFILE_NAMES.contains(&name) {
        return true;
    }
    // Dockerfile.api, api.dockerfile, api.Dockerfile
    name.starts_with("Dockerfile.")
        || name.ends_with(".dockerfile")
        || name.ends_with(".Dockerfile")
}
