//! BuildKit-compatible rules (`buildkit/<PascalCase>`).
//!
//! These surface the parser's own lint warnings as violations, preserving
//! BuildKit's rule names, descriptions, and documentation URLs so output
//! lines up with `docker buildx build --check`. A documentation URL of the
//! form `https://docs.docker.com/go/dockerfile/rule/<kebab-case>/` maps to
//! the code `buildkit/PascalCase(kebab)`.

mod fixes;

use crate::rules::{LintInput, Rule, RuleMetadata, Severity, Violation, BUILDKIT_PREFIX};

/// Metadata for one BuildKit rule.
#[derive(Debug, Clone, Copy)]
pub struct BkRuleInfo {
    pub name: &'static str,
    pub code: &'static str,
    pub description: &'static str,
    pub doc_url: &'static str,
    pub default_severity: Severity,
    pub category: &'static str,
}

/// The BuildKit rules this linter captures: warnings the parser emits plus
/// the two semantic-driven checks. Only these are registered as active
/// rules; the rest of [`REGISTRY`] is metadata for lookups and the doc-URL
/// code mapping.
pub const CAPTURED_RULE_NAMES: &[&str] = &[
    "StageNameCasing",
    "FromAsCasing",
    "MaintainerDeprecated",
    "JSONArgsRecommended",
    "UndefinedArgInFrom",
    "InvalidDefaultArgInFrom",
];

/// The full BuildKit rule metadata table, mirroring the upstream linter's
/// registry.
pub static REGISTRY: &[BkRuleInfo] = &[
    BkRuleInfo {
        name: "StageNameCasing",
        code: "buildkit/StageNameCasing",
        description: "Stage names should be lowercase",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/stage-name-casing/",
        default_severity: Severity::Warning,
        category: "style",
    },
    BkRuleInfo {
        name: "FromAsCasing",
        code: "buildkit/FromAsCasing",
        description: "The 'as' keyword should match the case of the 'from' keyword",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/from-as-casing/",
        default_severity: Severity::Warning,
        category: "style",
    },
    BkRuleInfo {
        name: "NoEmptyContinuation",
        code: "buildkit/NoEmptyContinuation",
        description: "Empty continuation lines will become errors in a future release",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/no-empty-continuation/",
        default_severity: Severity::Warning,
        category: "correctness",
    },
    BkRuleInfo {
        name: "ConsistentInstructionCasing",
        code: "buildkit/ConsistentInstructionCasing",
        description: "All commands within the Dockerfile should use the same casing (either upper or lower)",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/consistent-instruction-casing/",
        default_severity: Severity::Warning,
        category: "style",
    },
    BkRuleInfo {
        name: "DuplicateStageName",
        code: "buildkit/DuplicateStageName",
        description: "Stage names should be unique",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/duplicate-stage-name/",
        default_severity: Severity::Warning,
        category: "correctness",
    },
    BkRuleInfo {
        name: "ReservedStageName",
        code: "buildkit/ReservedStageName",
        description: "Reserved words should not be used as stage names",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/reserved-stage-name/",
        default_severity: Severity::Warning,
        category: "correctness",
    },
    BkRuleInfo {
        name: "JSONArgsRecommended",
        code: "buildkit/JSONArgsRecommended",
        description: "JSON arguments recommended for ENTRYPOINT/CMD to prevent unintended behavior related to OS signals",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/json-args-recommended/",
        default_severity: Severity::Warning,
        category: "best-practice",
    },
    BkRuleInfo {
        name: "MaintainerDeprecated",
        code: "buildkit/MaintainerDeprecated",
        description: "The MAINTAINER instruction is deprecated, use a label instead to define an image author",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/maintainer-deprecated/",
        default_severity: Severity::Warning,
        category: "best-practice",
    },
    BkRuleInfo {
        name: "UndefinedArgInFrom",
        code: "buildkit/UndefinedArgInFrom",
        description: "FROM command must use declared ARGs",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/undefined-arg-in-from/",
        default_severity: Severity::Warning,
        category: "correctness",
    },
    BkRuleInfo {
        name: "UndefinedVar",
        code: "buildkit/UndefinedVar",
        description: "Variables should be defined before their use",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/undefined-var/",
        default_severity: Severity::Warning,
        category: "correctness",
    },
    BkRuleInfo {
        name: "WorkdirRelativePath",
        code: "buildkit/WorkdirRelativePath",
        description: "Relative workdir without an absolute workdir declared within the build can have unexpected results if the base image changes",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/workdir-relative-path/",
        default_severity: Severity::Warning,
        category: "correctness",
    },
    BkRuleInfo {
        name: "MultipleInstructionsDisallowed",
        code: "buildkit/MultipleInstructionsDisallowed",
        description: "Multiple instructions of the same type should not be used in the same stage",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/multiple-instructions-disallowed/",
        default_severity: Severity::Warning,
        category: "correctness",
    },
    BkRuleInfo {
        name: "LegacyKeyValueFormat",
        code: "buildkit/LegacyKeyValueFormat",
        description: "Legacy key/value format with whitespace separator should not be used",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/legacy-key-value-format/",
        default_severity: Severity::Warning,
        category: "style",
    },
    BkRuleInfo {
        name: "RedundantTargetPlatform",
        code: "buildkit/RedundantTargetPlatform",
        description: "Setting platform to predefined $TARGETPLATFORM in FROM is redundant as this is the default behavior",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/redundant-target-platform/",
        default_severity: Severity::Warning,
        category: "style",
    },
    BkRuleInfo {
        name: "SecretsUsedInArgOrEnv",
        code: "buildkit/SecretsUsedInArgOrEnv",
        description: "Sensitive data should not be used in the ARG or ENV commands",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/secrets-used-in-arg-or-env/",
        default_severity: Severity::Warning,
        category: "security",
    },
    BkRuleInfo {
        name: "InvalidDefaultArgInFrom",
        code: "buildkit/InvalidDefaultArgInFrom",
        description: "Default value for global ARG results in an empty or invalid base image name",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/invalid-default-arg-in-from/",
        default_severity: Severity::Warning,
        category: "correctness",
    },
    BkRuleInfo {
        name: "FromPlatformFlagConstDisallowed",
        code: "buildkit/FromPlatformFlagConstDisallowed",
        description: "FROM --platform flag should not use a constant value",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/from-platform-flag-const-disallowed/",
        default_severity: Severity::Warning,
        category: "best-practice",
    },
    BkRuleInfo {
        name: "CopyIgnoredFile",
        code: "buildkit/CopyIgnoredFile",
        description: "Attempting to Copy file that is excluded by .dockerignore",
        doc_url: "https://docs.docker.com/go/dockerfile/rule/copy-ignored-file/",
        default_severity: Severity::Warning,
        category: "correctness",
    },
    BkRuleInfo {
        name: "InvalidBaseImagePlatform",
        code: "buildkit/InvalidBaseImagePlatform",
        description: "Base image platform does not match expected target platform",
        doc_url: "",
        default_severity: Severity::Warning,
        category: "correctness",
    },
];

/// Looks up BuildKit rule metadata by its upstream name.
pub fn get(name: &str) -> Option<&'static BkRuleInfo> {
    REGISTRY.iter().find(|info| info.name == name)
}

/// Maps a BuildKit documentation URL to its rule code:
/// `…/rule/stage-name-casing/` → `buildkit/StageNameCasing`.
pub fn code_from_doc_url(url: &str) -> Option<String> {
    let idx = url.find("/rule/")?;
    let kebab = url[idx + "/rule/".len()..].trim_end_matches('/');
    if kebab.is_empty() {
        return None;
    }
    Some(format!("{BUILDKIT_PREFIX}{}", pascal_case(kebab)))
}

fn pascal_case(kebab: &str) -> String {
    kebab
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    // Preserve upstream's JSONArgsRecommended style for
                    // known initialisms.
                    if part == "json" {
                        "JSON".to_string()
                    } else {
                        first.to_ascii_uppercase().to_string() + chars.as_str()
                    }
                }
                None => String::new(),
            }
        })
        .collect()
}

/// A registered rule surfacing one BuildKit parser warning.
pub struct BuildkitWarningRule {
    info: &'static BkRuleInfo,
}

impl Rule for BuildkitWarningRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            self.info.code,
            self.info.name,
            self.info.description,
            self.info.doc_url,
            self.info.default_severity,
            self.info.category,
        )
    }

    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        let meta = self.metadata();

        // Two rules are driven by FROM-expression evaluation on the
        // semantic model rather than by parser warnings.
        match self.info.name {
            "UndefinedArgInFrom" => return undefined_arg_violations(input, &meta),
            "InvalidDefaultArgInFrom" => return invalid_default_violations(input, &meta),
            _ => {}
        }

        input
            .parse
            .warnings
            .iter()
            .filter(|w| w.rule_name == self.info.name)
            .map(|w| {
                let mut violation = Violation::new(
                    w.span.to_location(input.file),
                    meta.code,
                    w.message.clone(),
                    meta.default_severity,
                );
                if !w.url.is_empty() {
                    violation = violation.with_doc_url(w.url.clone());
                }

                let fix = match self.info.name {
                    "StageNameCasing" => fixes::stage_name_casing_fix(&w.message, input),
                    "FromAsCasing" => fixes::from_as_casing_fix(w.span.start.line, input),
                    "JSONArgsRecommended" => {
                        fixes::json_args_fix(w.span.start.line, w.span.end.line, input)
                    }
                    _ => None,
                };
                if let Some(fix) = fix {
                    violation = violation.with_suggested_fix(fix);
                }
                violation
            })
            .collect()
    }
}

/// `buildkit/UndefinedArgInFrom`: variable references in FROM expressions
/// that no meta-ARG or automatic ARG declares.
fn undefined_arg_violations(input: &LintInput<'_>, meta: &RuleMetadata) -> Vec<Violation> {
    let mut violations = Vec::new();
    for info in input.semantic.stages() {
        let refs = info
            .from_args
            .undefined_base_name
            .iter()
            .chain(info.from_args.undefined_platform.iter());
        for arg_ref in refs {
            violations.push(
                Violation::new(
                    info.base_image.span.to_location(input.file),
                    meta.code,
                    format!("FROM argument '{}' is not declared", arg_ref.name),
                    meta.default_severity,
                )
                .with_doc_url(meta.doc_url),
            );
        }
    }
    violations
}

/// `buildkit/InvalidDefaultArgInFrom`: a declared meta-ARG whose defaults
/// expand the base image to an empty or invalid name.
fn invalid_default_violations(input: &LintInput<'_>, meta: &RuleMetadata) -> Vec<Violation> {
    let mut violations = Vec::new();
    for info in input.semantic.stages() {
        // Only when every referenced name is declared; undeclared names are
        // UndefinedArgInFrom's concern.
        if !info.from_args.invalid_default_base_name
            || !info.from_args.undefined_base_name.is_empty()
            || !info.base_image.raw.contains('$')
        {
            continue;
        }
        violations.push(
            Violation::new(
                info.base_image.span.to_location(input.file),
                meta.code,
                format!(
                    "Default value for ARG results in an empty or invalid base image name: {:?}",
                    info.base_image.raw
                ),
                meta.default_severity,
            )
            .with_doc_url(meta.doc_url),
        );
    }
    violations
}

/// One registered rule per captured BuildKit rule, in table order. Rules
/// whose warnings this parser never produces stay metadata-only.
pub fn warning_rules() -> Vec<Box<dyn Rule>> {
    REGISTRY
        .iter()
        .filter(|info| CAPTURED_RULE_NAMES.contains(&info.name))
        .map(|info| Box::new(BuildkitWarningRule { info }) as Box<dyn Rule>)
        .collect()
}
