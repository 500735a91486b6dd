//! DL3006: always tag the version of an image explicitly.

use crate::rules::{LintInput, Rule, RuleMetadata, Severity, Violation};

use super::image_ref::ImageRef;

pub const CODE: &str = "hadolint/DL3006";
pub const DOC_URL: &str = "https://github.com/hadolint/hadolint/wiki/DL3006";

pub struct Dl3006;

impl Rule for Dl3006 {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            CODE,
            "Always tag the image version",
            "Always tag the version of an image explicitly",
            DOC_URL,
            Severity::Warning,
            "reproducibility",
        )
    }

    /// Warns on FROM without a tag or digest. Stage references, `scratch`,
    /// and unresolvable variable expressions are skipped.
    fn check(&self, input: &LintInput<'_>) -> Vec<Violation> {
        let meta = self.metadata();
        let mut violations = Vec::new();

        for stage in input.stages() {
            if stage.base_name == "scratch" {
                continue;
            }
            if let Some(info) = input.semantic.stage_info(stage.index) {
                if info.base_image.is_stage_ref {
                    continue;
                }
            }

            // Resolve variable expressions with defaults before judging;
            // skip when the expression does not resolve to a usable name.
            let name = if stage.base_name.contains('$') {
                match input.semantic.stage_info(stage.index) {
                    Some(info) if !info.from_args.invalid_default_base_name => {
                        info.from_args.resolved_base_name.clone()
                    }
                    _ => continue,
                }
            } else {
                stage.base_name.clone()
            };

            let Some(image) = ImageRef::parse(&name) else {
                continue;
            };
            if image.has_explicit_version() {
                continue;
            }

            violations.push(
                Violation::new(
                    stage.span.to_location(input.file),
                    meta.code,
                    format!(
                        "always tag the version of an image explicitly (e.g., {}:<tag>)",
                        image.familiar_name()
                    ),
                    meta.default_severity,
                )
                .with_doc_url(meta.doc_url)
                .with_detail(
                    "Untagged images resolve to :latest, which can change between builds. \
                     Pin a specific tag or digest for reproducible builds.",
                ),
            );
        }

        violations
    }
}
