//! DL3007: avoid the :latest tag.

use crate::rules::{LintInput, Rule, RuleMetadata, Severity, Violation};

use super::image_ref::ImageRef;

pub const CODE: &str = "hadolint/DL3007";
pub const DOC_URL: &str = "https://github.com/hadolint/hadolint/wiki/DL3007";

pub struct Dl3007;

impl Rule for Dl3007 {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata::new(
            CODE,
            "Avoid using :latest tag",
            "Using :latest is prone to errors if the image will ever update. Pin the version explicitly to a release tag.",
            DOC_URL,
            Severity::Warning,
            "reproducibility",
        )
    }

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

            let Some(image) = ImageRef::parse(&stage.base_name) else {
                continue;
            };
            if !image.is_latest_tag() {
                continue;
            }

            violations.push(
                Violation::new(
                    stage.span.to_location(input.file),
                    meta.code,
                    format!(
                        "using :latest tag for image {:?} is prone to errors; pin a specific version instead (e.g., {}:22.04)",
                        stage.base_name,
                        image.familiar_name()
                    ),
                    meta.default_severity,
                )
                .with_doc_url(meta.doc_url)
                .with_detail(
                    "The :latest tag can change at any time, potentially breaking builds \
                     or introducing unexpected behavior. Use a specific version tag for reproducibility.",
                ),
            );
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use crate::rules::testutil::check_rule;

    #[test]
    fn test_latest_tag_flagged() {
        let violations = check_rule("hadolint/DL3007", "FROM ubuntu:latest\n");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("ubuntu:latest"));
    }

    #[test]
    fn test_pinned_tag_passes() {
        assert!(check_rule("hadolint/DL3007", "FROM ubuntu:22.04\n").is_empty());
    }

    #[test]
    fn test_untagged_passes_here() {
        // Untagged is DL3006's concern, not DL3007's.
        assert!(check_rule("hadolint/DL3007", "FROM ubuntu\n").is_empty());
    }

    #[test]
    fn test_stage_named_latest_not_flagged() {
        let source = "FROM alpine:3.19 AS latest\nFROM latest\n";
        assert!(check_rule("hadolint/DL3007", source).is_empty());
    }
}
