//! Image reference parsing with Docker Hub normalization.
//!
//! Handles the shorthand rules of distribution references: `ubuntu` means
//! `docker.io/library/ubuntu`, `user/repo` means `docker.io/user/repo`, and
//! a first component containing a dot, a colon, or equal to `localhost` is
//! a registry domain.

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry domain after normalization (`docker.io` for Hub images).
    domain: String,
    /// Repository path after normalization (`library/ubuntu`).
    path: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    /// Parses an image reference. Returns `None` for strings that are not
    /// valid references — including expressions still containing variable
    /// references.
    pub fn parse(image: &str) -> Option<ImageRef> {
        if image.is_empty() || image.contains(['$', ' ', '\t']) {
            return None;
        }

        let (rest, digest) = match image.split_once('@') {
            Some((r, d)) => (r, Some(d.to_string())),
            None => (image, None),
        };

        // The tag is after the last colon that follows the last slash
        // (a colon before a slash belongs to a registry port).
        let (name, tag) = match rest.rfind(':') {
            Some(i) if rest[i..].find('/').is_none() => {
                (&rest[..i], Some(rest[i + 1..].to_string()))
            }
            _ => (rest, None),
        };

        if name.is_empty() {
            return None;
        }
        if let Some(t) = &tag {
            if t.is_empty() || !t.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c)) {
                return None;
            }
        }

        let (domain, path) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            Some(_) => ("docker.io".to_string(), name.to_string()),
            None => ("docker.io".to_string(), format!("library/{name}")),
        };

        if path.is_empty() || path.chars().any(|c| c.is_ascii_uppercase()) {
            return None;
        }

        Some(ImageRef {
            domain,
            path,
            tag,
            digest,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn has_tag(&self) -> bool {
        self.tag.is_some()
    }

    pub fn has_digest(&self) -> bool {
        self.digest.is_some()
    }

    /// Images without a tag or digest default to `:latest`, which is
    /// unpinned.
    pub fn has_explicit_version(&self) -> bool {
        self.has_tag() || self.has_digest()
    }

    pub fn is_latest_tag(&self) -> bool {
        self.tag.as_deref() == Some("latest")
    }

    /// Shortened display name: Hub images lose `docker.io/` and `library/`.
    pub fn familiar_name(&self) -> String {
        if self.domain == "docker.io" {
            self.path
                .strip_prefix("library/")
                .unwrap_or(&self.path)
                .to_string()
        } else {
            format!("{}/{}", self.domain, self.path)
        }
    }
}
