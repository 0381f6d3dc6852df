//! Image reference normalization.

use oci_distribution::Reference;

use crate::{Error, Result};

/// Tag applied to references that carry neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

/// Parse an image reference and make its tag explicit.
///
/// Name-only references get [`DEFAULT_TAG`]; anything already carrying a
/// tag or digest is returned as parsed.
pub fn normalize(image: &str) -> Result<Reference> {
    let reference: Reference = image
        .parse()
        .map_err(|e: oci_distribution::ParseError| Error::invalid_reference(image, e.to_string()))?;

    if reference.tag().is_none() && reference.digest().is_none() {
        return Ok(Reference::with_tag(
            reference.registry().to_string(),
            reference.repository().to_string(),
            DEFAULT_TAG.to_string(),
        ));
    }

    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_name_only_gets_latest() {
        let r = normalize("repo/image").unwrap();
        assert_eq!(r.registry(), "docker.io");
        assert_eq!(r.repository(), "repo/image");
        assert_eq!(r.tag(), Some("latest"));
        assert_eq!(r.to_string(), "docker.io/repo/image:latest");
    }

    #[test]
    fn test_explicit_tag_unchanged() {
        let r = normalize("repo/image:tag").unwrap();
        assert_eq!(r.tag(), Some("tag"));
        assert_eq!(r.to_string(), "docker.io/repo/image:tag");
    }

    #[test]
    fn test_digest_unchanged() {
        let r = normalize(&format!("repo/image@{DIGEST}")).unwrap();
        assert_eq!(r.tag(), None);
        assert_eq!(r.digest(), Some(DIGEST));
    }

    #[test]
    fn test_official_image_shorthand() {
        let r = normalize("nginx").unwrap();
        assert_eq!(r.repository(), "library/nginx");
        assert_eq!(r.tag(), Some("latest"));
    }

    #[test]
    fn test_private_registry_with_port() {
        let r = normalize("localhost:5000/team/app").unwrap();
        assert_eq!(r.registry(), "localhost:5000");
        assert_eq!(r.repository(), "team/app");
        assert_eq!(r.tag(), Some("latest"));
    }

    #[test]
    fn test_invalid_reference() {
        let err = normalize("not a valid reference!!!").unwrap_err();
        assert!(matches!(err, Error::InvalidReference(..)));
    }
}
