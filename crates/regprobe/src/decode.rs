//! Manifest and index decoding.
//!
//! Only the four schema-2 media types are understood: a Docker and an OCI
//! flavour each of the single-platform manifest and the multi-platform
//! index. Anything else must be rejected before it is fetched.

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Error, Result};

/// Docker schema 2 image manifest.
pub const DOCKER_MANIFEST_MEDIA_TYPE: &str = oci_distribution::manifest::IMAGE_MANIFEST_MEDIA_TYPE;

/// OCI image manifest.
pub const OCI_MANIFEST_MEDIA_TYPE: &str = oci_distribution::manifest::OCI_IMAGE_MEDIA_TYPE;

/// Docker schema 2 manifest list.
pub const DOCKER_MANIFEST_LIST_MEDIA_TYPE: &str =
    oci_distribution::manifest::IMAGE_MANIFEST_LIST_MEDIA_TYPE;

/// OCI image index.
pub const OCI_INDEX_MEDIA_TYPE: &str = oci_distribution::manifest::OCI_IMAGE_INDEX_MEDIA_TYPE;

/// Every media type this crate can decode, in `Accept` header order.
pub const SUPPORTED_MEDIA_TYPES: [&str; 4] = [
    DOCKER_MANIFEST_MEDIA_TYPE,
    OCI_MANIFEST_MEDIA_TYPE,
    DOCKER_MANIFEST_LIST_MEDIA_TYPE,
    OCI_INDEX_MEDIA_TYPE,
];

/// Largest document the decoder will read.
pub const MAX_DOCUMENT_SIZE: u64 = 4 << 20;

/// What a media type says about the document behind a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// A single-platform image manifest.
    Manifest,
    /// A multi-platform manifest list or image index.
    Index,
}

impl MediaKind {
    /// Classify a media type. Parameters such as `; charset=utf-8` are
    /// ignored.
    #[must_use]
    pub fn classify(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();

        if essence == DOCKER_MANIFEST_MEDIA_TYPE || essence == OCI_MANIFEST_MEDIA_TYPE {
            Some(Self::Manifest)
        } else if essence == DOCKER_MANIFEST_LIST_MEDIA_TYPE || essence == OCI_INDEX_MEDIA_TYPE {
            Some(Self::Index)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    #[serde(default)]
    config: Option<DigestField>,
}

#[derive(Debug, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    manifests: Option<Vec<DigestField>>,
}

#[derive(Debug, Deserialize)]
struct DigestField {
    #[serde(default)]
    digest: Option<String>,
}

/// Read a manifest and return its config digest (the image id).
///
/// A missing or empty `config.digest` is a decode failure.
pub async fn decode_manifest<R: AsyncRead + Unpin>(reader: R) -> Result<String> {
    let body = read_document(reader).await?;
    let manifest: ManifestDocument = serde_json::from_slice(&body)?;

    manifest
        .config
        .and_then(|c| c.digest)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| Error::Decode("manifest has no config digest".to_string()))
}

/// Read an index and return its child manifest digests in document order.
///
/// Entries without a digest are skipped. Duplicates are kept.
pub async fn decode_index<R: AsyncRead + Unpin>(reader: R) -> Result<Vec<String>> {
    let body = read_document(reader).await?;
    let index: IndexDocument = serde_json::from_slice(&body)?;

    Ok(index
        .manifests
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| m.digest)
        .filter(|d| !d.is_empty())
        .collect())
}

async fn read_document<R: AsyncRead + Unpin>(reader: R) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader
        .take(MAX_DOCUMENT_SIZE + 1)
        .read_to_end(&mut body)
        .await
        .map_err(|e| Error::Decode(format!("failed to read document: {e}")))?;

    if body.len() as u64 > MAX_DOCUMENT_SIZE {
        return Err(Error::Decode(format!(
            "document exceeds {MAX_DOCUMENT_SIZE} bytes"
        )));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_manifest_types() {
        assert_eq!(
            MediaKind::classify(DOCKER_MANIFEST_MEDIA_TYPE),
            Some(MediaKind::Manifest)
        );
        assert_eq!(
            MediaKind::classify("application/vnd.oci.image.manifest.v1+json"),
            Some(MediaKind::Manifest)
        );
    }

    #[test]
    fn test_classify_index_types() {
        assert_eq!(
            MediaKind::classify("application/vnd.docker.distribution.manifest.list.v2+json"),
            Some(MediaKind::Index)
        );
        assert_eq!(
            MediaKind::classify(OCI_INDEX_MEDIA_TYPE),
            Some(MediaKind::Index)
        );
    }

    #[test]
    fn test_classify_ignores_parameters() {
        assert_eq!(
            MediaKind::classify("application/vnd.oci.image.index.v1+json; charset=utf-8"),
            Some(MediaKind::Index)
        );
    }

    #[test]
    fn test_classify_rejects_others() {
        assert_eq!(
            MediaKind::classify("application/vnd.docker.distribution.manifest.v1+prettyjws"),
            None
        );
        assert_eq!(MediaKind::classify("application/json"), None);
        assert_eq!(MediaKind::classify(""), None);
    }

    #[tokio::test]
    async fn test_decode_manifest_config_digest() {
        let doc = br#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "config": {
                "mediaType": "application/vnd.docker.container.image.v1+json",
                "size": 1469,
                "digest": "sha256:config"
            },
            "layers": []
        }"#;
        let id = decode_manifest(&doc[..]).await.unwrap();
        assert_eq!(id, "sha256:config");
    }

    #[tokio::test]
    async fn test_decode_manifest_missing_config() {
        let err = decode_manifest(&br#"{"schemaVersion": 2}"#[..])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_decode_manifest_empty_digest() {
        let err = decode_manifest(&br#"{"config": {"digest": ""}}"#[..])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_decode_manifest_invalid_json() {
        let err = decode_manifest(&b"<html>rate limited</html>"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_decode_index_preserves_order_and_duplicates() {
        let doc = br#"{
            "schemaVersion": 2,
            "manifests": [
                {"digest": "sha256:amd64", "platform": {"os": "linux", "architecture": "amd64"}},
                {"digest": "", "platform": {"os": "linux", "architecture": "arm"}},
                {"digest": "sha256:arm64"},
                {"mediaType": "application/vnd.oci.image.manifest.v1+json"},
                {"digest": "sha256:amd64"}
            ]
        }"#;
        let digests = decode_index(&doc[..]).await.unwrap();
        assert_eq!(digests, vec!["sha256:amd64", "sha256:arm64", "sha256:amd64"]);
    }

    #[tokio::test]
    async fn test_decode_index_without_manifests() {
        let digests = decode_index(&br#"{"schemaVersion": 2}"#[..]).await.unwrap();
        assert!(digests.is_empty());

        let digests = decode_index(&br#"{"manifests": null}"#[..]).await.unwrap();
        assert!(digests.is_empty());
    }

    #[tokio::test]
    async fn test_decode_rejects_oversized_document() {
        let mut doc = br#"{"manifests": [], "padding": ""#.to_vec();
        doc.resize(usize::try_from(MAX_DOCUMENT_SIZE).unwrap() + 16, b'a');
        let err = decode_index(&doc[..]).await.unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
