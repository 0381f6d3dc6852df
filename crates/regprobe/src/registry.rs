//! Registry client contract.
//!
//! The inspection operations only need three things from a registry:
//! resolving a reference to a descriptor, binding a fetcher to the resolved
//! name, and streaming a descriptor's bytes. [`HttpRegistry`](crate::HttpRegistry)
//! implements them over the registry HTTP API; tests substitute their own.

use std::pin::Pin;

use async_trait::async_trait;
use oci_distribution::Reference;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::Result;
use crate::routing::HostPolicy;

/// A readable document body. Dropping it releases the underlying connection.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Content-addressed pointer to registry content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced document.
    pub media_type: String,
    /// Digest of the referenced bytes, `<algorithm>:<hex>`.
    pub digest: String,
    /// Size of the referenced bytes.
    #[serde(default)]
    pub size: u64,
}

impl Descriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(media_type: impl Into<String>, digest: impl Into<String>, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest: digest.into(),
            size,
        }
    }
}

/// Resolves references against a registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Resolve `reference` to its canonical name and top-level descriptor.
    ///
    /// Not-found, auth and network failures are all reported the same way.
    async fn resolve(
        &self,
        reference: &Reference,
        hosts: &HostPolicy,
    ) -> Result<(Reference, Descriptor)>;

    /// Bind a fetcher to a name returned by [`RegistryClient::resolve`].
    async fn fetcher(&self, name: &Reference, hosts: &HostPolicy) -> Result<Box<dyn Fetcher>>;
}

/// Opens content streams for descriptors of one repository.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Open a stream over the bytes `descriptor` points to.
    async fn fetch(&self, descriptor: &Descriptor) -> Result<ByteStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_wire_format() {
        let json = r#"{
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "digest": "sha256:abc",
            "size": 527,
            "platform": {"architecture": "amd64", "os": "linux"}
        }"#;
        let d: Descriptor = serde_json::from_str(json).unwrap();
        assert_eq!(
            d,
            Descriptor::new("application/vnd.oci.image.manifest.v1+json", "sha256:abc", 527)
        );
    }

    #[test]
    fn test_descriptor_equality_is_by_value() {
        let a = Descriptor::new("m", "sha256:abc", 1);
        assert_eq!(a.clone(), a);
        assert_ne!(a, Descriptor::new("m", "sha256:def", 1));
    }
}
