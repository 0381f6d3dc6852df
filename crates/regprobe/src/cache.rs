//! Content-addressed cache of decoded manifests and indexes.
//!
//! Entries are keyed by the digest of the document that was fetched. Since a
//! digest always names the same bytes, an entry is valid forever:
//! - no invalidation or eviction
//! - first writer wins, later writes for the same key are ignored
//! - references that resolve to the same digest share one entry
//!
//! Empty values are never stored, so a bad fetch cannot poison a key.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::trace;

/// Process-wide cache used by [`Inspector`](crate::Inspector) unless another
/// one is injected.
static SHARED: OnceLock<Arc<DigestCache>> = OnceLock::new();

/// Digest-keyed cache of image ids and index children.
#[derive(Debug, Default)]
pub struct DigestCache {
    config_digest_by_manifest_digest: DashMap<String, String>,
    child_digests_by_index_digest: DashMap<String, Vec<String>>,
}

impl DigestCache {
    /// Create an empty, private cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Cached config digest for a manifest digest.
    #[must_use]
    pub fn image_id(&self, manifest_digest: &str) -> Option<String> {
        let hit = self
            .config_digest_by_manifest_digest
            .get(manifest_digest)
            .map(|entry| entry.value().clone());
        trace!(manifest_digest, hit = hit.is_some(), "Image id cache lookup");
        hit
    }

    /// Remember the config digest of a manifest. Empty ids are ignored.
    pub fn store_image_id(&self, manifest_digest: &str, image_id: &str) {
        if image_id.is_empty() {
            return;
        }
        self.config_digest_by_manifest_digest
            .entry(manifest_digest.to_string())
            .or_insert_with(|| image_id.to_string());
    }

    /// Cached child manifest digests for an index digest.
    #[must_use]
    pub fn child_digests(&self, index_digest: &str) -> Option<Vec<String>> {
        let hit = self
            .child_digests_by_index_digest
            .get(index_digest)
            .map(|entry| entry.value().clone());
        trace!(index_digest, hit = hit.is_some(), "Index cache lookup");
        hit
    }

    /// Remember the children of an index. Empty lists are ignored.
    pub fn store_child_digests(&self, index_digest: &str, digests: &[String]) {
        if digests.is_empty() {
            return;
        }
        self.child_digests_by_index_digest
            .entry(index_digest.to_string())
            .or_insert_with(|| digests.to_vec());
    }

    /// Total number of cached entries across both maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.config_digest_by_manifest_digest.len() + self.child_digests_by_index_digest.len()
    }

    /// Whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
