//! The two inspection operations and their soft-failure contract.
//!
//! Both operations answer "what is on the registry right now?" on a best
//! effort basis. Any failure (bad reference, routing, resolve, unexpected
//! media type, fetch, decode) yields an empty result, which callers treat as
//! "not known to be up to date".

use std::fmt;
use std::sync::Arc;

use oci_distribution::Reference;
use tracing::{debug, trace};

use crate::cache::DigestCache;
use crate::config::Config;
use crate::decode::{MediaKind, decode_index, decode_manifest};
use crate::http::HttpRegistry;
use crate::reference::normalize;
use crate::registry::{Descriptor, RegistryClient};
use crate::routing::{Credentials, HostPolicy};
use crate::{Error, Result};

/// Read-only registry inspector.
///
/// Cheap to clone; clones share the registry client and digest cache.
#[derive(Clone)]
pub struct Inspector {
    client: Arc<dyn RegistryClient>,
    cache: Arc<DigestCache>,
    config: Config,
}

impl Inspector {
    /// Create an inspector backed by [`HttpRegistry`] and the process-wide
    /// digest cache.
    pub fn new(config: Config) -> Result<Self> {
        let client = HttpRegistry::new(&config)?;
        Ok(Self::with_client(Arc::new(client), config))
    }

    /// Create an inspector from [`Config::from_env`].
    ///
    /// The environment, `DOCKERHUB_PUBLIC_PROXY` included, is read once here.
    /// Later changes to it do not affect this inspector; build a new one to
    /// pick them up.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    /// Create an inspector over any registry client, using the process-wide
    /// digest cache.
    #[must_use]
    pub fn with_client(client: Arc<dyn RegistryClient>, config: Config) -> Self {
        Self {
            client,
            cache: DigestCache::shared(),
            config,
        }
    }

    /// Replace the digest cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<DigestCache>) -> Self {
        self.cache = cache;
        self
    }

    /// The digest cache in use.
    #[must_use]
    pub fn cache(&self) -> &Arc<DigestCache> {
        &self.cache
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Image id (config digest) of a single-platform image.
    ///
    /// Returns an empty string when inconclusive. A reference that resolves
    /// to a manifest list is inconclusive too; it is never unwrapped.
    pub async fn image_id(&self, image: &str, username: &str, password: &str) -> String {
        let credentials = Credentials::new(username, password);
        match self.try_image_id(image, credentials).await {
            Ok(id) => id,
            Err(e) => {
                debug!(image, kind = e.kind(), error = %e, "Image id inconclusive");
                String::new()
            }
        }
    }

    /// Per-platform manifest digests behind a reference, in published order.
    ///
    /// A single-platform reference yields its own manifest digest as the only
    /// element. Returns an empty list when inconclusive.
    pub async fn manifest_list_digests(
        &self,
        image: &str,
        username: &str,
        password: &str,
    ) -> Vec<String> {
        let credentials = Credentials::new(username, password);
        match self.try_manifest_list_digests(image, credentials).await {
            Ok(digests) => digests,
            Err(e) => {
                debug!(image, kind = e.kind(), error = %e, "Manifest list inconclusive");
                Vec::new()
            }
        }
    }

    async fn try_image_id(&self, image: &str, credentials: Credentials) -> Result<String> {
        let (name, descriptor, hosts) = self.resolve(image, credentials).await?;

        if MediaKind::classify(&descriptor.media_type) != Some(MediaKind::Manifest) {
            return Err(Error::unsupported_media_type(
                descriptor.media_type,
                descriptor.digest,
            ));
        }

        if let Some(id) = self.cache.image_id(&descriptor.digest) {
            trace!(image, digest = %descriptor.digest, "Image id served from cache");
            return Ok(id);
        }

        let fetcher = self.client.fetcher(&name, &hosts).await?;
        let stream = fetcher.fetch(&descriptor).await?;
        let id = decode_manifest(stream).await?;

        self.cache.store_image_id(&descriptor.digest, &id);
        debug!(image, digest = %descriptor.digest, image_id = %id, "Resolved image id");
        Ok(id)
    }

    async fn try_manifest_list_digests(
        &self,
        image: &str,
        credentials: Credentials,
    ) -> Result<Vec<String>> {
        let (name, descriptor, hosts) = self.resolve(image, credentials).await?;

        match MediaKind::classify(&descriptor.media_type) {
            Some(MediaKind::Manifest) => return Ok(vec![descriptor.digest]),
            Some(MediaKind::Index) => {}
            None => {
                return Err(Error::unsupported_media_type(
                    descriptor.media_type,
                    descriptor.digest,
                ));
            }
        }

        if let Some(digests) = self.cache.child_digests(&descriptor.digest) {
            trace!(image, digest = %descriptor.digest, "Manifest list served from cache");
            return Ok(digests);
        }

        let fetcher = self.client.fetcher(&name, &hosts).await?;
        let stream = fetcher.fetch(&descriptor).await?;
        let digests = decode_index(stream).await?;

        self.cache.store_child_digests(&descriptor.digest, &digests);
        debug!(
            image,
            digest = %descriptor.digest,
            count = digests.len(),
            "Resolved manifest list"
        );
        Ok(digests)
    }

    async fn resolve(
        &self,
        image: &str,
        credentials: Credentials,
    ) -> Result<(Reference, Descriptor, HostPolicy)> {
        let reference = normalize(image)?;
        let hosts = HostPolicy::new(credentials, self.config.docker_hub_proxy.clone());
        let (name, descriptor) = self.client.resolve(&reference, &hosts).await?;
        Ok((name, descriptor, hosts))
    }
}

impl fmt::Debug for Inspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inspector")
            .field("cache_entries", &self.cache.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
