//! Best-effort, read-only inspection of container image registries.
//!
//! This crate answers two questions about an image reference:
//! - which image id (config digest) a single-platform reference points at
//! - which per-platform manifest digests a manifest list / image index holds
//!
//! It is meant as a fast "is the remote already up to date?" check in front
//! of an authoritative push. Every failure is reported as an empty result,
//! and decoded documents are cached by digest for the life of the process.
//!
//! # Example
//!
//! ```ignore
//! use regprobe::Inspector;
//!
//! let inspector = Inspector::from_env()?;
//!
//! let id = inspector.image_id("nginx:1.25-alpine", "", "").await;
//! if id.is_empty() {
//!     // inconclusive: push
//! }
//!
//! let platforms = inspector.manifest_list_digests("nginx:1.25-alpine", "", "").await;
//! ```

#![warn(missing_docs)]

mod auth;
mod cache;
mod config;
mod decode;
mod error;
mod http;
mod inspect;
mod reference;
mod registry;
mod routing;

pub use auth::{Challenge, ChallengeScheme};
pub use cache::DigestCache;
pub use config::{CONNECT_TIMEOUT_ENV, Config, DOCKERHUB_PUBLIC_PROXY_ENV, REQUEST_TIMEOUT_ENV};
pub use decode::{
    DOCKER_MANIFEST_LIST_MEDIA_TYPE, DOCKER_MANIFEST_MEDIA_TYPE, MAX_DOCUMENT_SIZE, MediaKind,
    OCI_INDEX_MEDIA_TYPE, OCI_MANIFEST_MEDIA_TYPE, SUPPORTED_MEDIA_TYPES, decode_index,
    decode_manifest,
};
pub use error::{Error, Result};
pub use http::{DIGEST_HEADER, HttpRegistry, sha256_digest};
pub use inspect::Inspector;
pub use oci_distribution::Reference;
pub use reference::{DEFAULT_TAG, normalize};
pub use registry::{ByteStream, Descriptor, Fetcher, RegistryClient};
pub use routing::{
    Credentials, DOCKER_HUB_API_HOST, DOCKER_HUB_HOST, Endpoint, HostPolicy, Scheme,
};
