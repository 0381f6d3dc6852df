//! Error types for registry inspection.
//!
//! None of these cross the [`Inspector`](crate::Inspector) boundary: every
//! variant is collapsed into an inconclusive (empty) result there. They exist
//! so the failure that caused the collapse can be logged.

use thiserror::Error;

/// Result type for registry inspection internals.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while inspecting a registry.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse image reference.
    #[error("Invalid image reference '{0}': {1}")]
    InvalidReference(String, String),

    /// The host routing configuration is unusable.
    #[error("Invalid routing configuration: {0}")]
    RoutingConfig(String),

    /// Resolving the reference failed (network, not found or auth).
    #[error("Failed to resolve '{reference}': {message}")]
    Resolve {
        /// The reference being resolved.
        reference: String,
        /// Error message.
        message: String,
    },

    /// The resolved content has a media type this operation does not handle.
    #[error("Unsupported media type '{media_type}' for {digest}")]
    UnsupportedMediaType {
        /// The declared media type.
        media_type: String,
        /// The descriptor digest.
        digest: String,
    },

    /// Opening or reading the content stream failed.
    #[error("Failed to fetch {digest}: {message}")]
    Fetch {
        /// The descriptor digest.
        digest: String,
        /// Error message.
        message: String,
    },

    /// The fetched document could not be interpreted.
    #[error("Failed to decode document: {0}")]
    Decode(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid reference error.
    #[must_use]
    pub fn invalid_reference(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidReference(reference.into(), message.into())
    }

    /// Create a resolve error.
    #[must_use]
    pub fn resolve(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported media type error.
    #[must_use]
    pub fn unsupported_media_type(media_type: impl Into<String>, digest: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            media_type: media_type.into(),
            digest: digest.into(),
        }
    }

    /// Create a fetch error.
    #[must_use]
    pub fn fetch(digest: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            digest: digest.into(),
            message: message.into(),
        }
    }

    /// Short machine-friendly name of the failure stage, used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidReference(..) => "invalid_reference",
            Self::RoutingConfig(_) => "routing_config",
            Self::Resolve { .. } => "resolve",
            Self::UnsupportedMediaType { .. } => "unsupported_media_type",
            Self::Fetch { .. } => "fetch",
            Self::Decode(_) => "decode",
            Self::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
