//! `WWW-Authenticate` challenge parsing and token exchange types.

use std::collections::HashMap;

use http_auth::{ChallengeRef, parser::ChallengeParser};
use serde::Deserialize;

/// Authentication scheme requested by a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeScheme {
    /// Token auth: fetch a bearer token from `realm`.
    Bearer,
    /// HTTP basic auth with the static credentials.
    Basic,
}

/// A parsed `WWW-Authenticate` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Requested scheme.
    pub scheme: ChallengeScheme,
    /// Challenge parameters, keys lowercased.
    pub params: HashMap<String, String>,
}

impl Challenge {
    /// Parse a header value and return the first `Bearer` or `Basic`
    /// challenge in it. Other schemes are skipped.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        ChallengeParser::new(header)
            .filter_map(std::result::Result::ok)
            .find_map(|challenge| Self::try_from(&challenge).ok())
    }

    /// The token endpoint of a bearer challenge.
    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.params.get("realm").map(String::as_str)
    }

    /// The `service` parameter.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.params.get("service").map(String::as_str)
    }

    /// The `scope` parameter.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.params.get("scope").map(String::as_str)
    }
}

impl TryFrom<&ChallengeRef<'_>> for Challenge {
    type Error = String;

    fn try_from(value: &ChallengeRef<'_>) -> std::result::Result<Self, Self::Error> {
        let scheme = if value.scheme.eq_ignore_ascii_case("bearer") {
            ChallengeScheme::Bearer
        } else if value.scheme.eq_ignore_ascii_case("basic") {
            ChallengeScheme::Basic
        } else {
            return Err(format!("unsupported challenge scheme {:?}", value.scheme));
        };

        let mut params = HashMap::new();
        for (k, v) in &value.params {
            params.insert(k.to_ascii_lowercase(), v.to_unescaped());
        }

        Ok(Self { scheme, params })
    }
}

/// Body returned by a token endpoint.
///
/// Registries disagree on the field name; `token` wins when both are set.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_token(self) -> Option<String> {
        self.token
            .filter(|t| !t.is_empty())
            .or(self.access_token)
            .filter(|t| !t.is_empty())
    }
}
