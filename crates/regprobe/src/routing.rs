//! Per-host routing, TLS and credential policy.
//!
//! A [`HostPolicy`] is built for every inspection call. It answers three
//! questions for any registry host the client contacts:
//! - which physical host (and scheme) to connect to
//! - whether certificate verification applies
//! - which credentials to present

use std::fmt;
use std::net::IpAddr;

use http::Uri;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Host name the reference parser assigns to Docker Hub images.
pub const DOCKER_HUB_HOST: &str = "docker.io";

/// API endpoint serving Docker Hub's registry protocol.
pub const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

/// A static username/password pair.
///
/// Both fields empty means anonymous access.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// Create credentials from a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Anonymous credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new("", "")
    }

    /// The username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Expose the password for an outgoing request.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Whether no credentials were supplied.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.password.expose_secret().is_empty()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// URL scheme used to reach a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// The scheme as it appears in a URL.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to physically send requests for a registry host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `host[:port]` to connect to.
    pub host: String,
    /// Scheme to use.
    pub scheme: Scheme,
    /// Skip TLS certificate verification.
    pub skip_verify: bool,
}

impl Endpoint {
    /// `scheme://host[:port]`, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// Routing and credential policy for one inspection call.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    credentials: Credentials,
    docker_hub_proxy: Option<String>,
    skip_verify: bool,
}

impl HostPolicy {
    /// Build a policy from the caller's credentials and the configured
    /// Docker Hub proxy.
    ///
    /// Certificate verification is skipped by default: this is a best-effort
    /// check against arbitrary, often self-signed, registries.
    #[must_use]
    pub fn new(credentials: Credentials, docker_hub_proxy: Option<String>) -> Self {
        Self {
            credentials,
            docker_hub_proxy,
            skip_verify: true,
        }
    }

    /// Override certificate verification.
    #[must_use]
    pub fn with_skip_verify(mut self, skip_verify: bool) -> Self {
        self.skip_verify = skip_verify;
        self
    }

    /// Credentials for `host`.
    ///
    /// The same pair is returned for every host, whether or not it belongs
    /// to the registry the caller had in mind.
    #[must_use]
    pub fn credentials(&self, _host: &str) -> &Credentials {
        &self.credentials
    }

    /// Whether TLS certificate verification is skipped.
    #[must_use]
    pub fn skip_verify(&self) -> bool {
        self.skip_verify
    }

    /// Apply the host override: `docker.io` maps to the configured proxy's
    /// `host[:port]`, every other host maps to itself.
    ///
    /// The proxy URL's scheme is not carried over.
    pub fn route(&self, host: &str) -> Result<String> {
        if host != DOCKER_HUB_HOST {
            return Ok(host.to_string());
        }
        let Some(proxy) = self.docker_hub_proxy.as_deref() else {
            return Ok(host.to_string());
        };

        let uri: Uri = proxy
            .parse()
            .map_err(|e| Error::RoutingConfig(format!("invalid proxy URL '{proxy}': {e}")))?;
        let authority = uri
            .authority()
            .filter(|a| uri.scheme().is_some() && !a.host().is_empty())
            .ok_or_else(|| Error::RoutingConfig(format!("proxy URL '{proxy}' has no host")))?;

        // The port is kept as written, even when it is the scheme's default.
        Ok(match authority.port() {
            Some(port) => format!("{}:{}", authority.host(), port.as_str()),
            None => authority.host().to_string(),
        })
    }

    /// Resolve the physical endpoint for `host`.
    pub fn endpoint(&self, host: &str) -> Result<Endpoint> {
        let routed = self.route(host)?;
        let host = if routed == DOCKER_HUB_HOST {
            DOCKER_HUB_API_HOST.to_string()
        } else {
            routed
        };
        let scheme = if is_loopback(&host) {
            Scheme::Http
        } else {
            Scheme::Https
        };

        Ok(Endpoint {
            host,
            scheme,
            skip_verify: self.skip_verify,
        })
    }
}

/// Whether `authority` (`host[:port]`) names the local machine.
fn is_loopback(authority: &str) -> bool {
    let host = strip_port(authority);
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

fn strip_port(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(ip, _)| ip);
    }
    match authority.rsplit_once(':') {
        // Bare IPv6 literals contain several colons and no port.
        Some((host, _)) if !host.contains(':') => host,
        _ => authority,
    }
}
