//! Environment-driven configuration.

use std::time::Duration;

use crate::{Error, Result};

/// Environment variable naming a mirror/proxy for the public Docker Hub.
pub const DOCKERHUB_PUBLIC_PROXY_ENV: &str = "DOCKERHUB_PUBLIC_PROXY";

/// Environment variable overriding the connect timeout, in seconds.
pub const CONNECT_TIMEOUT_ENV: &str = "REGPROBE_CONNECT_TIMEOUT_SECS";

/// Environment variable overriding the per-request timeout, in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "REGPROBE_TIMEOUT_SECS";

/// Configuration for registry inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Raw proxy URL substituted for `docker.io`.
    ///
    /// Kept unparsed: a malformed value only fails the resolutions that
    /// actually need it.
    pub docker_hub_proxy: Option<String>,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout, including reading the body.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_hub_proxy: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Unset or empty variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(proxy) = non_empty_var(DOCKERHUB_PUBLIC_PROXY_ENV) {
            config.docker_hub_proxy = Some(proxy);
        }
        if let Some(secs) = non_empty_var(CONNECT_TIMEOUT_ENV) {
            config.connect_timeout = parse_secs(CONNECT_TIMEOUT_ENV, &secs)?;
        }
        if let Some(secs) = non_empty_var(REQUEST_TIMEOUT_ENV) {
            config.request_timeout = parse_secs(REQUEST_TIMEOUT_ENV, &secs)?;
        }

        Ok(config)
    }

    /// Set the Docker Hub proxy.
    #[must_use]
    pub fn with_docker_hub_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.docker_hub_proxy = Some(proxy.into());
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_secs(name: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| Error::Config(format!("{name}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.docker_hub_proxy.is_none());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_from_env_unset() {
        temp_env::with_vars_unset(
            [
                DOCKERHUB_PUBLIC_PROXY_ENV,
                CONNECT_TIMEOUT_ENV,
                REQUEST_TIMEOUT_ENV,
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config, Config::default());
            },
        );
    }

    #[test]
    fn test_from_env_proxy_and_timeouts() {
        temp_env::with_vars(
            [
                (DOCKERHUB_PUBLIC_PROXY_ENV, Some("http://mirror.example:5000")),
                (CONNECT_TIMEOUT_ENV, Some("3")),
                (REQUEST_TIMEOUT_ENV, Some(" 30 ")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(
                    config.docker_hub_proxy.as_deref(),
                    Some("http://mirror.example:5000")
                );
                assert_eq!(config.connect_timeout, Duration::from_secs(3));
                assert_eq!(config.request_timeout, Duration::from_secs(30));
            },
        );
    }

    #[test]
    fn test_from_env_empty_proxy_is_absent() {
        temp_env::with_var(DOCKERHUB_PUBLIC_PROXY_ENV, Some(""), || {
            let config = Config::from_env().unwrap();
            assert!(config.docker_hub_proxy.is_none());
        });
    }

    #[test]
    fn test_from_env_invalid_timeout() {
        temp_env::with_var(REQUEST_TIMEOUT_ENV, Some("soon"), || {
            let err = Config::from_env().unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            assert!(err.to_string().contains(REQUEST_TIMEOUT_ENV));
        });
    }

    #[test]
    fn test_malformed_proxy_is_kept_raw() {
        temp_env::with_var(DOCKERHUB_PUBLIC_PROXY_ENV, Some("::not a url"), || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.docker_hub_proxy.as_deref(), Some("::not a url"));
        });
    }
}
