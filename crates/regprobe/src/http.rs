//! Registry client over the registry HTTP API v2.
//!
//! Only the read path is implemented: manifest resolution with `HEAD`
//! (falling back to `GET`), manifest/blob fetches, and the token handshake
//! needed to get through a `401`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::TryStreamExt;
use oci_distribution::Reference;
use reqwest::header::{
    ACCEPT, AsHeaderName, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, WWW_AUTHENTICATE,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio_util::io::StreamReader;
use tracing::{debug, trace};

use crate::auth::{Challenge, ChallengeScheme, TokenResponse};
use crate::config::Config;
use crate::decode::{MAX_DOCUMENT_SIZE, MediaKind, SUPPORTED_MEDIA_TYPES};
use crate::reference::DEFAULT_TAG;
use crate::registry::{ByteStream, Descriptor, Fetcher, RegistryClient};
use crate::routing::{Credentials, HostPolicy};
use crate::{Error, Result};

/// Header carrying the canonical digest of a manifest.
pub const DIGEST_HEADER: &str = "Docker-Content-Digest";

const USER_AGENT: &str = concat!("regprobe/", env!("CARGO_PKG_VERSION"));

/// Internal failures carry only a message; the caller tags them.
type Attempt<T> = std::result::Result<T, String>;

/// Registry client speaking the registry HTTP API.
///
/// Tokens obtained from auth challenges are reused across calls for the same
/// endpoint, repository and username.
pub struct HttpRegistry {
    verified: Client,
    insecure: Client,
    tokens: Arc<DashMap<String, Authorization>>,
}

impl HttpRegistry {
    /// Create a client with the timeouts from `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let build = |skip_verify: bool| {
            Client::builder()
                .connect_timeout(config.connect_timeout)
                .timeout(config.request_timeout)
                .danger_accept_invalid_certs(skip_verify)
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
        };

        Ok(Self {
            verified: build(false)?,
            insecure: build(true)?,
            tokens: Arc::default(),
        })
    }

    fn session(&self, reference: &Reference, hosts: &HostPolicy) -> Result<Session> {
        let endpoint = hosts.endpoint(reference.registry())?;
        let client = if endpoint.skip_verify {
            self.insecure.clone()
        } else {
            self.verified.clone()
        };

        Ok(Session {
            client,
            base_url: endpoint.base_url(),
            repository: reference.repository().to_string(),
            credentials: hosts.credentials(reference.registry()).clone(),
            tokens: Arc::clone(&self.tokens),
        })
    }
}

impl fmt::Debug for HttpRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRegistry")
            .field("cached_tokens", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RegistryClient for HttpRegistry {
    async fn resolve(
        &self,
        reference: &Reference,
        hosts: &HostPolicy,
    ) -> Result<(Reference, Descriptor)> {
        let name = reference.to_string();
        let session = self.session(reference, hosts)?;
        let target = reference
            .digest()
            .or_else(|| reference.tag())
            .unwrap_or(DEFAULT_TAG);
        let url = session.manifest_url(target);
        let accept = SUPPORTED_MEDIA_TYPES.join(", ");
        debug!(%name, %url, "Resolving manifest");

        let descriptor = resolve_by_head(&session, reference, &url, &accept)
            .await
            .map_err(|e| Error::resolve(&name, e))?;

        debug!(
            %name,
            digest = %descriptor.digest,
            media_type = %descriptor.media_type,
            size = descriptor.size,
            "Resolved manifest"
        );
        Ok((reference.clone(), descriptor))
    }

    async fn fetcher(&self, name: &Reference, hosts: &HostPolicy) -> Result<Box<dyn Fetcher>> {
        Ok(Box::new(HttpFetcher {
            session: self.session(name, hosts)?,
        }))
    }
}

/// Fetcher bound to one repository on one endpoint.
struct HttpFetcher {
    session: Session,
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, descriptor: &Descriptor) -> Result<ByteStream> {
        let url = if MediaKind::classify(&descriptor.media_type).is_some() {
            self.session.manifest_url(&descriptor.digest)
        } else {
            self.session.blob_url(&descriptor.digest)
        };
        debug!(digest = %descriptor.digest, %url, "Fetching content");

        let response = self
            .session
            .send(Method::GET, &url, &descriptor.media_type)
            .await
            .and_then(|r| ensure_success(r, &url))
            .map_err(|e| Error::fetch(&descriptor.digest, e))?;

        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(body)))
    }
}

async fn resolve_by_head(
    session: &Session,
    reference: &Reference,
    url: &str,
    accept: &str,
) -> Attempt<Descriptor> {
    let response = session.send(Method::HEAD, url, accept).await?;
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        trace!(%url, "HEAD not allowed, falling back to GET");
        return resolve_by_get(session, reference, url, accept).await;
    }
    let response = ensure_success(response, url)?;

    let headers = response.headers();
    let media_type = header_value(headers, CONTENT_TYPE);
    let digest =
        header_value(headers, DIGEST_HEADER).or_else(|| reference.digest().map(str::to_string));

    match (media_type, digest) {
        (Some(media_type), Some(digest)) => {
            let size = header_value(headers, CONTENT_LENGTH)
                .and_then(|v| v.parse().ok())
                .unwrap_or_default();
            Ok(Descriptor::new(media_type, digest, size))
        }
        _ => {
            trace!(%url, "HEAD response lacks digest or media type, falling back to GET");
            resolve_by_get(session, reference, url, accept).await
        }
    }
}

async fn resolve_by_get(
    session: &Session,
    reference: &Reference,
    url: &str,
    accept: &str,
) -> Attempt<Descriptor> {
    let response = session
        .send(Method::GET, url, accept)
        .await
        .and_then(|r| ensure_success(r, url))?;

    let content_type = header_value(response.headers(), CONTENT_TYPE);
    let header_digest = header_value(response.headers(), DIGEST_HEADER);
    let body = response.bytes().await.map_err(|e| e.to_string())?;
    let size = body.len() as u64;
    if size > MAX_DOCUMENT_SIZE {
        return Err(format!("manifest exceeds {MAX_DOCUMENT_SIZE} bytes"));
    }

    // Some registries answer with a generic JSON content type; the document
    // itself usually names its media type.
    let media_type = content_type
        .clone()
        .filter(|m| MediaKind::classify(m).is_some())
        .or_else(|| embedded_media_type(&body))
        .or(content_type)
        .ok_or_else(|| "manifest response has no media type".to_string())?;

    let digest = header_digest
        .or_else(|| reference.digest().map(str::to_string))
        .unwrap_or_else(|| sha256_digest(&body));

    Ok(Descriptor::new(media_type, digest, size))
}

#[derive(Deserialize)]
struct MediaTypeProbe {
    #[serde(rename = "mediaType", default)]
    media_type: Option<String>,
}

fn embedded_media_type(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<MediaTypeProbe>(body)
        .ok()
        .and_then(|p| p.media_type)
        .filter(|m| !m.is_empty())
}

/// `sha256:<hex>` of `bytes`.
#[must_use]
pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

fn header_value<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn ensure_success(response: Response, url: &str) -> Attempt<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(format!("HTTP {status} from {url}"))
    }
}

#[derive(Clone)]
enum Authorization {
    Bearer(String),
    Basic,
}

/// Everything needed to talk to one repository on one endpoint.
#[derive(Clone)]
struct Session {
    client: Client,
    base_url: String,
    repository: String,
    credentials: Credentials,
    tokens: Arc<DashMap<String, Authorization>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("repository", &self.repository)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Session {
    fn manifest_url(&self, target: &str) -> String {
        format!("{}/v2/{}/manifests/{}", self.base_url, self.repository, target)
    }

    fn blob_url(&self, digest: &str) -> String {
        format!("{}/v2/{}/blobs/{}", self.base_url, self.repository, digest)
    }

    /// Tokens are only reused for the same endpoint, repository and
    /// credential pair.
    fn token_key(&self) -> String {
        let fingerprint = hex::encode(Sha256::digest(self.credentials.password().as_bytes()));
        format!(
            "{}/{}#{}:{}",
            self.base_url,
            self.repository,
            self.credentials.username(),
            &fingerprint[..16]
        )
    }

    /// Send a request, answering at most one auth challenge.
    async fn send(&self, method: Method, url: &str, accept: &str) -> Attempt<Response> {
        let cached = self
            .tokens
            .get(&self.token_key())
            .map(|entry| entry.value().clone());

        let response = self
            .request(method.clone(), url, accept, cached.as_ref())
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(Challenge::parse)
            .ok_or_else(|| format!("HTTP 401 from {url} without a supported challenge"))?;
        trace!(%url, scheme = ?challenge.scheme, "Answering auth challenge");

        let authorization = self.authorize(&challenge).await?;
        self.tokens.insert(self.token_key(), authorization.clone());

        self.request(method, url, accept, Some(&authorization))
            .send()
            .await
            .map_err(|e| e.to_string())
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        accept: &str,
        authorization: Option<&Authorization>,
    ) -> RequestBuilder {
        let builder = self.client.request(method, url).header(ACCEPT, accept);
        match authorization {
            Some(Authorization::Bearer(token)) => builder.bearer_auth(token),
            Some(Authorization::Basic) => builder.basic_auth(
                self.credentials.username(),
                Some(self.credentials.password()),
            ),
            None => builder,
        }
    }

    async fn authorize(&self, challenge: &Challenge) -> Attempt<Authorization> {
        match challenge.scheme {
            ChallengeScheme::Basic => {
                if self.credentials.is_anonymous() {
                    return Err("registry requires basic auth but no credentials were given".into());
                }
                Ok(Authorization::Basic)
            }
            ChallengeScheme::Bearer => {
                let realm = challenge.realm().ok_or("bearer challenge has no realm")?;
                let scope = challenge.scope().map_or_else(
                    || format!("repository:{}:pull", self.repository),
                    str::to_string,
                );
                let mut query = vec![("scope", scope)];
                if let Some(service) = challenge.service() {
                    query.push(("service", service.to_string()));
                }

                let mut request = self.client.get(realm).query(&query);
                if !self.credentials.is_anonymous() {
                    request = request.basic_auth(
                        self.credentials.username(),
                        Some(self.credentials.password()),
                    );
                }
                debug!(%realm, "Requesting registry token");

                let response = request.send().await.map_err(|e| e.to_string())?;
                let response = ensure_success(response, realm)?;
                let token: TokenResponse = response.json().await.map_err(|e| e.to_string())?;
                token
                    .into_token()
                    .map(Authorization::Bearer)
                    .ok_or_else(|| format!("token endpoint {realm} returned no token"))
            }
        }
    }
}
