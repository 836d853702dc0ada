// src/repository/client.rs

//! Authenticated HTTP transport for chart repositories
//!
//! A [`TransportResolver`] turns a Source's credentials into a
//! [`FetchClient`]. Credentials are passed through to the transport as-is;
//! nothing here validates or rotates them.

use crate::error::{Error, Result};
use crate::model::SourceSpec;
use reqwest::blocking::Client;
use std::fs;
use std::time::Duration;
use tracing::debug;

/// Default timeout for HTTP requests (30 seconds)
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-source transport credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// PEM client certificate, paired with `key_file`
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    /// PEM bundle of additional trusted roots
    pub ca_file: Option<String>,
}

impl Credentials {
    pub fn from_spec(spec: &SourceSpec) -> Self {
        fn non_empty(v: &Option<String>) -> Option<String> {
            v.as_ref().filter(|s| !s.is_empty()).cloned()
        }

        Self {
            username: non_empty(&spec.username),
            password: spec.password.clone(),
            cert_file: non_empty(&spec.cert_file),
            key_file: non_empty(&spec.key_file),
            ca_file: non_empty(&spec.ca_file),
        }
    }
}

/// Something that can GET a URL and hand back the body
pub trait FetchClient: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Builds a [`FetchClient`] bound to one repository's credentials
pub trait TransportResolver: Send + Sync {
    fn resolve(&self, repo_url: &str, credentials: &Credentials) -> Result<Box<dyn FetchClient>>;
}

/// Resolver producing blocking reqwest clients
#[derive(Debug, Clone)]
pub struct HttpResolver {
    timeout: Duration,
}

impl HttpResolver {
    pub fn new() -> Self {
        Self { timeout: HTTP_TIMEOUT }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn read_pem(path: &str, what: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::FetchError(format!("could not read {what} file {path}: {e}")))
}

impl TransportResolver for HttpResolver {
    fn resolve(&self, repo_url: &str, credentials: &Credentials) -> Result<Box<dyn FetchClient>> {
        url::Url::parse(repo_url)
            .map_err(|e| Error::FetchError(format!("invalid chart URL format: {repo_url}: {e}")))?;

        let mut builder = Client::builder().timeout(self.timeout);

        match (&credentials.cert_file, &credentials.key_file) {
            (Some(cert), Some(key)) => {
                let mut pem = read_pem(key, "key")?;
                pem.push(b'\n');
                pem.extend(read_pem(cert, "certificate")?);
                let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                    Error::FetchError(format!("invalid client certificate {cert}: {e}"))
                })?;
                builder = builder.identity(identity);
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(Error::FetchError(
                    "client certificate and key must be configured together".to_string(),
                ));
            }
            (None, None) => {}
        }

        if let Some(ca) = &credentials.ca_file {
            let bundle = read_pem(ca, "CA")?;
            let certificate = reqwest::Certificate::from_pem(&bundle)
                .map_err(|e| Error::FetchError(format!("invalid CA bundle {ca}: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder
            .build()
            .map_err(|e| Error::FetchError(format!("failed to create HTTP client: {e}")))?;

        debug!(
            "Resolved transport for {} (basic auth: {}, client cert: {})",
            repo_url,
            credentials.username.is_some(),
            credentials.cert_file.is_some()
        );

        Ok(Box::new(HttpFetchClient {
            client,
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        }))
    }
}

/// Blocking HTTP client carrying optional basic auth
pub struct HttpFetchClient {
    client: Client,
    username: Option<String>,
    password: Option<String>,
}

impl FetchClient for HttpFetchClient {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_ref());
        }

        let response = request
            .send()
            .map_err(|e| Error::FetchError(format!("failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::FetchError(format!(
                "failed to fetch {} : {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::FetchError(format!("failed to read response from {url}: {e}")))?;

        Ok(bytes.to_vec())
    }
}
