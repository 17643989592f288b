//! Backend service client and connectivity probe.
//!
//! # Responsibilities
//! - Build the authenticated HTTP client from resolved settings
//! - Run the minimal connectivity probe (one cheap read, no real data)
//!
//! # Design Decisions
//! - The probe reports outcomes, it does not classify them; classification
//!   belongs to the manager's rule table
//! - An auth-layer rejection (401/403) is a distinct outcome, not a failure:
//!   the transport and endpoint are demonstrably reachable

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use url::Url;

use crate::config::resolver::BackendSettings;

/// Header carrying the service key alongside the bearer token.
const API_KEY_HEADER: &str = "apikey";

/// Outcome of a connectivity probe that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The backend answered with a success status.
    Reachable,
    /// The backend answered, but its authorization layer rejected the
    /// credentials. Tolerated as non-fatal to initialization.
    AuthRejected(String),
}

/// A probe that did not produce a usable answer. The message feeds the
/// error classifier.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProbeFailure {
    pub message: String,
}

/// Failure while constructing the client, before any request is sent.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid service key: {0}")]
    Credential(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Authenticated client for the managed backend service.
///
/// Cheap to clone; the underlying `reqwest::Client` is reference-counted.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    probe_url: Url,
}

impl BackendClient {
    /// Build a client from resolved settings.
    ///
    /// `probe_path` is joined against the service URL; `probe_timeout`
    /// bounds every probe request (regular requests delegate timeouts to
    /// callers).
    pub fn build(
        settings: &BackendSettings,
        probe_path: &str,
        probe_timeout: Duration,
    ) -> Result<Self, BuildError> {
        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(&settings.service_key)
            .map_err(|e| BuildError::Credential(e.to_string()))?;
        headers.insert(API_KEY_HEADER, key_value);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", settings.service_key))
            .map_err(|e| BuildError::Credential(e.to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(probe_timeout)
            .build()?;

        let probe_url = settings.url.join(probe_path)?;

        Ok(Self {
            http,
            base_url: settings.url.clone(),
            probe_url,
        })
    }

    /// Run the minimal connectivity probe: one GET against the probe path.
    pub async fn probe(&self) -> Result<ProbeOutcome, ProbeFailure> {
        match self.http.get(self.probe_url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    Ok(ProbeOutcome::Reachable)
                } else if status.as_u16() == 401 || status.as_u16() == 403 {
                    Ok(ProbeOutcome::AuthRejected(format!(
                        "probe returned status {status}"
                    )))
                } else {
                    Err(ProbeFailure {
                        message: format!("probe returned status {status}"),
                    })
                }
            }
            Err(e) => Err(ProbeFailure {
                message: error_chain(&e),
            }),
        }
    }

    /// The underlying HTTP client, for collaborators that hold a ready client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Base URL of the backend service.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue a cheap read against a path relative to the base URL and
    /// return the HTTP status. Used by the access-audit probe.
    pub async fn read_status(&self, path: &str) -> Result<u16, ProbeFailure> {
        let url = self.base_url.join(path).map_err(|e| ProbeFailure {
            message: format!("invalid url: {e}"),
        })?;
        match self.http.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) => Err(ProbeFailure {
                message: error_chain(&e),
            }),
        }
    }
}

/// Flatten an error and its source chain into one classifiable message.
/// reqwest's Display alone often omits the interesting io-level cause.
fn error_chain(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
