//! HTTP transport for the NVCF REST API.
//!
//! Every request carries the bearer token and JSON content type. Responses with
//! a status outside the caller's allow-set are turned into [`ProviderError`]s,
//! decoding whichever of the backend's error envelopes is present.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::models::{DetailEnvelope, RequestStatusEnvelope};

/// Client for the NVCF REST API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct NvcfClient {
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for NvcfClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NvcfClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl NvcfClient {
    /// Build a client for the org and team of a resolved configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(config.nvcf_base_url(), &config.ngc_api_key)
    }

    /// Build a client against an explicit base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: &str,
    ) -> Result<Self, ProviderError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
            ProviderError::Configuration("ngc_api_key contains invalid characters".to_string())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// The base URL all request paths are appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and decode the JSON response body.
    pub async fn send_request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        expected: &[StatusCode],
    ) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (status, text) = self.execute(method, path, body, expected).await?;
        serde_json::from_str(&text).map_err(|e| {
            error!(%status, error = %e, "failed to decode NVCF response");
            ProviderError::Serialization(e)
        })
    }

    /// Send a request whose response body is not needed.
    pub async fn send_request_no_content<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        expected: &[StatusCode],
    ) -> Result<(), ProviderError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(method, path, body, expected).await.map(|_| ())
    }

    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        expected: &[StatusCode],
    ) -> Result<(StatusCode, String), ProviderError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let payload = match body {
            Some(body) => serde_json::to_string(body)?,
            None => String::new(),
        };

        // Request bodies may hold secret values, so only their size is logged.
        debug!(%method, %url, body_bytes = payload.len(), "sending NVCF request");

        let response = self
            .http
            .request(method.clone(), &url)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                error!(%method, %url, error = %e, "NVCF request failed");
                ProviderError::Http(e)
            })?;

        let status = response.status();
        let headers = format!("{:?}", response.headers());
        let text = response.text().await?;
        debug!(%method, %url, %status, %headers, body = %text, "received NVCF response");

        if expected.contains(&status) {
            return Ok((status, text));
        }

        let err = error_from_response(status, &text);
        error!(%method, %url, %status, error = %err, "NVCF request returned an error");
        Err(err)
    }
}

/// Map a non-expected response onto the error taxonomy.
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> ProviderError {
    if status == StatusCode::UNAUTHORIZED {
        return ProviderError::NotAuthenticated(
            "the NGC API key was rejected; check ngc_api_key or NGC_API_KEY".to_string(),
        );
    }

    let message = decode_error_message(body)
        .unwrap_or_else(|| format!("failed to parse error response: {}", body));

    if status == StatusCode::NOT_FOUND {
        ProviderError::NotFound(message)
    } else {
        ProviderError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Extract the message from either error envelope shape.
///
/// The nested `requestStatus.statusDescription` shape is tried first, then the
/// flat `detail` shape.
pub(crate) fn decode_error_message(body: &str) -> Option<String> {
    if let Ok(envelope) = serde_json::from_str::<RequestStatusEnvelope>(body) {
        if let Some(description) = envelope.request_status.status_description {
            if !description.is_empty() {
                return Some(description);
            }
        }
    }

    serde_json::from_str::<DetailEnvelope>(body)
        .ok()
        .map(|envelope| envelope.detail)
        .filter(|detail| !detail.is_empty())
}
