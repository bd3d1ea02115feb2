//! Flow API client
//!
//! Thin async wrapper over the REST endpoints the CLI uses. Every request
//! carries the project's API key as a bearer token.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::submit::Submission;

/// Failures talking to the API, phrased for the terminal
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 or 403
    #[error("Forbidden - unauthorized access. Is your api key correct?")]
    Unauthorized,

    /// 500
    #[error("Internal server error. Please try again or report it.")]
    Server,

    /// 400 or 409
    #[error("Bad request: {body}")]
    BadRequest {
        /// Response body as returned by the server
        body: String,
    },

    /// Any other non-success status
    #[error("Status code {code}: {body}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Response body as returned by the server
        body: String,
    },

    /// No response at all
    #[error("Couldn't reach the server: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// Response arrived but could not be decoded
    #[error("Unexpected response from the server: {0}")]
    Decode(#[source] reqwest::Error),

    /// Request body could not be built
    #[error("Failed to build request: {0}")]
    Request(String),
}

impl ApiError {
    /// Map a non-success status and its body to an error
    #[must_use]
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Unauthorized,
            500 => Self::Server,
            400 | 409 => Self::BadRequest { body },
            code => Self::Status { code, body },
        }
    }
}

/// Authenticated client for one API host
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    /// Create a client for `base_url` (no trailing slash)
    #[must_use]
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Upload a new version of a flow: `PUT /flows/{flow_id}` as multipart.
    ///
    /// Returns the response body.
    pub async fn push_flow(&self, flow_id: &str, submission: Submission) -> Result<Value, ApiError> {
        let form = submission
            .into_form()
            .map_err(|e| ApiError::Request(format!("{e:#}")))?;
        let request = self
            .client
            .put(self.url(&format!("flows/{flow_id}")))
            .multipart(form);

        let response = self.send(request).await?;
        response.json().await.map_err(ApiError::Decode)
    }

    /// Commit the current version of a flow: `PUT /flows/{flow_id}/commit`.
    ///
    /// Returns the response body and the id of the newest version, if listed.
    pub async fn commit_flow(&self, flow_id: &str) -> Result<(Value, Option<String>), ApiError> {
        let request = self.client.put(self.url(&format!("flows/{flow_id}/commit")));

        let response = self.send(request).await?;
        let body: Value = response.json().await.map_err(ApiError::Decode)?;
        let version = latest_version_id(&body);
        Ok((body, version))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(ApiError::Unreachable)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, pretty_body(&body)))
    }
}

/// Id of the last entry in `versionsList`
fn latest_version_id(body: &Value) -> Option<String> {
    let last = body.get("versionsList")?.as_array()?.last()?;
    match last {
        Value::String(id) => Some(id.clone()),
        other => other.get("id")?.as_str().map(str::to_string),
    }
}

/// Pretty-print a JSON body; other bodies pass through
fn pretty_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}
