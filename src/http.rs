//! Thin authenticated wrapper over [`reqwest::Client`].
//!
//! Every call takes the bearer token explicitly; callers acquire it through
//! the credential cache per call so that long-running batches stay valid
//! across a credential's lifetime.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Maximum characters of an upstream error body kept for diagnostics.
const BODY_SNIPPET_CHARS: usize = 200;

/// Errors from a single remote call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success HTTP status from the remote.
    #[error("remote returned status {status}{}", body_snippet.as_deref().map(|b| format!(": {b}")).unwrap_or_default())]
    Status {
        status: u16,
        body_snippet: Option<String>,
    },
    /// Network or protocol failure before a status was received.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The remote answered with a body this client cannot decode.
    #[error("malformed response: {0}")]
    Decode(#[source] serde_json::Error),
    /// Local I/O failure while persisting a downloaded stream.
    #[error("download I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// HTTP 409 Conflict, which some idempotent provisioning calls treat as
    /// success.
    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }
}

fn truncate_snippet(body: String) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    if body.chars().count() > BODY_SNIPPET_CHARS {
        let truncated: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
        Some(format!("{truncated}..."))
    } else {
        Some(body)
    }
}

/// Authenticated JSON client for the partner administration and graph APIs.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// GET a JSON value. Non-success statuses become [`ApiError::Status`]
    /// with a truncated body snippet.
    pub async fn get_json(&self, url: &str, token: &str) -> Result<serde_json::Value, ApiError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body_snippet: truncate_snippet(body),
            });
        }
        serde_json::from_str(&body).map_err(ApiError::Decode)
    }

    /// GET and decode a typed record.
    pub async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, ApiError> {
        let value = self.get_json(url, token).await?;
        serde_json::from_value(value).map_err(ApiError::Decode)
    }

    /// POST a JSON body and decode the typed response.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header("accept", "application/json")
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body_snippet: truncate_snippet(text),
            });
        }
        serde_json::from_str(&text).map_err(ApiError::Decode)
    }

    /// POST expecting no meaningful body back; success is any 2xx status.
    pub async fn post_no_content<B: Serialize>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body_snippet: truncate_snippet(text),
            });
        }
        Ok(())
    }

    /// GET a raw byte stream and copy it verbatim to `path`, e.g. the
    /// compressed bulk customer export. No decompression or decoding happens
    /// here. Returns the number of bytes written.
    pub async fn download_to_file(
        &self,
        url: &str,
        token: &str,
        path: &std::path::Path,
    ) -> Result<u64, ApiError> {
        use futures::StreamExt;
        use tokio::io::AsyncWriteExt;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("accept-encoding", "gzip, deflate, br")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body_snippet: truncate_snippet(text),
            });
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Verdict printed when a create call succeeds.
pub const VERDICT_CREATED: &str = "Created.";

/// Operator-facing verdict for a relationship create/refresh status code.
pub fn relationship_verdict(status: Option<u16>) -> &'static str {
    match status {
        Some(200) | Some(201) => VERDICT_CREATED,
        Some(409) => "GDAP relationship name already exists.",
        Some(403) => "Please check if a DAP relationship exists with the customer.",
        Some(401) => "Please make sure your sign-in credentials are MFA enabled.",
        Some(400) => "Please check input setup for customers and roles.",
        _ => "Failed. The customer does not exist or the DAP relationship is missing.",
    }
}

/// Operator-facing verdict for an access assignment status code.
pub fn assignment_verdict(status: Option<u16>) -> &'static str {
    match status {
        Some(200) | Some(201) => VERDICT_CREATED,
        Some(409) => "Access assignment already exists.",
        Some(403) => "Please check if a DAP relationship exists with the customer.",
        Some(401) => "Unauthorized. Please make sure your sign-in credentials are MFA enabled.",
        Some(400) => "Please check input setup for relationships and security group configuration.",
        _ => "Failed to create. Please try again.",
    }
}
