use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid backend url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("backend request timed out")]
    Timeout,

    #[error("backend request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("unreadable backend response: {0}")]
    Response(#[source] reqwest::Error),
}

impl BackendError {
    fn classify(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Response(e)
        } else {
            BackendError::Http(e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct PushReply {
    #[serde(default, alias = "Body")]
    body: Option<String>,
}

/// Client for the HTTP backend that server pushes are forwarded to.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    /// The relative path is appended to the base URL as-is.
    pub fn url_for(&self, path: &str) -> Result<reqwest::Url, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        reqwest::Url::parse(&url).map_err(|e| BackendError::InvalidUrl {
            url,
            reason: e.to_string(),
        })
    }

    /// POSTs `{"body": payload}` and returns the `body` field of the reply.
    ///
    /// The status code is not checked; a reply with a missing or null
    /// `body` yields an empty string.
    pub async fn push(&self, path: &str, payload: &str) -> Result<String, BackendError> {
        let url = self.url_for(path)?;
        let resp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&json!({ "body": payload }))
            .send()
            .await
            .map_err(BackendError::classify)?;

        let reply: PushReply = resp.json().await.map_err(BackendError::classify)?;
        Ok(reply.body.unwrap_or_default())
    }
}
