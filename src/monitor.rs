use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::models::health::HealthSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("monitor request timed out")]
    Timeout,

    #[error("monitor request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("unreadable monitor response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl From<reqwest::Error> for MonitorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MonitorError::Timeout
        } else if e.is_decode() {
            MonitorError::Decode(e)
        } else {
            MonitorError::Http(e)
        }
    }
}

/// Client for the local monitoring endpoint.
#[derive(Clone)]
pub struct MonitorClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl MonitorClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn snapshot(&self) -> Result<HealthSnapshot, MonitorError> {
        let resp = self
            .client
            .get(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(resp.json::<HealthSnapshot>().await?)
    }
}
