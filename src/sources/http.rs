use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, error};

use super::{extract_records, RecordSource};

pub const DEFAULT_ENDPOINT: &str = "students";

/// The dashboard backend's student list endpoint.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_endpoint(base_url, DEFAULT_ENDPOINT, timeout)
    }

    pub fn with_endpoint(base_url: &str, endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(HttpSource {
            client,
            url: join_url(base_url, endpoint),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    fn describe(&self) -> String {
        format!("api {}", self.url)
    }

    async fn fetch_raw(&self) -> anyhow::Result<Vec<Value>> {
        debug!(url = %self.url, "fetching student list");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("network error reaching {}", self.url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read response from {}", self.url))?;

        if !status.is_success() {
            let message = server_message(status, &body);
            error!(url = %self.url, %status, reason = %message, "student list request failed");
            bail!("{} responded {}: {}", self.url, status, message);
        }

        let payload: Value = serde_json::from_str(&body)
            .with_context(|| format!("{} did not return JSON", self.url))?;
        extract_records(payload)
    }
}

fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// The backend reports failures as `{"error": "..."}`; fall back to the
/// status text when the body says nothing useful.
fn server_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("server error")
                .to_string()
        })
}
