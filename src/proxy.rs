use std::time::Duration;

use serde_json::Value;

use crate::config::REQUEST_TIMEOUT_SECS;
use crate::error::{FetchFailure, Result};

/// HTTP client for the FPL proxy.
///
/// The proxy shields us from the upstream's rate limiting and CORS rules: we
/// never talk to fantasy.premierleague.com directly. Every request is
/// `GET <base_url>?path=<upstream path>` and every response is JSON. Failures
/// surface as an `{"error": ...}` body, sometimes with a 2xx status, so the
/// body is checked before the status code.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    base_url: String,
    client: reqwest::Client,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { base_url: base_url.into(), client })
    }

    /// Fetch one upstream path through the proxy and decode the JSON body.
    ///
    /// `path` is the bare upstream path (`bootstrap-static`,
    /// `entry/123/event/4/picks`, `fixtures?future=1`); query-string
    /// characters inside it are encoded into the `path` parameter.
    pub async fn get_json(&self, path: &str) -> std::result::Result<Value, FetchFailure> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| FetchFailure::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| FetchFailure::Network(e.to_string()))?;

        let body: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                if !status.is_success() {
                    return Err(FetchFailure::Upstream(format!("status {status}")));
                }
                return Err(FetchFailure::Decode(e.to_string()));
            }
        };

        if let Some(message) = body.get("error").and_then(|e| e.as_str()) {
            return Err(FetchFailure::Upstream(format!("{message} (status {status})")));
        }
        if !status.is_success() {
            return Err(FetchFailure::Upstream(format!("status {status}")));
        }

        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
