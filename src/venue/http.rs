use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

use crate::error::{HypercopyError, Result};

pub const DEFAULT_API_URL: &str = "https://api.hyperliquid.xyz";

/// Shared JSON-over-HTTPS transport for the info and exchange endpoints
#[derive(Debug, Clone)]
pub struct VenueHttp {
    http: Client,
    base_url: String,
}

impl VenueHttp {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent("hypercopy/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| {
                HypercopyError::Internal(format!("failed to build venue HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base_url}{path}` and decode the JSON reply.
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(e, path))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| transport_error(e, path))?;

        if status.as_u16() == 429 {
            return Err(HypercopyError::RateLimited(format!(
                "venue rate limited POST {}",
                path
            )));
        }

        if !status.is_success() {
            return Err(HypercopyError::Venue {
                status: status.as_u16(),
                body: text,
            });
        }

        trace!("POST {} -> {}", path, text);
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn transport_error(err: reqwest::Error, path: &str) -> HypercopyError {
    if err.is_timeout() {
        HypercopyError::Timeout(format!("POST {}: {}", path, err))
    } else if err.is_connect() {
        HypercopyError::Connection(format!("POST {}: {}", path, err))
    } else {
        HypercopyError::Http(err)
    }
}
