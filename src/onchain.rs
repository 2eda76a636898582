//! On-chain collaborator: MVRV, NUPL and the cycle/flow indicators.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::core::normalizer::normalize_cycle_indicators;
use crate::models::CycleIndicators;

#[async_trait]
pub trait OnChainSource: Send + Sync {
    async fn get_cycle_indicators(&self) -> Result<CycleIndicators>;
}

/// Reads the indicators from a JSON endpoint. The payload may be flat or
/// wrapped in a `data` object.
pub struct HttpOnChainClient {
    client: Client,
    url: String,
}

impl HttpOnChainClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        Self::with_url(&cfg.onchain_api_url, cfg.fetch_timeout())
    }

    pub fn with_url(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build on-chain HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl OnChainSource for HttpOnChainClient {
    async fn get_cycle_indicators(&self) -> Result<CycleIndicators> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to fetch on-chain indicators")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("On-chain API error {}: {}", status, body);
        }

        let payload: Value = resp
            .json()
            .await
            .context("Failed to parse on-chain response")?;
        let body = payload.get("data").filter(|d| d.is_object()).unwrap_or(&payload);
        debug!("On-chain payload: {}", body);

        Ok(normalize_cycle_indicators(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(body: Value) -> (MockServer, HttpOnChainClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/onchain/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        let url = format!("{}/onchain/latest", server.uri());
        let client = HttpOnChainClient::with_url(&url, Duration::from_secs(5)).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn wrapped_payload_with_strings() {
        let (_server, client) = client_for(json!({
            "data": {
                "mvrv_z_score": "2.10",
                "nupl": 0.52,
                "realized_ratio": 1.4,
                "puell_multiple": "0.9",
                "funding_rate": "0.012%"
            }
        }))
        .await;

        let ind = client.get_cycle_indicators().await.unwrap();
        assert!((ind.mvrv - 2.1).abs() < 1e-9);
        assert_eq!(ind.funding_rate, Some(0.012));
        assert_eq!(ind.sopr, None);
    }

    #[tokio::test]
    async fn missing_nupl_names_the_field() {
        let (_server, client) = client_for(json!({
            "mvrv": 1.2, "realized_ratio": 1.0, "puell_multiple": 0.8
        }))
        .await;

        let err = client.get_cycle_indicators().await.unwrap_err();
        assert!(err.to_string().contains("nupl"));
    }
}
