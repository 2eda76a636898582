//! Position/ledger collaborator backed by Aave v3 `getUserAccountData`.

use alloy::primitives::{hex, Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{AccountPosition, HEALTH_FACTOR_NO_DEBT};

const BASE_CURRENCY_DECIMALS: f64 = 1e8;
const BPS_PER_PERCENT: f64 = 100.0;
const WAD: f64 = 1e18;

sol! {
    /// Aave v3 Pool, read side only.
    interface IPool {
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }
}

#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn get_account_position(&self, address: &str) -> Result<AccountPosition>;
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

pub struct AaveClient {
    client: Client,
    rpc_url: String,
    pool_address: String,
}

impl AaveClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        Self::with_endpoint(&cfg.rpc_url, &cfg.aave_pool_address, cfg.fetch_timeout())
    }

    pub fn with_endpoint(rpc_url: &str, pool_address: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build RPC client")?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            pool_address: pool_address.to_string(),
        })
    }
}

/// Calldata for `getUserAccountData(user)`, 0x-prefixed.
pub fn encode_call(address: &str) -> Result<String> {
    let user: Address = address
        .trim()
        .parse()
        .with_context(|| format!("Invalid wallet address: {}", address))?;
    let call = IPool::getUserAccountDataCall { user };
    Ok(hex::encode_prefixed(call.abi_encode()))
}

/// Aave amounts fit comfortably in u128; anything larger saturates.
fn u256_to_f64(raw: U256) -> f64 {
    raw.saturating_to::<u128>() as f64
}

fn health_factor_from_wad(raw: U256) -> f64 {
    if raw.is_zero() {
        return HEALTH_FACTOR_NO_DEBT;
    }
    (u256_to_f64(raw) / WAD).min(HEALTH_FACTOR_NO_DEBT)
}

/// Decode the return data of `getUserAccountData`.
pub fn decode_account_data(data: &str) -> Result<AccountPosition> {
    let bytes: Bytes = data
        .trim()
        .parse()
        .context("Non-hex return data")?;
    let ret = IPool::getUserAccountDataCall::abi_decode_returns(&bytes)
        .with_context(|| format!("Malformed getUserAccountData return ({} bytes)", bytes.len()))?;

    Ok(AccountPosition {
        total_collateral: u256_to_f64(ret.totalCollateralBase) / BASE_CURRENCY_DECIMALS,
        total_debt: u256_to_f64(ret.totalDebtBase) / BASE_CURRENCY_DECIMALS,
        available_borrows: Some(u256_to_f64(ret.availableBorrowsBase) / BASE_CURRENCY_DECIMALS),
        liquidation_threshold: Some(
            u256_to_f64(ret.currentLiquidationThreshold) / BPS_PER_PERCENT,
        ),
        ltv: Some(u256_to_f64(ret.ltv) / BPS_PER_PERCENT),
        health_factor: health_factor_from_wad(ret.healthFactor),
    })
}

#[async_trait]
impl PositionSource for AaveClient {
    async fn get_account_position(&self, address: &str) -> Result<AccountPosition> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                {"to": self.pool_address, "data": encode_call(address)?},
                "latest"
            ]
        });

        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .context("Failed to reach RPC endpoint")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("RPC error {}: {}", status, text);
        }

        let rpc: RpcResponse = resp.json().await.context("Failed to parse RPC response")?;
        if let Some(err) = rpc.error {
            anyhow::bail!("eth_call failed ({}): {}", err.code, err.message);
        }
        let data = rpc.result.context("RPC response without result")?;
        debug!("getUserAccountData raw: {}", data);

        let position = decode_account_data(&data)?;
        info!(
            "Posição Aave: HF {:.2}, colateral ${:.2}, dívida ${:.2}",
            position.health_factor, position.total_collateral, position.total_debt
        );
        Ok(position)
    }
}
