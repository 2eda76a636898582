use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health factor reported when the account has no debt.
pub const HEALTH_FACTOR_NO_DEBT: f64 = 999_999.0;

/// On-chain cycle and flow indicators from the on-chain collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleIndicators {
    pub mvrv: f64,
    pub nupl: f64,
    pub realized_ratio: f64,
    pub puell_multiple: f64,
    #[serde(default)]
    pub sopr: Option<f64>,
    /// Perpetual funding rate in percent units (0.01 = 0.01%).
    #[serde(default)]
    pub funding_rate: Option<f64>,
    /// BTC exchange netflow (negative = outflow).
    #[serde(default)]
    pub exchange_netflow: Option<f64>,
    #[serde(default)]
    pub long_short_ratio: Option<f64>,
}

/// Lending position of the tracked account, values in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPosition {
    pub health_factor: f64,
    pub total_collateral: f64,
    pub total_debt: f64,
    /// Borrow headroom in USD; not every ledger reports it.
    #[serde(default)]
    pub available_borrows: Option<f64>,
    /// Percent, e.g. 82.5.
    #[serde(default)]
    pub liquidation_threshold: Option<f64>,
    /// Percent, e.g. 78.0.
    #[serde(default)]
    pub ltv: Option<f64>,
}

impl AccountPosition {
    pub fn net_asset_value(&self) -> f64 {
        self.total_collateral - self.total_debt
    }

    /// Collateral over equity; 0 when equity is not positive.
    pub fn leverage(&self) -> f64 {
        let nav = self.net_asset_value();
        if nav > 0.0 {
            self.total_collateral / nav
        } else {
            0.0
        }
    }

    /// Debt as a percentage of collateral.
    pub fn ltv_used_pct(&self) -> f64 {
        if self.total_collateral > 0.0 {
            self.total_debt / self.total_collateral * 100.0
        } else {
            0.0
        }
    }

    /// Borrow headroom as a percentage of collateral. `None` when the
    /// ledger did not report available borrows.
    pub fn free_capital_pct(&self) -> Option<f64> {
        let available = self.available_borrows?;
        if self.total_collateral > 0.0 {
            Some(available / self.total_collateral * 100.0)
        } else {
            Some(0.0)
        }
    }

    pub fn liquidation_price(&self, price: f64) -> Option<f64> {
        if self.health_factor <= 1.0 || self.total_debt <= 0.0 {
            return None;
        }
        Some(price / self.health_factor)
    }

    /// Percent drop from `price` to the liquidation price, never negative.
    pub fn liquidation_distance_pct(&self, price: f64) -> f64 {
        if self.health_factor <= 1.0 || price <= 0.0 {
            return 0.0;
        }
        match self.liquidation_price(price) {
            Some(liq) => ((price - liq) / price * 100.0).max(0.0),
            None => 100.0,
        }
    }
}

/// Optional position data. Unavailable positions travel through every layer
/// instead of aborting the evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum PositionData {
    #[serde(rename = "disponível")]
    Disponivel(AccountPosition),
    #[serde(rename = "indisponível")]
    Indisponivel { motivo: String },
}

impl PositionData {
    pub fn unavailable(motivo: impl Into<String>) -> Self {
        PositionData::Indisponivel {
            motivo: motivo.into(),
        }
    }

    pub fn as_position(&self) -> Option<&AccountPosition> {
        match self {
            PositionData::Disponivel(p) => Some(p),
            PositionData::Indisponivel { .. } => None,
        }
    }

    pub fn health_factor(&self) -> Option<f64> {
        self.as_position().map(|p| p.health_factor)
    }
}

/// Everything one evaluation needs, captured once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub btc_price: f64,
    pub score_mercado: f64,
    pub mvrv: f64,
    pub nupl: f64,
    pub rsi_diario: f64,
    pub rsi_mensal: f64,
    pub ema_distance_pct: f64,
    pub position: PositionData,
}

impl IndicatorSnapshot {
    pub fn health_factor(&self) -> Option<f64> {
        self.position.health_factor()
    }

    pub fn alavancagem_atual(&self) -> Option<f64> {
        self.position.as_position().map(|p| p.leverage())
    }
}
