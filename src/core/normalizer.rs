//! Pulls numeric indicators out of loosely-typed upstream JSON.
//!
//! Required fields fail fast with `MissingIndicator`; optional ones come back
//! as `None` and never default to a made-up number.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::{EngineError, EngineResult};
use crate::models::{AccountPosition, CycleIndicators, IndicatorSnapshot, PositionData};

/// Coerce a JSON value into a finite f64.
///
/// Accepts numbers and numeric strings such as `"1.25"`, `"+17.2%"` or
/// `"104,350.29"`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| *c != ',' && *c != '+' && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Look up a dotted path (`"posicao.health_factor"`) in a JSON object.
fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(payload, |node, key| node.get(key))
}

pub fn optional(payload: &Value, field: &str) -> Option<f64> {
    lookup(payload, field).and_then(coerce_f64)
}

pub fn require(payload: &Value, field: &str) -> EngineResult<f64> {
    optional(payload, field).ok_or_else(|| EngineError::missing(field))
}

/// First alias that holds a number; the error names the canonical (first) alias.
pub fn require_any(payload: &Value, aliases: &[&str]) -> EngineResult<f64> {
    aliases
        .iter()
        .find_map(|a| optional(payload, a))
        .ok_or_else(|| EngineError::missing(aliases.first().copied().unwrap_or("unknown")))
}

pub fn normalize_cycle_indicators(payload: &Value) -> EngineResult<CycleIndicators> {
    Ok(CycleIndicators {
        mvrv: require_any(payload, &["mvrv", "mvrv_z_score", "mvrv_z"])?,
        nupl: require(payload, "nupl")?,
        realized_ratio: require(payload, "realized_ratio")?,
        puell_multiple: require(payload, "puell_multiple")?,
        sopr: optional(payload, "sopr"),
        funding_rate: optional(payload, "funding_rate"),
        exchange_netflow: optional(payload, "exchange_netflow"),
        long_short_ratio: optional(payload, "long_short_ratio"),
    })
}

/// Parse a position object. Position data is optional, so a malformed block
/// becomes `Indisponivel` naming the first bad field instead of an error.
pub fn normalize_position(payload: Option<&Value>) -> PositionData {
    let Some(block) = payload.filter(|v| v.is_object()) else {
        return PositionData::unavailable("posição não informada");
    };

    let parsed = (|| -> EngineResult<AccountPosition> {
        Ok(AccountPosition {
            health_factor: require(block, "health_factor")?,
            total_collateral: require(block, "total_collateral")?,
            total_debt: require(block, "total_debt")?,
            available_borrows: optional(block, "available_borrows"),
            liquidation_threshold: optional(block, "liquidation_threshold"),
            ltv: optional(block, "ltv"),
        })
    })();

    match parsed {
        Ok(position) => PositionData::Disponivel(position),
        Err(e) => PositionData::unavailable(e.to_string()),
    }
}

/// Build a snapshot from a flat payload (used when a caller supplies the
/// indicators directly instead of the collectors).
pub fn normalize_snapshot(payload: &Value, timestamp: DateTime<Utc>) -> EngineResult<IndicatorSnapshot> {
    Ok(IndicatorSnapshot {
        timestamp,
        btc_price: require_any(payload, &["btc_price", "preco"])?,
        score_mercado: require(payload, "score_mercado")?,
        mvrv: require_any(payload, &["mvrv", "mvrv_z_score"])?,
        nupl: require(payload, "nupl")?,
        rsi_diario: require_any(payload, &["rsi_diario", "rsi_daily"])?,
        rsi_mensal: require_any(payload, &["rsi_mensal", "rsi_monthly"])?,
        ema_distance_pct: require_any(payload, &["ema_distance", "ema_distance_pct"])?,
        position: normalize_position(payload.get("posicao")),
    })
}
