//! Weighted market score with trigger-driven re-weighting.
//!
//! Weights and trigger predicates come from an immutable `AggregatorConfig`
//! passed in at call time.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::round1;
use crate::models::{CandleSeries, ScoreClass};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockWeights {
    pub ciclo: f64,
    pub momentum: f64,
    pub tecnico: f64,
}

impl BlockWeights {
    pub const fn new(ciclo: f64, momentum: f64, tecnico: f64) -> Self {
        Self {
            ciclo,
            momentum,
            tecnico,
        }
    }

    pub fn apply(&self, scores: &BlockScores) -> f64 {
        scores.ciclo * self.ciclo + scores.momentum * self.momentum + scores.tecnico * self.tecnico
    }
}

/// Block scores on 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockScores {
    pub ciclo: f64,
    pub momentum: f64,
    pub tecnico: f64,
}

/// What trigger predicates may look at.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    pub mvrv: f64,
    pub nupl: f64,
    /// Weekly EMA alignment on 0-100.
    pub weekly_alignment: f64,
    pub hourly: Option<&'a CandleSeries>,
    pub daily: Option<&'a CandleSeries>,
}

pub type TriggerPredicate = Arc<dyn Fn(&TriggerContext<'_>) -> bool + Send + Sync>;

/// Last hourly volume above `multiple` × the mean of the previous 24 bars.
pub fn volume_spike(multiple: f64) -> TriggerPredicate {
    Arc::new(move |ctx: &TriggerContext<'_>| {
        let Some(series) = ctx.hourly else {
            return false;
        };
        let volumes = series.volumes();
        if volumes.len() < 25 {
            return false;
        }
        let (last, prev) = match volumes.split_last() {
            Some((last, rest)) => (*last, &rest[rest.len() - 24..]),
            None => return false,
        };
        let mean = prev.iter().sum::<f64>() / prev.len() as f64;
        mean > 0.0 && last > multiple * mean
    })
}

/// Last daily candle range `(high - low) / open` above `pct` percent.
pub fn daily_range_above(pct: f64) -> TriggerPredicate {
    Arc::new(move |ctx: &TriggerContext<'_>| {
        ctx.daily
            .and_then(|d| d.last())
            .is_some_and(|c| c.range_pct() > pct)
    })
}

#[derive(Clone)]
pub struct AggregatorConfig {
    pub default_weights: BlockWeights,
    pub extreme_zone_weights: BlockWeights,
    pub trend_weights: BlockWeights,
    pub volume_weights: BlockWeights,
    pub volatility_weights: BlockWeights,
    pub volume_trigger: Option<TriggerPredicate>,
    pub volatility_trigger: Option<TriggerPredicate>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            default_weights: BlockWeights::new(0.50, 0.20, 0.30),
            extreme_zone_weights: BlockWeights::new(0.70, 0.10, 0.20),
            trend_weights: BlockWeights::new(0.20, 0.10, 0.70),
            volume_weights: BlockWeights::new(0.40, 0.40, 0.20),
            volatility_weights: BlockWeights::new(0.30, 0.40, 0.30),
            volume_trigger: None,
            volatility_trigger: None,
        }
    }
}

impl fmt::Debug for AggregatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatorConfig")
            .field("default_weights", &self.default_weights)
            .field("extreme_zone_weights", &self.extreme_zone_weights)
            .field("trend_weights", &self.trend_weights)
            .field("volume_trigger", &self.volume_trigger.is_some())
            .field("volatility_trigger", &self.volatility_trigger.is_some())
            .finish()
    }
}

impl AggregatorConfig {
    pub fn with_volume_trigger(mut self, predicate: TriggerPredicate) -> Self {
        self.volume_trigger = Some(predicate);
        self
    }

    pub fn with_volatility_trigger(mut self, predicate: TriggerPredicate) -> Self {
        self.volatility_trigger = Some(predicate);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    ZonaTopo,
    ZonaFundo,
    TendenciaConfirmada,
    VolumeExtremo,
    VolatilidadeAlta,
    Nenhum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketScore {
    pub score: f64,
    pub classificacao: ScoreClass,
    pub score_padrao: f64,
    pub pesos: BlockWeights,
    pub gatilho: TriggerKind,
    pub gatilho_descricao: String,
    pub blocos: BlockScores,
}

fn detect_trigger(cfg: &AggregatorConfig, ctx: &TriggerContext<'_>) -> (TriggerKind, String, BlockWeights) {
    if ctx.mvrv > 2.8 || ctx.nupl > 0.65 {
        return (
            TriggerKind::ZonaTopo,
            format!("ZONA_TOPO (MVRV:{:.2}, NUPL:{:.2})", ctx.mvrv, ctx.nupl),
            cfg.extreme_zone_weights,
        );
    }
    if ctx.mvrv < 1.0 || ctx.nupl < 0.0 {
        return (
            TriggerKind::ZonaFundo,
            format!("ZONA_FUNDO (MVRV:{:.2}, NUPL:{:.2})", ctx.mvrv, ctx.nupl),
            cfg.extreme_zone_weights,
        );
    }
    if ctx.weekly_alignment >= 100.0 {
        return (
            TriggerKind::TendenciaConfirmada,
            "TENDENCIA_CONFIRMADA (EMAs=100)".to_string(),
            cfg.trend_weights,
        );
    }
    if cfg.volume_trigger.as_ref().is_some_and(|p| p(ctx)) {
        return (TriggerKind::VolumeExtremo, "VOLUME_EXTREMO".to_string(), cfg.volume_weights);
    }
    if cfg.volatility_trigger.as_ref().is_some_and(|p| p(ctx)) {
        return (
            TriggerKind::VolatilidadeAlta,
            "VOLATILIDADE_ALTA".to_string(),
            cfg.volatility_weights,
        );
    }
    (TriggerKind::Nenhum, "NENHUM".to_string(), cfg.default_weights)
}

pub fn aggregate(cfg: &AggregatorConfig, blocos: BlockScores, ctx: &TriggerContext<'_>) -> MarketScore {
    let score_padrao = cfg.default_weights.apply(&blocos);
    let (gatilho, descricao, pesos) = detect_trigger(cfg, ctx);
    let score = round1(pesos.apply(&blocos).clamp(0.0, 100.0));

    info!(
        "Score mercado: {:.1} (padrão {:.1}, gatilho {})",
        score, score_padrao, descricao
    );

    MarketScore {
        score,
        classificacao: ScoreClass::from_score(score),
        score_padrao: round1(score_padrao),
        pesos,
        gatilho,
        gatilho_descricao: descricao,
        blocos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_daily_closes, make_hourly_closes};

    fn blocks() -> BlockScores {
        BlockScores {
            ciclo: 70.0,
            momentum: 50.0,
            tecnico: 60.0,
        }
    }

    fn ctx<'a>(mvrv: f64, nupl: f64, align: f64) -> TriggerContext<'a> {
        TriggerContext {
            mvrv,
            nupl,
            weekly_alignment: align,
            hourly: None,
            daily: None,
        }
    }

    #[test]
    fn default_weights_without_trigger() {
        // 35 + 10 + 18
        let s = aggregate(&AggregatorConfig::default(), blocks(), &ctx(2.0, 0.4, 60.0));
        assert_eq!(s.gatilho, TriggerKind::Nenhum);
        assert!((s.score - 63.0).abs() < 1e-9);
        assert_eq!(s.classificacao, ScoreClass::Bom);
    }

    #[test]
    fn top_zone_reweights() {
        // 49 + 5 + 12 = 66
        let s = aggregate(&AggregatorConfig::default(), blocks(), &ctx(3.0, 0.5, 100.0));
        assert_eq!(s.gatilho, TriggerKind::ZonaTopo);
        assert_eq!(s.gatilho_descricao, "ZONA_TOPO (MVRV:3.00, NUPL:0.50)");
        assert!((s.score - 66.0).abs() < 1e-9);
        assert!((s.score_padrao - 63.0).abs() < 1e-9);
    }

    #[test]
    fn bottom_zone_and_trend() {
        let s = aggregate(&AggregatorConfig::default(), blocks(), &ctx(1.5, -0.1, 100.0));
        assert_eq!(s.gatilho, TriggerKind::ZonaFundo);

        // 14 + 5 + 42 = 61
        let s = aggregate(&AggregatorConfig::default(), blocks(), &ctx(1.5, 0.4, 100.0));
        assert_eq!(s.gatilho, TriggerKind::TendenciaConfirmada);
        assert!((s.score - 61.0).abs() < 1e-9);
    }

    #[test]
    fn unwired_triggers_never_fire() {
        let mut vols = vec![100.0; 30];
        vols.push(10_000.0);
        let hourly = make_hourly_closes(&vols);
        let mut c = ctx(1.5, 0.4, 50.0);
        c.hourly = Some(&hourly);
        let s = aggregate(&AggregatorConfig::default(), blocks(), &c);
        assert_eq!(s.gatilho, TriggerKind::Nenhum);
    }

    #[test]
    fn volume_spike_predicate() {
        let series = make_hourly_closes(&vec![100.0; 30]);
        let mut candles = series.as_slice().to_vec();
        if let Some(last) = candles.last_mut() {
            last.volume = 400.0;
        }
        let hourly = CandleSeries::new(candles);
        let mut c = ctx(1.5, 0.4, 50.0);
        c.hourly = Some(&hourly);

        let cfg = AggregatorConfig::default().with_volume_trigger(volume_spike(3.0));
        let s = aggregate(&cfg, blocks(), &c);
        assert_eq!(s.gatilho, TriggerKind::VolumeExtremo);
        // 28 + 20 + 12 = 60
        assert!((s.score - 60.0).abs() < 1e-9);

        let cfg = AggregatorConfig::default().with_volume_trigger(volume_spike(5.0));
        assert_eq!(aggregate(&cfg, blocks(), &c).gatilho, TriggerKind::Nenhum);
    }

    #[test]
    fn volatility_predicate() {
        let daily = make_daily_closes(&[100.0, 101.0]);
        let mut candles = daily.as_slice().to_vec();
        if let Some(last) = candles.last_mut() {
            last.high = 110.0;
            last.low = 100.0;
            last.open = 100.0;
        }
        let daily = CandleSeries::new(candles);
        let mut c = ctx(1.5, 0.4, 50.0);
        c.daily = Some(&daily);
        let cfg = AggregatorConfig::default().with_volatility_trigger(daily_range_above(5.0));
        assert_eq!(aggregate(&cfg, blocks(), &c).gatilho, TriggerKind::VolatilidadeAlta);
    }
}
