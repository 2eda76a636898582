//! Sub-block scores (ciclo, momentum, técnico) on a 0-10 scale.

use serde::{Deserialize, Serialize};

use crate::core::indicators::ema;
use crate::core::round2;
use crate::errors::{EngineError, EngineResult};
use crate::models::{CycleIndicators, ScoreClass};

/// EMA periods of the technical block, shortest first.
pub const EMA_PERIODS: [usize; 5] = [17, 34, 144, 305, 610];
const ALIGNMENT_POINTS: [f64; 4] = [1.0, 2.0, 3.0, 4.0];
const POSITION_POINTS: [f64; 5] = [1.0, 1.0, 2.0, 3.0, 3.0];

pub const WEEKLY_WEIGHT: f64 = 0.7;
pub const DAILY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorScore {
    pub nome: String,
    pub valor: f64,
    pub score: f64,
    pub classificacao: ScoreClass,
    pub peso: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockScore {
    pub bloco: String,
    /// 0-10
    pub score: f64,
    pub classificacao: ScoreClass,
    pub indicadores: Vec<IndicatorScore>,
}

impl BlockScore {
    /// Score on the 0-100 scale the aggregator expects.
    pub fn score_100(&self) -> f64 {
        self.score * 10.0
    }
}

/// Five-step ladder shared by every block indicator: below each threshold
/// in turn scores 9.5, 7.5, 5.5, 3.5, otherwise 1.5.
fn ladder(value: f64, thresholds: [f64; 4]) -> f64 {
    const STEPS: [f64; 4] = [9.5, 7.5, 5.5, 3.5];
    thresholds
        .iter()
        .zip(STEPS)
        .find(|(t, _)| value < **t)
        .map(|(_, s)| s)
        .unwrap_or(1.5)
}

pub fn class_0_10(score: f64) -> ScoreClass {
    ScoreClass::from_score(score * 10.0)
}

fn indicator(nome: &str, valor: f64, score: f64, peso: f64) -> IndicatorScore {
    IndicatorScore {
        nome: nome.to_string(),
        valor,
        score,
        classificacao: class_0_10(score),
        peso,
    }
}

/// Weighted mean over the indicators present, renormalising the weights.
fn consolidate(bloco: &str, indicadores: Vec<IndicatorScore>) -> BlockScore {
    let total_weight: f64 = indicadores.iter().map(|i| i.peso).sum();
    let score = if total_weight > 0.0 {
        indicadores.iter().map(|i| i.score * i.peso).sum::<f64>() / total_weight
    } else {
        0.0
    };
    let score = round2(score);
    BlockScore {
        bloco: bloco.to_string(),
        score,
        classificacao: class_0_10(score),
        indicadores,
    }
}

pub fn mvrv_score(v: f64) -> f64 {
    ladder(v, [0.0, 2.0, 4.0, 6.0])
}

pub fn realized_ratio_score(v: f64) -> f64 {
    ladder(v, [0.7, 1.0, 1.5, 2.5])
}

pub fn puell_score(v: f64) -> f64 {
    ladder(v, [0.5, 1.0, 2.0, 4.0])
}

pub fn cycle_block(ind: &CycleIndicators) -> BlockScore {
    consolidate(
        "ciclo",
        vec![
            indicator("MVRV_Z", ind.mvrv, mvrv_score(ind.mvrv), 0.50),
            indicator(
                "Realized_Ratio",
                ind.realized_ratio,
                realized_ratio_score(ind.realized_ratio),
                0.40,
            ),
            indicator(
                "Puell_Multiple",
                ind.puell_multiple,
                puell_score(ind.puell_multiple),
                0.10,
            ),
        ],
    )
}

pub fn weekly_rsi_score(v: f64) -> f64 {
    ladder(v, [30.0, 45.0, 55.0, 70.0])
}

/// Funding rate in percent units.
pub fn funding_score(v: f64) -> f64 {
    ladder(v, [-0.05, 0.0, 0.02, 0.1])
}

pub fn netflow_score(v: f64) -> f64 {
    ladder(v, [-50_000.0, -10_000.0, 10_000.0, 50_000.0])
}

pub fn long_short_score(v: f64) -> f64 {
    ladder(v, [0.8, 0.95, 1.05, 1.3])
}

/// Weekly RSI is required; the flow indicators are optional and simply
/// dropped from the weighting when absent.
pub fn momentum_block(rsi_semanal: f64, ind: &CycleIndicators) -> BlockScore {
    let mut parts = vec![indicator("RSI_Semanal", rsi_semanal, weekly_rsi_score(rsi_semanal), 0.40)];
    if let Some(f) = ind.funding_rate {
        parts.push(indicator("Funding_Rates", f, funding_score(f), 0.35));
    }
    if let Some(n) = ind.exchange_netflow {
        parts.push(indicator("Exchange_Netflow", n, netflow_score(n), 0.15));
    }
    if let Some(ls) = ind.long_short_ratio {
        parts.push(indicator("Long_Short_Ratio", ls, long_short_score(ls), 0.10));
    }
    consolidate("momentum", parts)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaLevel {
    pub periodo: usize,
    pub valor: f64,
    pub distancia_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeTechnical {
    /// 0-10
    pub alinhamento: f64,
    /// 0-10
    pub posicao: f64,
    pub score: f64,
    pub emas: Vec<EmaLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalBlock {
    #[serde(flatten)]
    pub bloco: BlockScore,
    pub semanal: TimeframeTechnical,
    pub diario: TimeframeTechnical,
}

impl TechnicalBlock {
    /// Weekly EMA alignment on 0-100; 100 means every EMA is stacked.
    pub fn weekly_alignment_100(&self) -> f64 {
        self.semanal.alinhamento * 10.0
    }
}

fn position_multiplier(distance_pct: f64) -> f64 {
    if distance_pct > 5.0 {
        0.5
    } else if distance_pct > 2.0 {
        0.8
    } else if distance_pct >= 0.0 {
        1.0
    } else if distance_pct >= -2.0 {
        0.3
    } else {
        0.0
    }
}

/// Score one timeframe from its closes (oldest first).
pub fn timeframe_technical(closes: &[f64], label: &str) -> EngineResult<TimeframeTechnical> {
    let price = *closes
        .last()
        .ok_or_else(|| EngineError::missing(&format!("closes_{}", label)))?;

    let mut emas = Vec::with_capacity(EMA_PERIODS.len());
    for &period in &EMA_PERIODS {
        let value = ema(closes, period)
            .filter(|v| *v > 0.0)
            .ok_or_else(|| EngineError::missing(&format!("ema{}_{}", period, label)))?;
        emas.push(EmaLevel {
            periodo: period,
            valor: round2(value),
            distancia_pct: round2((price - value) / value * 100.0),
        });
    }

    let alinhamento: f64 = emas
        .windows(2)
        .zip(ALIGNMENT_POINTS)
        .filter(|(pair, _)| pair[0].valor > pair[1].valor)
        .map(|(_, pts)| pts)
        .sum();
    let posicao: f64 = emas
        .iter()
        .zip(POSITION_POINTS)
        .map(|(e, base)| base * position_multiplier(e.distancia_pct))
        .sum();

    Ok(TimeframeTechnical {
        alinhamento,
        posicao: round2(posicao),
        score: round2((alinhamento + posicao) / 2.0),
        emas,
    })
}

pub fn technical_block(weekly_closes: &[f64], daily_closes: &[f64]) -> EngineResult<TechnicalBlock> {
    let semanal = timeframe_technical(weekly_closes, "1w")?;
    let diario = timeframe_technical(daily_closes, "1d")?;
    let score = round2(semanal.score * WEEKLY_WEIGHT + diario.score * DAILY_WEIGHT);
    let bloco = BlockScore {
        bloco: "tecnico".to_string(),
        score,
        classificacao: class_0_10(score),
        indicadores: vec![
            indicator("EMAs_Semanal", semanal.alinhamento, semanal.score, WEEKLY_WEIGHT),
            indicator("EMAs_Diario", diario.alinhamento, diario.score, DAILY_WEIGHT),
        ],
    };
    Ok(TechnicalBlock {
        bloco,
        semanal,
        diario,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicators() -> CycleIndicators {
        CycleIndicators {
            mvrv: 1.5,
            nupl: 0.4,
            realized_ratio: 1.2,
            puell_multiple: 0.8,
            sopr: None,
            funding_rate: None,
            exchange_netflow: None,
            long_short_ratio: None,
        }
    }

    #[test]
    fn ladders() {
        assert_eq!(mvrv_score(-0.1), 9.5);
        assert_eq!(mvrv_score(0.0), 7.5);
        assert_eq!(mvrv_score(6.0), 1.5);
        assert_eq!(realized_ratio_score(1.2), 5.5);
        assert_eq!(puell_score(0.8), 7.5);
        assert_eq!(funding_score(0.01), 5.5);
        assert_eq!(funding_score(-0.06), 9.5);
        assert_eq!(long_short_score(1.1), 3.5);
    }

    #[test]
    fn cycle_block_weights() {
        // 7.5*.5 + 5.5*.4 + 7.5*.1 = 3.75 + 2.2 + 0.75 = 6.7
        let b = cycle_block(&indicators());
        assert!((b.score - 6.7).abs() < 1e-9);
        assert_eq!(b.classificacao, ScoreClass::Bom);
        assert!((b.score_100() - 67.0).abs() < 1e-9);
    }

    #[test]
    fn momentum_renormalises_missing_inputs() {
        let b = momentum_block(40.0, &indicators());
        assert_eq!(b.indicadores.len(), 1);
        assert!((b.score - 7.5).abs() < 1e-9);

        let mut ind = indicators();
        ind.funding_rate = Some(0.01);
        // (7.5*.4 + 5.5*.35) / .75 = 4.925 / .75 = 6.5667
        let b = momentum_block(40.0, &ind);
        assert!((b.score - 6.57).abs() < 1e-9);
    }

    #[test]
    fn rising_series_is_fully_aligned() {
        let closes: Vec<f64> = (1..=800).map(|i| 100.0 + i as f64).collect();
        let tf = timeframe_technical(&closes, "1w").unwrap();
        assert_eq!(tf.alinhamento, 10.0);
        assert!(tf.emas.iter().all(|e| e.distancia_pct > 0.0));
    }

    #[test]
    fn flat_series_scores_position_only() {
        let closes = vec![100.0; 50];
        let tf = timeframe_technical(&closes, "1d").unwrap();
        assert_eq!(tf.alinhamento, 0.0);
        // price sits on every EMA -> multiplier 1.0 -> full 10 points
        assert!((tf.posicao - 10.0).abs() < 1e-9);
        assert!((tf.score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn empty_closes_is_missing_indicator() {
        match timeframe_technical(&[], "1d") {
            Err(EngineError::MissingIndicator { field }) => assert_eq!(field, "closes_1d"),
            other => panic!("expected MissingIndicator, got {:?}", other),
        }
    }

    #[test]
    fn technical_block_blends_timeframes() {
        let rising: Vec<f64> = (1..=800).map(|i| 100.0 + i as f64).collect();
        let flat = vec![100.0; 50];
        let t = technical_block(&rising, &flat).unwrap();
        assert_eq!(t.weekly_alignment_100(), 100.0);
        let expected = round2(t.semanal.score * 0.7 + t.diario.score * 0.3);
        assert!((t.bloco.score - expected).abs() < 1e-9);
    }
}
