//! Tactical setup detector on (RSI, EMA distance).
//!
//! Conditions overlap on purpose (RSI 25 at the EMA is both oversold and a
//! support test); list order decides.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::rules::{within, RuleSet};
use crate::models::{Forca, Setup, SetupSide};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetupInput {
    pub rsi: f64,
    pub ema_distance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupClassification {
    pub setup: Setup,
    pub forca: Forca,
    pub tamanho_sugerido: u32,
    pub lado: SetupSide,
    pub detalhes: String,
    pub rsi: f64,
    pub ema_distance_pct: f64,
}

fn found(setup: Setup, forca: Forca, size: u32, input: &SetupInput) -> SetupClassification {
    SetupClassification {
        setup,
        forca,
        tamanho_sugerido: size,
        lado: setup.side(),
        detalhes: format!(
            "RSI={:.1}, EMA_dist={:+.1}%",
            input.rsi, input.ema_distance_pct
        ),
        rsi: input.rsi,
        ema_distance_pct: input.ema_distance_pct,
    }
}

fn oversold_strength(rsi: f64) -> Forca {
    if rsi < 15.0 {
        Forca::MuitoAlta
    } else if rsi < 20.0 {
        Forca::Alta
    } else if rsi < 25.0 {
        Forca::Media
    } else {
        Forca::Baixa
    }
}

pub struct SetupDetector {
    rules: RuleSet<SetupInput, SetupClassification>,
}

impl Default for SetupDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SetupDetector {
    pub fn new() -> Self {
        let rules = RuleSet::new()
            .rule(
                "oversold_extremo",
                |i: &SetupInput| i.rsi < 30.0,
                |i: &SetupInput| found(Setup::OversoldExtremo, oversold_strength(i.rsi), 40, i),
            )
            .rule(
                "pullback_tendencia",
                |i: &SetupInput| i.rsi < 45.0 && within(i.ema_distance_pct, -3.0, 3.0),
                |i: &SetupInput| found(Setup::PullbackTendencia, Forca::Alta, 30, i),
            )
            .rule(
                "teste_suporte",
                |i: &SetupInput| within(i.ema_distance_pct, -2.0, 2.0),
                |i: &SetupInput| found(Setup::TesteSuporte, Forca::Media, 25, i),
            )
            .rule(
                "rompimento",
                |i: &SetupInput| i.ema_distance_pct > 5.0 && i.rsi < 70.0,
                |i: &SetupInput| found(Setup::Rompimento, Forca::Media, 20, i),
            )
            .rule(
                "resistencia",
                |i: &SetupInput| i.rsi > 70.0 && i.ema_distance_pct > 10.0,
                |i: &SetupInput| found(Setup::Resistencia, Forca::Alta, 25, i),
            )
            .rule(
                "exaustao",
                |i: &SetupInput| i.rsi > 65.0 && within(i.ema_distance_pct, 5.0, 15.0),
                |i: &SetupInput| found(Setup::Exaustao, Forca::Media, 30, i),
            );
        Self { rules }
    }

    pub fn detect(&self, rsi: f64, ema_distance_pct: f64) -> SetupClassification {
        let input = SetupInput {
            rsi,
            ema_distance_pct,
        };
        let result = self.rules.resolve_or_else(&input, |i| SetupClassification {
            setup: Setup::Nenhum,
            forca: Forca::Nenhuma,
            tamanho_sugerido: 0,
            lado: SetupSide::Nenhum,
            detalhes: format!(
                "RSI={:.1}, EMA_dist={:+.1}% - condições não atendidas",
                i.rsi, i.ema_distance_pct
            ),
            rsi: i.rsi,
            ema_distance_pct: i.ema_distance_pct,
        });
        info!(
            "Setup: {} (força {}, tamanho {}%) {}",
            result.setup, result.forca, result.tamanho_sugerido, result.detalhes
        );
        result
    }

    /// Every setup whose condition holds, in priority order.
    pub fn candidates(&self, rsi: f64, ema_distance_pct: f64) -> Vec<&'static str> {
        self.rules.matching_names(&SetupInput {
            rsi,
            ema_distance_pct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(rsi: f64, ema: f64) -> SetupClassification {
        SetupDetector::new().detect(rsi, ema)
    }

    #[test]
    fn oversold_beats_support_test() {
        let s = detect(25.0, 0.0);
        assert_eq!(s.setup, Setup::OversoldExtremo);
        assert_eq!(s.forca, Forca::Baixa);
        let names = SetupDetector::new().candidates(25.0, 0.0);
        assert_eq!(names, vec!["oversold_extremo", "pullback_tendencia", "teste_suporte"]);
    }

    #[test]
    fn oversold_strength_scale() {
        assert_eq!(detect(10.0, -25.0).forca, Forca::MuitoAlta);
        assert_eq!(detect(17.0, 0.0).forca, Forca::Alta);
        assert_eq!(detect(22.0, 0.0).forca, Forca::Media);
        assert_eq!(detect(20.0, -25.0).setup, Setup::OversoldExtremo);
    }

    #[test]
    fn pullback_and_support() {
        let s = detect(40.0, -3.0);
        assert_eq!(s.setup, Setup::PullbackTendencia);
        assert_eq!(s.tamanho_sugerido, 30);
        let s = detect(50.0, 2.0);
        assert_eq!(s.setup, Setup::TesteSuporte);
        assert_eq!(s.lado, SetupSide::Compra);
    }

    #[test]
    fn breakout_resistance_exhaustion() {
        assert_eq!(detect(60.0, 8.0).setup, Setup::Rompimento);
        let s = detect(75.0, 12.0);
        assert_eq!(s.setup, Setup::Resistencia);
        assert_eq!(s.lado, SetupSide::Venda);
        // 5.0 is not > 5, so the breakout rule misses and exhaustion fires
        assert_eq!(detect(68.0, 5.0).setup, Setup::Exaustao);
        assert_eq!(detect(72.0, 7.0).setup, Setup::Exaustao);
    }

    #[test]
    fn no_setup() {
        let s = detect(55.0, -10.0);
        assert_eq!(s.setup, Setup::Nenhum);
        assert_eq!(s.forca, Forca::Nenhuma);
        assert_eq!(s.tamanho_sugerido, 0);
        assert!(s.detalhes.ends_with("condições não atendidas"));
    }

    #[test]
    fn idempotent() {
        let d = SetupDetector::new();
        assert_eq!(d.detect(33.3, 1.1), d.detect(33.3, 1.1));
    }
}
