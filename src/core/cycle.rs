//! Cycle classifier: (score, MVRV, NUPL) -> named market cycle.
//!
//! Resolution order is fixed: NUPL override, MVRV override, extreme-high
//! score table, extreme-low score table, then the 10-point band table. Every
//! table is a `RuleSet`, so precedence is the order rules are pushed.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::rules::{within, RuleSet};
use crate::models::{Cycle, CycleOverride, Urgency};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleInput {
    pub score: f64,
    pub mvrv: f64,
    pub nupl: f64,
}

/// Result of one classification. Always present; undefined cases carry a
/// diagnostic in `caracteristicas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleClassification {
    pub ciclo: Cycle,
    pub confianca: u8,
    #[serde(rename = "override")]
    pub override_tag: Option<CycleOverride>,
    pub caracteristicas: String,
    pub estrategia: String,
    pub tamanho_posicao: Option<String>,
    /// Name of the rule that produced the cycle.
    pub regra: String,
}

/// Positioning suggestion attached to each named cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositioningStrategy {
    pub posicionamento: String,
    pub tamanho: String,
    pub alavancagem_sugerida: f64,
    pub urgencia: Urgency,
}

struct Profile {
    caracteristicas: &'static str,
    estrategia: &'static str,
    tamanho: &'static str,
}

fn profile(cycle: Cycle) -> Profile {
    let (caracteristicas, estrategia, tamanho) = match cycle {
        Cycle::Capitulacao => ("Pânico total, fundos fechando", "All-in histórico", "50-75%"),
        Cycle::BearProfundo => ("Desespero, mídia negativa", "Acumular forte", "30-40%"),
        Cycle::TopoMania => (
            "Euforia extrema, notícias mainstream",
            "Sair 80-100%",
            "Realizar 60-80%",
        ),
        Cycle::ReversaoEpica => ("V-bottom histórico", "Compra máxima", "Compra máxima"),
        Cycle::Euforia => ("Parabólico, retail all-in", "Sair 50-80%", "Realizar 40-50%"),
        Cycle::BullForte => ("Momentum poderoso, notícias positivas", "Hold + Stops", "10-20%"),
        Cycle::OportunidadeGeracional => (
            "Capitulação com reversão técnica",
            "All-in + Alavancagem",
            "Compra máxima",
        ),
        Cycle::BullConfirmado => ("Tendência clara, FOMO inicial", "Hold + Comprar dips", "20-30%"),
        Cycle::NovoCiclo => (
            "Saindo de bear, reversão confirmada",
            "Alavancagem máxima",
            "Alavancagem máxima",
        ),
        Cycle::BullInicial => ("Rompimentos, otimismo crescente", "Comprar rallies", "25-35%"),
        Cycle::SaidaAcumulacao => ("Volume crescente, breakouts", "Posição completa", "25-35%"),
        Cycle::NeutroAlta => ("Indecisão com viés positivo", "Posição base", "10-15%"),
        Cycle::Neutro => ("Consolidação, baixa volatilidade", "Aguardar sinal", "10-15%"),
        Cycle::CorrecaoBull => ("Pullback em tendência alta", "Comprar correção", "20-30%"),
        Cycle::Acumulacao => ("Lateralização, volume baixo", "Pequenas entradas", "10-20%"),
        Cycle::BullTardio => (
            "Ganância crescente, leverage alta",
            "Realizar gradual",
            "Realizar 20-30%",
        ),
        Cycle::Recuperacao => (
            "Bear acabando, sentimento melhorando",
            "DCA conservador",
            "20-30%",
        ),
        Cycle::Distribuicao => (
            "Smart money vendendo, retail comprando",
            "Realizar 60%+",
            "Realizar 60-80%",
        ),
        Cycle::ScoreExtremoIndefinido | Cycle::ScoreBaixoIndefinido => {
            ("", "Aguardar clareza", "")
        }
        Cycle::Indefinido => ("", "Aguardar clareza ou usar análise manual", "Conservador 5-10%"),
    };
    Profile {
        caracteristicas,
        estrategia,
        tamanho,
    }
}

fn named(cycle: Cycle, confianca: u8, override_tag: Option<CycleOverride>, regra: &str) -> CycleClassification {
    let p = profile(cycle);
    CycleClassification {
        ciclo: cycle,
        confianca,
        override_tag,
        caracteristicas: p.caracteristicas.to_string(),
        estrategia: p.estrategia.to_string(),
        tamanho_posicao: (!p.tamanho.is_empty()).then(|| p.tamanho.to_string()),
        regra: regra.to_string(),
    }
}

fn undefined_extreme(cycle: Cycle, label: &str, input: &CycleInput) -> CycleClassification {
    let mut c = named(cycle, 60, Some(CycleOverride::ScoreExtremoIncompleto), "score_extremo_indefinido");
    c.caracteristicas = format!(
        "{} mas MVRV:{:.2} NUPL:{:.3} fora matriz",
        label, input.mvrv, input.nupl
    );
    c
}

/// Explain why no band rule matched.
pub fn diagnose(input: &CycleInput) -> String {
    let mut parts = Vec::new();
    if input.score < 20.0 || input.score > 100.0 {
        parts.push(format!("Score {:.1} fora do range válido", input.score));
    }
    if input.mvrv < 0.5 || input.mvrv > 5.0 {
        parts.push(format!("MVRV {:.2} em valor extremo", input.mvrv));
    }
    if input.nupl < -0.2 || input.nupl > 0.8 {
        parts.push(format!("NUPL {:.3} em valor extremo", input.nupl));
    }
    if parts.is_empty() {
        "Combinação não prevista na matriz".to_string()
    } else {
        parts.join(" | ")
    }
}

fn indefinido(input: &CycleInput) -> CycleClassification {
    let mut c = named(Cycle::Indefinido, 30, None, "fallback");
    c.caracteristicas = format!("Condições atípicas: {}", diagnose(input));
    c
}

type CycleTable = RuleSet<CycleInput, CycleClassification>;

/// `lo <= score < hi`
fn in_band(input: &CycleInput, lo: f64, hi: f64) -> bool {
    input.score >= lo && input.score < hi
}

pub struct CycleClassifier {
    overrides: CycleTable,
    extreme_high: CycleTable,
    extreme_low: CycleTable,
    bands: CycleTable,
}

impl Default for CycleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleClassifier {
    pub fn new() -> Self {
        let overrides = RuleSet::new()
            .rule(
                "nupl_negativo",
                |i: &CycleInput| i.nupl < 0.0,
                |i: &CycleInput| {
                    if i.score <= 20.0 {
                        named(Cycle::Capitulacao, 95, Some(CycleOverride::NuplNegativo), "nupl_negativo")
                    } else {
                        named(Cycle::BearProfundo, 90, Some(CycleOverride::NuplNegativo), "nupl_negativo")
                    }
                },
            )
            .rule(
                "mvrv_extremo",
                |i: &CycleInput| i.mvrv > 4.0,
                |_: &CycleInput| named(Cycle::TopoMania, 95, Some(CycleOverride::MvrvExtremo), "mvrv_extremo"),
            );

        let extreme_high = RuleSet::new()
            .rule(
                "reversao_epica",
                |i: &CycleInput| i.mvrv < 0.8 && i.nupl < 0.0,
                |_: &CycleInput| named(Cycle::ReversaoEpica, 95, Some(CycleOverride::ScoreExtremo), "reversao_epica"),
            )
            .rule(
                "euforia",
                |i: &CycleInput| i.mvrv > 2.5 && i.nupl > 0.65,
                |_: &CycleInput| named(Cycle::Euforia, 90, Some(CycleOverride::ScoreExtremo), "euforia"),
            );

        let extreme_low = RuleSet::new()
            .rule(
                "capitulacao",
                |i: &CycleInput| i.mvrv < 1.0 && i.nupl < 0.0,
                |_: &CycleInput| named(Cycle::Capitulacao, 90, Some(CycleOverride::ScoreExtremo), "capitulacao"),
            )
            .rule(
                "topo_mania",
                |i: &CycleInput| i.mvrv > 4.0 && i.nupl > 0.75,
                |_: &CycleInput| named(Cycle::TopoMania, 85, Some(CycleOverride::ScoreExtremo), "topo_mania"),
            );

        Self {
            overrides,
            extreme_high,
            extreme_low,
            bands: band_table(),
        }
    }

    /// Classify a snapshot. Never fails; out-of-table inputs become
    /// `INDEFINIDO` (or the score-extreme undefined variants).
    pub fn classify(&self, score: f64, mvrv: f64, nupl: f64) -> CycleClassification {
        let input = CycleInput { score, mvrv, nupl };
        let result = self.resolve(&input);
        info!(
            "Ciclo: {} (confiança {}%, regra {}) score={:.1} mvrv={:.2} nupl={:.3}",
            result.ciclo, result.confianca, result.regra, score, mvrv, nupl
        );
        result
    }

    fn resolve(&self, input: &CycleInput) -> CycleClassification {
        if let Some(c) = self.overrides.resolve(input) {
            return c;
        }
        if input.score >= 90.0 {
            return self
                .extreme_high
                .resolve_or_else(input, |i| undefined_extreme(Cycle::ScoreExtremoIndefinido, "Score 90+", i));
        }
        if input.score <= 20.0 {
            return self
                .extreme_low
                .resolve_or_else(input, |i| undefined_extreme(Cycle::ScoreBaixoIndefinido, "Score ≤20", i));
        }
        self.bands.resolve_or_else(input, indefinido)
    }

    /// Names of band rules, highest band first.
    pub fn band_rule_names(&self) -> Vec<&'static str> {
        self.bands.names()
    }
}

fn band_table() -> CycleTable {
    // (band lo, band hi, name, cycle, confidence, mvrv range, nupl range)
    // `None` bounds are open-ended.
    type Range = (Option<f64>, Option<f64>);
    const BANDS: &[(f64, f64, &str, Cycle, u8, Range, Range)] = &[
        (80.0, 90.0, "bull_forte", Cycle::BullForte, 85, (Some(2.0), Some(3.0)), (Some(0.5), Some(0.7))),
        (80.0, 90.0, "oportunidade_geracional", Cycle::OportunidadeGeracional, 85, (None, Some(1.0)), (None, Some(0.1))),
        (70.0, 80.0, "bull_confirmado", Cycle::BullConfirmado, 80, (Some(1.2), Some(2.2)), (Some(0.35), Some(0.55))),
        (70.0, 80.0, "novo_ciclo", Cycle::NovoCiclo, 85, (None, Some(1.2)), (None, Some(0.25))),
        (60.0, 70.0, "bull_inicial", Cycle::BullInicial, 75, (Some(1.5), Some(2.5)), (Some(0.3), Some(0.5))),
        (60.0, 70.0, "saida_acumulacao", Cycle::SaidaAcumulacao, 75, (Some(1.0), Some(1.8)), (Some(0.2), Some(0.35))),
        (50.0, 60.0, "neutro_alta", Cycle::NeutroAlta, 70, (Some(1.8), Some(2.5)), (Some(0.35), Some(0.5))),
        (50.0, 60.0, "neutro", Cycle::Neutro, 65, (Some(1.5), Some(2.2)), (Some(0.25), Some(0.4))),
        (40.0, 50.0, "correcao_bull", Cycle::CorrecaoBull, 75, (Some(2.0), Some(3.0)), (Some(0.4), Some(0.55))),
        (40.0, 50.0, "acumulacao", Cycle::Acumulacao, 70, (Some(1.2), Some(2.0)), (Some(0.1), Some(0.35))),
        (30.0, 40.0, "bull_tardio", Cycle::BullTardio, 75, (Some(2.5), Some(3.5)), (Some(0.5), Some(0.65))),
        (30.0, 40.0, "recuperacao", Cycle::Recuperacao, 70, (Some(1.0), Some(1.5)), (Some(0.0), Some(0.25))),
        (20.0, 30.0, "distribuicao", Cycle::Distribuicao, 80, (Some(3.0), Some(4.0)), (Some(0.6), Some(0.75))),
        (20.0, 30.0, "bear_profundo", Cycle::BearProfundo, 75, (Some(0.8), Some(1.2)), (Some(-0.1), Some(0.1))),
    ];

    // Closed bounds are inclusive; open upper bounds in the "below" rules
    // are strict (`mvrv < 1.0`).
    fn fits(v: f64, range: Range) -> bool {
        match range {
            (Some(lo), Some(hi)) => within(v, lo, hi),
            (None, Some(hi)) => v < hi,
            (Some(lo), None) => v >= lo,
            (None, None) => true,
        }
    }

    BANDS.iter().fold(RuleSet::new(), |table, &(lo, hi, name, cycle, conf, mvrv_r, nupl_r)| {
        table.rule(
            name,
            move |i: &CycleInput| in_band(i, lo, hi) && fits(i.mvrv, mvrv_r) && fits(i.nupl, nupl_r),
            move |_: &CycleInput| named(cycle, conf, None, name),
        )
    })
}

/// Positioning suggestion for a cycle; cycles without their own row use
/// the NEUTRO row.
pub fn positioning_strategy(cycle: Cycle) -> PositioningStrategy {
    let (posicionamento, tamanho, alavancagem, urgencia) = match cycle {
        Cycle::Capitulacao => ("COMPRA_MAXIMA", "50-75%", 3.0, Urgency::Extrema),
        Cycle::BearProfundo => ("ACUMULAR", "30-40%", 2.5, Urgency::Alta),
        Cycle::Recuperacao => ("DCA_CONSERVADOR", "20-30%", 2.0, Urgency::Media),
        Cycle::Acumulacao => ("ENTRADAS_PEQUENAS", "10-20%", 2.0, Urgency::Baixa),
        Cycle::BullInicial => ("COMPRAR_RALLIES", "25-35%", 2.5, Urgency::Media),
        Cycle::BullConfirmado => ("HOLD_E_COMPRAR_DIPS", "20-30%", 2.0, Urgency::Media),
        Cycle::BullForte => ("HOLD_COM_STOPS", "10-20%", 1.5, Urgency::Baixa),
        Cycle::Euforia => ("REALIZAR_LUCROS", "REDUZIR_50-80%", 1.0, Urgency::Alta),
        Cycle::TopoMania => ("SAIR_POSICAO", "REDUZIR_80-100%", 0.0, Urgency::Extrema),
        _ => ("AGUARDAR", "10-15%", 1.5, Urgency::Baixa),
    };
    PositioningStrategy {
        posicionamento: posicionamento.to_string(),
        tamanho: tamanho.to_string(),
        alavancagem_sugerida: alavancagem,
        urgencia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(score: f64, mvrv: f64, nupl: f64) -> CycleClassification {
        CycleClassifier::new().classify(score, mvrv, nupl)
    }

    #[test]
    fn normal_band_neutro_alta() {
        let c = classify(55.0, 2.0, 0.4);
        assert_eq!(c.ciclo, Cycle::NeutroAlta);
        assert_eq!(c.confianca, 70);
        assert!(c.override_tag.is_none());
        assert_eq!(c.regra, "neutro_alta");
    }

    #[test]
    fn second_rule_in_band() {
        // mvrv 1.6 misses NEUTRO_ALTA (1.8-2.5) but fits NEUTRO (1.5-2.2)
        let c = classify(55.0, 1.6, 0.3);
        assert_eq!(c.ciclo, Cycle::Neutro);
        assert_eq!(c.confianca, 65);
    }

    #[test]
    fn nupl_override_capitulacao() {
        let c = classify(15.0, 0.6, -0.3);
        assert_eq!(c.ciclo, Cycle::Capitulacao);
        assert_eq!(c.override_tag, Some(CycleOverride::NuplNegativo));
        assert_eq!(c.confianca, 95);
    }

    #[test]
    fn nupl_override_beats_mvrv_override() {
        for score in [5.0, 20.0, 20.1, 50.0, 95.0] {
            let c = classify(score, 5.0, -0.1);
            assert_ne!(c.ciclo, Cycle::TopoMania);
            assert!(matches!(c.ciclo, Cycle::Capitulacao | Cycle::BearProfundo));
            assert_eq!(c.override_tag, Some(CycleOverride::NuplNegativo));
        }
    }

    #[test]
    fn mvrv_override() {
        let c = classify(50.0, 4.5, 0.7);
        assert_eq!(c.ciclo, Cycle::TopoMania);
        assert_eq!(c.override_tag, Some(CycleOverride::MvrvExtremo));
    }

    #[test]
    fn extreme_high_score() {
        let c = classify(92.0, 3.0, 0.7);
        assert_eq!(c.ciclo, Cycle::Euforia);
        assert_eq!(c.override_tag, Some(CycleOverride::ScoreExtremo));

        let c = classify(92.0, 1.5, 0.3);
        assert_eq!(c.ciclo, Cycle::ScoreExtremoIndefinido);
        assert_eq!(c.confianca, 60);
        assert_eq!(c.override_tag, Some(CycleOverride::ScoreExtremoIncompleto));
        assert!(c.caracteristicas.contains("MVRV:1.50"));
    }

    #[test]
    fn extreme_low_score_without_match() {
        let c = classify(10.0, 2.0, 0.3);
        assert_eq!(c.ciclo, Cycle::ScoreBaixoIndefinido);
        assert!(c.caracteristicas.starts_with("Score ≤20"));
    }

    #[test]
    fn band_boundaries_are_half_open() {
        // 80 belongs to the 80-90 band, 79.99 to 70-80
        assert_eq!(classify(80.0, 2.5, 0.6).ciclo, Cycle::BullForte);
        assert_eq!(classify(79.99, 2.0, 0.4).ciclo, Cycle::BullConfirmado);
        // inclusive sub-range edges
        assert_eq!(classify(65.0, 2.5, 0.5).ciclo, Cycle::BullInicial);
    }

    #[test]
    fn fallback_indefinido_with_diagnostic() {
        let c = classify(55.0, 0.3, 0.9);
        assert_eq!(c.ciclo, Cycle::Indefinido);
        assert_eq!(c.confianca, 30);
        assert!(c.caracteristicas.contains("MVRV 0.30 em valor extremo"));
        assert!(c.caracteristicas.contains(" | NUPL 0.900 em valor extremo"));

        let c = classify(55.0, 3.0, 0.6);
        assert_eq!(c.ciclo, Cycle::Indefinido);
        assert!(c.caracteristicas.ends_with("Combinação não prevista na matriz"));
    }

    #[test]
    fn total_coverage_and_idempotence() {
        let classifier = CycleClassifier::new();
        let mut score = 0.0;
        while score <= 100.0 {
            let mut mvrv = -1.0;
            while mvrv <= 10.0 {
                let mut nupl = -1.0;
                while nupl <= 1.0 {
                    let a = classifier.classify(score, mvrv, nupl);
                    let b = classifier.classify(score, mvrv, nupl);
                    assert_eq!(a, b);
                    assert!(a.confianca <= 100);
                    nupl += 0.1;
                }
                mvrv += 0.5;
            }
            score += 2.5;
        }
    }

    #[test]
    fn band_table_order() {
        let names = CycleClassifier::new().band_rule_names();
        assert_eq!(names.len(), 14);
        assert_eq!(names[0], "bull_forte");
        assert_eq!(names[13], "bear_profundo");
    }

    #[test]
    fn positioning_rows() {
        let p = positioning_strategy(Cycle::Capitulacao);
        assert_eq!(p.posicionamento, "COMPRA_MAXIMA");
        assert_eq!(p.urgencia, Urgency::Extrema);
        assert_eq!(positioning_strategy(Cycle::TopoMania).alavancagem_sugerida, 0.0);
        assert_eq!(positioning_strategy(Cycle::Distribuicao).posicionamento, "AGUARDAR");
    }
}
