//! Position risk score (0-100, higher is safer) from the lending position.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{round1, round2};
use crate::models::{AccountPosition, PositionData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionHealth {
    Critica,
    Arriscada,
    Aceitavel,
    Boa,
    Excelente,
}

impl PositionHealth {
    pub fn is_safe(self) -> bool {
        matches!(
            self,
            PositionHealth::Aceitavel | PositionHealth::Boa | PositionHealth::Excelente
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskAction {
    #[serde(rename = "REDUZIR_URGENTE_80%")]
    ReduzirUrgente80,
    #[serde(rename = "REDUZIR_50%")]
    Reduzir50,
    #[serde(rename = "REDUZIR_30%")]
    Reduzir30,
    #[serde(rename = "MONITORAR_ATENTO")]
    MonitorarAtento,
    #[serde(rename = "PODE_AUMENTAR")]
    PodeAumentar,
    #[serde(rename = "MONITORAR")]
    Monitorar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyMargin {
    Alta,
    Media,
    Baixa,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub health_factor: f64,
    pub saude_posicao: PositionHealth,
    pub posicao_segura: bool,
    pub acoes_necessarias: RiskAction,
    pub ltv_percent: f64,
    pub preco_liquidacao: Option<f64>,
    pub dist_liquidacao_percent: f64,
    pub margem_seguranca: SafetyMargin,
}

/// Risk layer output; unavailable when the position could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum RiskStatus {
    #[serde(rename = "disponível")]
    Disponivel(RiskAssessment),
    #[serde(rename = "indisponível")]
    Indisponivel { motivo: String },
}

impl RiskStatus {
    pub fn score(&self) -> Option<f64> {
        match self {
            RiskStatus::Disponivel(a) => Some(a.score),
            RiskStatus::Indisponivel { .. } => None,
        }
    }

    pub fn liquidation_distance_pct(&self) -> Option<f64> {
        match self {
            RiskStatus::Disponivel(a) => Some(a.dist_liquidacao_percent),
            RiskStatus::Indisponivel { .. } => None,
        }
    }
}

pub fn health_factor_score(hf: f64) -> f64 {
    if hf >= 2.0 {
        100.0
    } else if hf >= 1.5 {
        80.0 + (hf - 1.5) / 0.5 * 20.0
    } else if hf >= 1.2 {
        50.0 + (hf - 1.2) / 0.3 * 30.0
    } else if hf >= 1.1 {
        20.0 + (hf - 1.1) / 0.1 * 30.0
    } else {
        (hf * 20.0).max(0.0)
    }
}

/// `ltv_pct` is debt over collateral in percent.
pub fn ltv_score(ltv_pct: f64) -> f64 {
    if ltv_pct < 50.0 {
        100.0
    } else if ltv_pct < 70.0 {
        70.0 + (70.0 - ltv_pct) / 20.0 * 30.0
    } else if ltv_pct < 80.0 {
        30.0 + (80.0 - ltv_pct) / 10.0 * 40.0
    } else {
        ((90.0 - ltv_pct) * 3.0).max(0.0)
    }
}

/// Available borrows in USD.
pub fn margin_score(available: f64) -> f64 {
    if available >= 10_000.0 {
        100.0
    } else if available >= 5_000.0 {
        70.0 + (available - 5_000.0) / 5_000.0 * 30.0
    } else if available >= 1_000.0 {
        40.0 + (available - 1_000.0) / 4_000.0 * 30.0
    } else {
        (available / 1_000.0 * 40.0).max(0.0)
    }
}

/// HF .70, LTV .20, margin .10. Without reported borrows the margin
/// component drops out and the other two are renormalised.
pub fn risk_score(position: &AccountPosition) -> f64 {
    let mut parts = vec![
        (health_factor_score(position.health_factor), 0.7),
        (ltv_score(position.ltv_used_pct()), 0.2),
    ];
    if let Some(available) = position.available_borrows {
        parts.push((margin_score(available), 0.1));
    }
    let weight: f64 = parts.iter().map(|(_, w)| w).sum();
    let s = parts.iter().map(|(v, w)| v * w).sum::<f64>() / weight;
    s.clamp(0.0, 100.0)
}

pub fn position_health(hf: f64, score: f64) -> PositionHealth {
    if hf < 1.2 || score < 30.0 {
        PositionHealth::Critica
    } else if hf < 1.5 || score < 50.0 {
        PositionHealth::Arriscada
    } else if hf < 1.8 || score < 70.0 {
        PositionHealth::Aceitavel
    } else if hf < 2.5 || score < 85.0 {
        PositionHealth::Boa
    } else {
        PositionHealth::Excelente
    }
}

pub fn required_action(hf: f64, score: f64) -> RiskAction {
    if hf < 1.1 {
        RiskAction::ReduzirUrgente80
    } else if hf < 1.2 {
        RiskAction::Reduzir50
    } else if hf < 1.5 || score < 40.0 {
        RiskAction::Reduzir30
    } else if hf < 1.8 || score < 60.0 {
        RiskAction::MonitorarAtento
    } else if score > 80.0 {
        RiskAction::PodeAumentar
    } else {
        RiskAction::Monitorar
    }
}

pub fn safety_margin(distance_pct: f64) -> SafetyMargin {
    if distance_pct > 40.0 {
        SafetyMargin::Alta
    } else if distance_pct > 25.0 {
        SafetyMargin::Media
    } else {
        SafetyMargin::Baixa
    }
}

pub fn assess(position: &PositionData, btc_price: f64) -> RiskStatus {
    let p = match position {
        PositionData::Disponivel(p) => p,
        PositionData::Indisponivel { motivo } => {
            return RiskStatus::Indisponivel {
                motivo: motivo.clone(),
            }
        }
    };

    let score = risk_score(p);
    let hf = p.health_factor;
    let saude = position_health(hf, score);
    let distance = p.liquidation_distance_pct(btc_price);
    info!(
        "Risco: score {:.1}, HF {:.2}, saúde {:?}",
        score, hf, saude
    );

    RiskStatus::Disponivel(RiskAssessment {
        score: round1(score),
        health_factor: hf,
        saude_posicao: saude,
        posicao_segura: saude.is_safe(),
        acoes_necessarias: required_action(hf, score),
        ltv_percent: round2(p.ltv_used_pct()),
        preco_liquidacao: p.liquidation_price(btc_price).map(round2),
        dist_liquidacao_percent: round2(distance),
        margem_seguranca: safety_margin(distance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_position;

    #[test]
    fn hf_score_segments() {
        assert_eq!(health_factor_score(2.4), 100.0);
        assert!((health_factor_score(1.75) - 90.0).abs() < 1e-9);
        assert!((health_factor_score(1.35) - 65.0).abs() < 1e-6);
        assert!((health_factor_score(1.15) - 35.0).abs() < 1e-6);
        assert!((health_factor_score(0.5) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn ltv_and_margin_segments() {
        assert_eq!(ltv_score(40.0), 100.0);
        assert!((ltv_score(60.0) - 85.0).abs() < 1e-9);
        assert!((ltv_score(75.0) - 50.0).abs() < 1e-9);
        assert_eq!(ltv_score(95.0), 0.0);
        assert_eq!(margin_score(12_000.0), 100.0);
        assert!((margin_score(3_000.0) - 55.0).abs() < 1e-9);
        assert!((margin_score(500.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn healthy_position() {
        // hf 2.0 -> 100, ltv 60% -> 85, borrows 20k -> 100
        let p = make_position(2.0, 100_000.0, 60_000.0);
        let s = risk_score(&p);
        assert!((s - (70.0 + 17.0 + 10.0)).abs() < 1e-6);
        match assess(&PositionData::Disponivel(p), 100_000.0) {
            RiskStatus::Disponivel(a) => {
                assert_eq!(a.saude_posicao, PositionHealth::Boa);
                assert!(a.posicao_segura);
                assert_eq!(a.acoes_necessarias, RiskAction::PodeAumentar);
                assert_eq!(a.margem_seguranca, SafetyMargin::Alta);
            }
            other => panic!("expected assessment, got {:?}", other),
        }
    }

    #[test]
    fn missing_borrows_reweights_instead_of_zeroing() {
        // hf 2.6 -> 100, ltv 20% -> 100; margin unknown
        let mut p = make_position(2.6, 100_000.0, 20_000.0);
        p.available_borrows = None;
        assert!((risk_score(&p) - 100.0).abs() < 1e-9);

        // hf 1.75 -> 90, ltv 60% -> 85: (63 + 17) / 0.9
        let mut p = make_position(1.75, 100_000.0, 60_000.0);
        p.available_borrows = None;
        assert!((risk_score(&p) - 80.0 / 0.9).abs() < 1e-9);
    }

    #[test]
    fn labels() {
        assert_eq!(position_health(1.15, 90.0), PositionHealth::Critica);
        assert_eq!(position_health(3.0, 45.0), PositionHealth::Arriscada);
        assert_eq!(position_health(3.0, 90.0), PositionHealth::Excelente);
        assert_eq!(required_action(1.05, 90.0), RiskAction::ReduzirUrgente80);
        assert_eq!(required_action(2.0, 35.0), RiskAction::Reduzir30);
        assert_eq!(required_action(2.0, 70.0), RiskAction::Monitorar);
        assert_eq!(safety_margin(30.0), SafetyMargin::Media);
    }

    #[test]
    fn unavailable_position_passes_through() {
        let status = assess(&PositionData::unavailable("sem carteira"), 100_000.0);
        assert!(status.score().is_none());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "indisponível");
        assert_eq!(json["motivo"], "sem carteira");
    }
}
