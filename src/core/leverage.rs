//! Leverage ceiling: MVRV base × score, monthly-RSI and health-factor factors,
//! clamped to [1, 3]; protection conditions force 0.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{round1, round2};
use crate::models::{AccountPosition, Cycle};

pub const MIN_LEVERAGE: f64 = 1.0;
pub const MAX_LEVERAGE: f64 = 3.0;
pub const HF_PROTECTION: f64 = 1.3;
pub const RISK_PROTECTION: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeverageInput {
    pub ciclo: Cycle,
    pub mvrv: f64,
    pub score: f64,
    pub rsi_mensal: f64,
    /// `None` when position data is unavailable; the factor is then neutral
    /// and the HF protection is skipped.
    pub health_factor: Option<f64>,
    pub risk_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageAdjustments {
    pub mercado: f64,
    pub rsi_mensal: f64,
    pub health_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageLimit {
    pub limite_alavancagem: f64,
    pub limite_base: f64,
    pub ajustes: LeverageAdjustments,
    pub justificativa: String,
    pub bloqueado: bool,
    pub protecoes: Vec<String>,
}

pub fn base_limit(mvrv: f64) -> f64 {
    if mvrv >= 3.0 {
        1.5
    } else if mvrv >= 2.0 {
        2.0
    } else if mvrv >= 0.0 {
        2.5
    } else {
        3.0
    }
}

pub fn score_factor(score: f64) -> f64 {
    if score >= 80.0 {
        1.1
    } else if score >= 60.0 {
        1.05
    } else if score >= 40.0 {
        1.0
    } else if score >= 20.0 {
        0.9
    } else {
        0.8
    }
}

pub fn rsi_monthly_factor(rsi: f64) -> f64 {
    if rsi <= 30.0 {
        1.15
    } else if rsi <= 40.0 {
        1.1
    } else if rsi <= 60.0 {
        1.0
    } else if rsi <= 70.0 {
        0.95
    } else {
        0.85
    }
}

pub fn health_factor_factor(hf: f64) -> f64 {
    if hf >= 2.5 {
        1.1
    } else if hf >= 2.0 {
        1.05
    } else if hf >= 1.5 {
        1.0
    } else if hf >= 1.2 {
        0.7
    } else {
        0.5
    }
}

fn justify(input: &LeverageInput, base: f64, limit: f64) -> String {
    let mut parts = vec![format!("Ciclo {} permite base {:.1}x", input.ciclo, base)];

    if input.score >= 70.0 {
        parts.push(format!("Score mercado alto ({:.1}) favorece aumento", input.score));
    } else if input.score <= 30.0 {
        parts.push(format!("Score mercado baixo ({:.1}) reduz limite", input.score));
    }

    if input.rsi_mensal <= 35.0 {
        parts.push(format!("RSI mensal baixo ({:.1}) permite mais alavancagem", input.rsi_mensal));
    } else if input.rsi_mensal >= 65.0 {
        parts.push(format!("RSI mensal alto ({:.1}) reduz limite", input.rsi_mensal));
    }

    if let Some(hf) = input.health_factor {
        if hf < 1.5 {
            parts.push(format!("Health Factor baixo ({:.2}) limita alavancagem", hf));
        } else if hf > 2.0 {
            parts.push(format!("Health Factor seguro ({:.2}) permite mais", hf));
        }
    }

    if limit > base {
        parts.push(format!("Limite aumentado para {:.1}x", limit));
    } else if limit < base {
        parts.push(format!("Limite reduzido para {:.1}x por segurança", limit));
    } else {
        parts.push(format!("Limite mantido em {:.1}x", limit));
    }

    format!("{}.", parts.join(". "))
}

/// Compute the permitted leverage. Never fails on finite input.
pub fn calculate_limit(input: &LeverageInput) -> LeverageLimit {
    let base = base_limit(input.mvrv);
    let ajustes = LeverageAdjustments {
        mercado: score_factor(input.score),
        rsi_mensal: rsi_monthly_factor(input.rsi_mensal),
        health_factor: input.health_factor.map(health_factor_factor).unwrap_or(1.0),
    };
    let raw = base * ajustes.mercado * ajustes.rsi_mensal * ajustes.health_factor;
    let clamped = round1(raw.clamp(MIN_LEVERAGE, MAX_LEVERAGE));

    let mut protecoes = Vec::new();
    if input.health_factor.is_some_and(|hf| hf < HF_PROTECTION) {
        protecoes.push("Health Factor crítico < 1.3".to_string());
    }
    if let Some(risk) = input.risk_score.filter(|r| *r < RISK_PROTECTION) {
        protecoes.push(format!("Score risco crítico < 40 (atual: {:.1})", risk));
    }

    let bloqueado = !protecoes.is_empty();
    let limite = if bloqueado { 0.0 } else { clamped };
    let justificativa = if bloqueado {
        format!("Alavancagem bloqueada: {}.", protecoes.join("; "))
    } else {
        justify(input, base, limite)
    };

    if bloqueado {
        warn!("Alavancagem bloqueada: {}", protecoes.join("; "));
    } else {
        info!("Limite de alavancagem: {:.1}x (base {:.1}x)", limite, base);
    }

    LeverageLimit {
        limite_alavancagem: limite,
        limite_base: base,
        ajustes,
        justificativa,
        bloqueado,
        protecoes,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeverageStatus {
    ReduzirAlavancagem,
    PodeAumentar,
    ManterAtual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageSituation {
    pub alavancagem_atual: f64,
    pub limite: f64,
    pub margem_disponivel: f64,
    pub pode_aumentar: bool,
    pub status: LeverageStatus,
    pub ajuste_necessario: bool,
    pub utilizacao_percent: f64,
}

/// Compare the current leverage with the computed limit.
pub fn situation(current: f64, limit: f64) -> LeverageSituation {
    let margem = (limit - current).max(0.0);
    let status = if current > limit {
        LeverageStatus::ReduzirAlavancagem
    } else if current < limit - 0.5 {
        LeverageStatus::PodeAumentar
    } else {
        LeverageStatus::ManterAtual
    };
    LeverageSituation {
        alavancagem_atual: round2(current),
        limite: limit,
        margem_disponivel: round2(margem),
        pode_aumentar: margem > 0.1,
        status,
        ajuste_necessario: status == LeverageStatus::ReduzirAlavancagem,
        utilizacao_percent: if limit > 0.0 {
            round1(current / limit * 100.0)
        } else {
            0.0
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    PodeAumentar,
    DeveReduzir,
    Adequada,
    NaoCalculavel,
}

/// What the position would look like at the permitted leverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSimulation {
    pub status: SimulationStatus,
    pub capital_liquido: f64,
    pub posicao_alvo: f64,
    pub valor_disponivel: f64,
    pub valor_a_reduzir: f64,
    pub capital_livre_percent: Option<f64>,
}

pub fn simulate(position: &AccountPosition, limit: f64) -> FinancialSimulation {
    let nav = position.net_asset_value();
    if nav <= 0.0 {
        return FinancialSimulation {
            status: SimulationStatus::NaoCalculavel,
            capital_liquido: round2(nav),
            posicao_alvo: 0.0,
            valor_disponivel: 0.0,
            valor_a_reduzir: 0.0,
            capital_livre_percent: position.free_capital_pct().map(round2),
        };
    }

    let target = limit * nav;
    let diff = target - position.total_collateral;
    let (status, disponivel, reduzir) = if diff > 0.0 {
        (SimulationStatus::PodeAumentar, diff, 0.0)
    } else if diff < 0.0 {
        (SimulationStatus::DeveReduzir, 0.0, -diff)
    } else {
        (SimulationStatus::Adequada, 0.0, 0.0)
    };

    FinancialSimulation {
        status,
        capital_liquido: round2(nav),
        posicao_alvo: round2(target),
        valor_disponivel: round2(disponivel),
        valor_a_reduzir: round2(reduzir),
        capital_livre_percent: position.free_capital_pct().map(round2),
    }
}
