//! Decision matrix: protection gates, then the cycle × setup table, then
//! context sizing.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::rules::RuleSet;
use crate::core::setup::SetupClassification;
use crate::models::{Action, Cycle, MatrixPhase, Priority, Setup, Urgency};

/// Size cap for table-driven decisions after context adjustment.
pub const MAX_TABLE_SIZE: u32 = 50;

/// Everything the gates and multipliers read. Position-derived fields are
/// `None` when the position is unavailable, which skips their gates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionContext {
    pub ciclo: Cycle,
    pub setup: Setup,
    pub mvrv: f64,
    pub rsi: f64,
    pub ema_distance_pct: f64,
    pub health_factor: Option<f64>,
    pub risk_score: Option<f64>,
    pub capital_livre_percent: Option<f64>,
    pub alavancagem_atual: Option<f64>,
    pub alavancagem_permitida: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextMultipliers {
    pub health_factor: f64,
    pub risco: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub acao: Action,
    pub tamanho_percent: u32,
    pub urgencia: Urgency,
    pub justificativa: String,
    pub override_ativo: bool,
    /// Gate or table cell that produced the decision.
    pub regra: String,
    pub familia_ciclo: MatrixPhase,
    pub setup: Setup,
    pub tamanho_base: u32,
    pub multiplicadores: Option<ContextMultipliers>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    acao: Action,
    tamanho: u32,
    prioridade: Priority,
}

fn cell(acao: Action, tamanho: u32, prioridade: Priority) -> Cell {
    Cell {
        acao,
        tamanho,
        prioridade,
    }
}

#[derive(Debug, Clone, Copy)]
struct CellKey {
    phase: MatrixPhase,
    setup: Setup,
}

fn gate(ctx: &DecisionContext, acao: Action, tamanho: u32, urgencia: Urgency, text: String, regra: &str) -> Decision {
    Decision {
        acao,
        tamanho_percent: tamanho,
        urgencia,
        justificativa: text,
        override_ativo: true,
        regra: regra.to_string(),
        familia_ciclo: ctx.ciclo.phase(),
        setup: ctx.setup,
        tamanho_base: tamanho,
        multiplicadores: None,
    }
}

fn gate_table() -> RuleSet<DecisionContext, Decision> {
    RuleSet::new()
        .rule(
            "hf_emergencia",
            |c: &DecisionContext| c.health_factor.is_some_and(|hf| hf < 1.1),
            |c: &DecisionContext| {
                let hf = c.health_factor.unwrap_or_default();
                gate(
                    c,
                    Action::EmergenciaLiquidar,
                    80,
                    Urgency::Critica,
                    format!("EMERGÊNCIA: HF {:.2} < 1.1 força liquidação imediata", hf),
                    "hf_emergencia",
                )
            },
        )
        .rule(
            "hf_critico",
            |c: &DecisionContext| c.health_factor.is_some_and(|hf| hf < 1.2),
            |c: &DecisionContext| {
                let hf = c.health_factor.unwrap_or_default();
                gate(
                    c,
                    Action::Reduzir,
                    50,
                    Urgency::Critica,
                    format!("Health Factor crítico: {:.2} < 1.2", hf),
                    "hf_critico",
                )
            },
        )
        .rule(
            "risco_critico",
            |c: &DecisionContext| c.risk_score.is_some_and(|r| r < 30.0),
            |c: &DecisionContext| {
                let risk = c.risk_score.unwrap_or_default();
                gate(
                    c,
                    Action::FecharTudo,
                    100,
                    Urgency::Critica,
                    format!("Score de risco crítico: {:.1} < 30", risk),
                    "risco_critico",
                )
            },
        )
        .rule(
            "flash_crash",
            |c: &DecisionContext| c.ema_distance_pct < -20.0,
            |c: &DecisionContext| {
                gate(
                    c,
                    Action::AvaliarLiquidez,
                    0,
                    Urgency::Alta,
                    format!("Flash crash detectado: {:.1}% abaixo EMA144", c.ema_distance_pct.abs()),
                    "flash_crash",
                )
            },
        )
        .rule(
            "capital_insuficiente",
            |c: &DecisionContext| c.capital_livre_percent.is_some_and(|p| p < 5.0),
            |c: &DecisionContext| {
                let pct = c.capital_livre_percent.unwrap_or_default();
                gate(
                    c,
                    Action::BloqueadoCapital,
                    0,
                    Urgency::Media,
                    format!("Capital livre insuficiente: {:.1}% < 5%", pct),
                    "capital_insuficiente",
                )
            },
        )
        .rule(
            "alavancagem_limite",
            |c: &DecisionContext| c.alavancagem_atual.is_some_and(|a| a >= c.alavancagem_permitida),
            |c: &DecisionContext| {
                let atual = c.alavancagem_atual.unwrap_or_default();
                gate(
                    c,
                    Action::AjustarAlavancagem,
                    0,
                    Urgency::Alta,
                    format!(
                        "Alavancagem no limite: {:.1}x >= {:.1}x",
                        atual, c.alavancagem_permitida
                    ),
                    "alavancagem_limite",
                )
            },
        )
        .rule(
            "oportunidade_historica",
            |c: &DecisionContext| c.mvrv < 0.5 && c.rsi < 20.0,
            |c: &DecisionContext| {
                gate(
                    c,
                    Action::AllInHistorico,
                    100,
                    Urgency::Maxima,
                    format!("Oportunidade histórica: MVRV {:.2} + RSI {:.1}", c.mvrv, c.rsi),
                    "oportunidade_historica",
                )
            },
        )
}

const BUY_SETUPS: &[Setup] = &[
    Setup::OversoldExtremo,
    Setup::PullbackTendencia,
    Setup::TesteSuporte,
    Setup::Rompimento,
];
const RESISTENCIA: &[Setup] = &[Setup::Resistencia];
const OVERSOLD: &[Setup] = &[Setup::OversoldExtremo];
const PULLBACK: &[Setup] = &[Setup::PullbackTendencia];
const SUPORTE: &[Setup] = &[Setup::TesteSuporte];
const ROMPIMENTO: &[Setup] = &[Setup::Rompimento];
const PULLBACK_OU_SUPORTE: &[Setup] = &[Setup::PullbackTendencia, Setup::TesteSuporte];

fn cell_table() -> RuleSet<CellKey, Cell> {
    use Action::*;
    use MatrixPhase::*;

    // (rule, phase, setups or None for "any other", cell)
    // EXAUSTAO has no cell of its own and lands on each phase's default row.
    let rows: Vec<(&'static str, MatrixPhase, Option<&'static [Setup]>, Cell)> = vec![
        ("bottom_oversold", Bottom, Some(OVERSOLD), cell(Comprar, 50, Priority::Maxima)),
        ("bottom_pullback", Bottom, Some(PULLBACK_OU_SUPORTE), cell(Comprar, 40, Priority::Maxima)),
        ("bottom_rompimento", Bottom, Some(ROMPIMENTO), cell(Comprar, 35, Priority::Alta)),
        ("bottom_default", Bottom, None, cell(Comprar, 30, Priority::Alta)),
        ("acumulacao_oversold", MatrixPhase::Acumulacao, Some(OVERSOLD), cell(Comprar, 40, Priority::Maxima)),
        ("acumulacao_pullback", MatrixPhase::Acumulacao, Some(PULLBACK), cell(Comprar, 35, Priority::Alta)),
        ("acumulacao_rompimento", MatrixPhase::Acumulacao, Some(ROMPIMENTO), cell(Comprar, 25, Priority::Alta)),
        ("acumulacao_suporte", MatrixPhase::Acumulacao, Some(SUPORTE), cell(Comprar, 30, Priority::Alta)),
        ("acumulacao_resistencia", MatrixPhase::Acumulacao, Some(RESISTENCIA), cell(Hold, 0, Priority::Baixa)),
        ("acumulacao_default", MatrixPhase::Acumulacao, None, cell(Comprar, 20, Priority::Media)),
        ("bull_inicial_oversold", MatrixPhase::BullInicial, Some(OVERSOLD), cell(Comprar, 30, Priority::Alta)),
        ("bull_inicial_pullback", MatrixPhase::BullInicial, Some(PULLBACK), cell(Comprar, 25, Priority::Media)),
        ("bull_inicial_suporte", MatrixPhase::BullInicial, Some(SUPORTE), cell(Comprar, 20, Priority::Media)),
        ("bull_inicial_rompimento", MatrixPhase::BullInicial, Some(ROMPIMENTO), cell(Comprar, 15, Priority::Media)),
        ("bull_inicial_resistencia", MatrixPhase::BullInicial, Some(RESISTENCIA), cell(Realizar, 15, Priority::Baixa)),
        ("bull_inicial_default", MatrixPhase::BullInicial, None, cell(Hold, 0, Priority::Baixa)),
        ("bull_maduro_oversold", BullMaduro, Some(OVERSOLD), cell(Comprar, 20, Priority::Media)),
        ("bull_maduro_pullback", BullMaduro, Some(PULLBACK), cell(Comprar, 15, Priority::Baixa)),
        ("bull_maduro_resistencia", BullMaduro, Some(RESISTENCIA), cell(Realizar, 30, Priority::Alta)),
        ("bull_maduro_rompimento", BullMaduro, Some(ROMPIMENTO), cell(Realizar, 20, Priority::Media)),
        ("bull_maduro_default", BullMaduro, None, cell(Hold, 0, Priority::Media)),
        ("euforia_compra", EuforiaTopo, Some(BUY_SETUPS), cell(Ignorar, 0, Priority::Nenhuma)),
        ("euforia_resistencia", EuforiaTopo, Some(RESISTENCIA), cell(Realizar, 40, Priority::Maxima)),
        ("euforia_default", EuforiaTopo, None, cell(Realizar, 30, Priority::Alta)),
        ("bear", Bear, None, cell(Ignorar, 0, Priority::Nenhuma)),
        ("indefinido", MatrixPhase::Indefinido, None, cell(Hold, 0, Priority::Baixa)),
    ];

    rows.into_iter()
        .fold(RuleSet::new(), |table, (name, phase, setups, out)| {
            table.rule(
                name,
                move |k: &CellKey| k.phase == phase && setups.map_or(true, |s| s.contains(&k.setup)),
                move |_: &CellKey| out,
            )
        })
}

/// Health-factor sizing multiplier; neutral without a position.
pub fn hf_multiplier(hf: Option<f64>) -> f64 {
    match hf {
        None => 1.0,
        Some(hf) if hf > 2.0 => 1.2,
        Some(hf) if hf > 1.5 => 1.0,
        Some(hf) if hf > 1.3 => 0.8,
        Some(_) => 0.5,
    }
}

/// Risk-score sizing multiplier; neutral without a position.
pub fn risk_multiplier(risk: Option<f64>) -> f64 {
    match risk {
        None => 1.0,
        Some(r) if r > 80.0 => 1.1,
        Some(r) if r > 60.0 => 1.0,
        Some(r) if r > 40.0 => 0.9,
        Some(_) => 0.6,
    }
}

/// Truncate after each multiplier, then cap.
pub fn adjust_size(base: u32, m: ContextMultipliers) -> u32 {
    let after_hf = (base as f64 * m.health_factor).floor();
    let after_risk = (after_hf * m.risco).floor();
    (after_risk.max(0.0) as u32).min(MAX_TABLE_SIZE)
}

fn justification(acao: Action, tamanho: u32) -> String {
    match acao {
        Action::Comprar => format!("Ciclo permite compras com setup favorável. Tamanho: {}%", tamanho),
        Action::Realizar => format!("Sinais de resistência/exaustão detectados. Realizar: {}%", tamanho),
        Action::Ignorar => "Ciclo não permite compras. Focar em realizações".to_string(),
        _ => "Aguardar setup mais claro ou melhores condições".to_string(),
    }
}

pub struct DecisionMatrix {
    gates: RuleSet<DecisionContext, Decision>,
    cells: RuleSet<CellKey, Cell>,
}

impl Default for DecisionMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionMatrix {
    pub fn new() -> Self {
        Self {
            gates: gate_table(),
            cells: cell_table(),
        }
    }

    pub fn decide(&self, ctx: &DecisionContext) -> Decision {
        if let Some(decision) = self.gates.resolve(ctx) {
            warn!(
                "Gate ativo: {} -> {} {}%",
                decision.regra, decision.acao, decision.tamanho_percent
            );
            return decision;
        }

        let key = CellKey {
            phase: ctx.ciclo.phase(),
            setup: ctx.setup,
        };
        // every phase ends with a catch-all row
        let (regra, base) = match self.cells.first_match(&key) {
            Some(rule) => (rule.name, rule.apply(&key)),
            None => ("indefinido", cell(Action::Hold, 0, Priority::Baixa)),
        };

        let multiplicadores = ContextMultipliers {
            health_factor: hf_multiplier(ctx.health_factor),
            risco: risk_multiplier(ctx.risk_score),
        };
        let tamanho = adjust_size(base.tamanho, multiplicadores);

        let decision = Decision {
            acao: base.acao,
            tamanho_percent: tamanho,
            urgencia: base.prioridade.urgency(),
            justificativa: justification(base.acao, tamanho),
            override_ativo: false,
            regra: regra.to_string(),
            familia_ciclo: key.phase,
            setup: ctx.setup,
            tamanho_base: base.tamanho,
            multiplicadores: Some(multiplicadores),
        };
        info!(
            "Decisão: {} {}% ({} × {}, base {}%)",
            decision.acao, decision.tamanho_percent, key.phase, ctx.setup, base.tamanho
        );
        decision
    }

    /// Convenience wrapper taking the setup detector output.
    pub fn decide_for(&self, ctx: DecisionContext, setup: &SetupClassification) -> Decision {
        self.decide(&DecisionContext {
            setup: setup.setup,
            ..ctx
        })
    }
}
