//! Alert detectors over one evaluation.
//!
//! Each detector is a rule table whose matching rules all fire. The combined
//! list is de-duplicated by title and ordered critical-first.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::rules::RuleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Posicao,
    Volatilidade,
    Tatico,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Critico,
    Urgente,
    Informativo,
}

impl AlertCategory {
    /// 0 is the most urgent.
    pub fn priority(self) -> u8 {
        match self {
            AlertCategory::Critico => 0,
            AlertCategory::Urgente => 1,
            AlertCategory::Informativo => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub tipo: AlertKind,
    pub categoria: AlertCategory,
    pub prioridade: u8,
    pub titulo: String,
    pub mensagem: String,
    pub threshold: f64,
    pub valor_atual: f64,
    pub acao_recomendada: String,
    pub cooldown_minutos: u32,
}

impl Alert {
    #[allow(clippy::too_many_arguments)]
    fn new(
        tipo: AlertKind,
        categoria: AlertCategory,
        titulo: &str,
        mensagem: String,
        threshold: f64,
        valor_atual: f64,
        acao_recomendada: impl Into<String>,
        cooldown_minutos: u32,
    ) -> Self {
        Self {
            tipo,
            categoria,
            prioridade: categoria.priority(),
            titulo: titulo.to_string(),
            mensagem,
            threshold,
            valor_atual,
            acao_recomendada: acao_recomendada.into(),
            cooldown_minutos,
        }
    }
}

/// Counters for the dashboard widget plus the action of the top alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub criticos: usize,
    pub urgentes: usize,
    pub informativos: usize,
    pub total: usize,
    pub proxima_acao: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub alertas: Vec<Alert>,
    pub resumo: AlertSummary,
}

/// Values the detectors read. Position-derived fields are `None` when the
/// position is unavailable, which silences every position rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertInput {
    pub health_factor: Option<f64>,
    pub dist_liquidacao_pct: Option<f64>,
    pub risk_score: Option<f64>,
    pub ema_distance_pct: f64,
    pub rsi_diario: f64,
    pub score_mercado: f64,
    pub alavancagem_atual: Option<f64>,
    pub alavancagem_permitida: f64,
}

/// Share of the permitted leverage under which adding exposure is flagged.
pub const LEVERAGE_ROOM_SHARE: f64 = 0.7;

fn in_band(value: Option<f64>, lo: f64, hi: f64) -> bool {
    value.is_some_and(|v| v >= lo && v < hi)
}

fn position_detector() -> RuleSet<AlertInput, Alert> {
    RuleSet::new()
        .rule(
            "hf_critico",
            |i: &AlertInput| i.health_factor.is_some_and(|hf| hf < 1.3),
            |i: &AlertInput| {
                let hf = i.health_factor.unwrap_or_default();
                Alert::new(
                    AlertKind::Posicao,
                    AlertCategory::Critico,
                    "HEALTH FACTOR CRÍTICO",
                    format!("Health Factor {:.2} < 1.3 - Reduzir 70% AGORA", hf),
                    1.3,
                    hf,
                    "Reduzir 70% da posição imediatamente",
                    5,
                )
            },
        )
        .rule(
            "risco_extremo",
            |i: &AlertInput| i.risk_score.is_some_and(|s| s < 30.0),
            |i: &AlertInput| {
                let score = i.risk_score.unwrap_or_default();
                Alert::new(
                    AlertKind::Posicao,
                    AlertCategory::Critico,
                    "RISCO EXTREMO",
                    format!("Score Risco {:.1} < 30 - Fechar posição", score),
                    30.0,
                    score,
                    "Fechar posição completamente",
                    10,
                )
            },
        )
        .rule(
            "liquidacao_proxima",
            |i: &AlertInput| i.dist_liquidacao_pct.is_some_and(|d| d > 0.0 && d < 20.0),
            |i: &AlertInput| {
                let dist = i.dist_liquidacao_pct.unwrap_or_default();
                Alert::new(
                    AlertKind::Posicao,
                    AlertCategory::Critico,
                    "LIQUIDAÇÃO PRÓXIMA",
                    format!("Liquidação em -{:.1}% - Reduzir posição", dist),
                    20.0,
                    dist,
                    "Reduzir posição imediatamente",
                    5,
                )
            },
        )
        .rule(
            "hf_atencao",
            |i: &AlertInput| in_band(i.health_factor, 1.3, 1.5),
            |i: &AlertInput| {
                let hf = i.health_factor.unwrap_or_default();
                Alert::new(
                    AlertKind::Posicao,
                    AlertCategory::Urgente,
                    "ATENÇÃO: Health Factor",
                    format!("Health Factor {:.2} - Monitorar de perto", hf),
                    1.5,
                    hf,
                    "Preparar redução preventiva",
                    30,
                )
            },
        )
        .rule(
            "margem_apertando",
            |i: &AlertInput| in_band(i.dist_liquidacao_pct, 20.0, 30.0),
            |i: &AlertInput| {
                let dist = i.dist_liquidacao_pct.unwrap_or_default();
                Alert::new(
                    AlertKind::Posicao,
                    AlertCategory::Urgente,
                    "CUIDADO: Margem",
                    format!("Liquidação em -{:.1}% - Preparar redução", dist),
                    30.0,
                    dist,
                    "Considerar redução parcial",
                    30,
                )
            },
        )
        .rule(
            "score_risco_atencao",
            |i: &AlertInput| in_band(i.risk_score, 30.0, 50.0),
            |i: &AlertInput| {
                let score = i.risk_score.unwrap_or_default();
                Alert::new(
                    AlertKind::Posicao,
                    AlertCategory::Urgente,
                    "ALERTA: Score Risco",
                    format!("Score {:.1} - Posição ficando arriscada", score),
                    50.0,
                    score,
                    "Revisar estratégia posição",
                    60,
                )
            },
        )
}

fn volatility_detector() -> RuleSet<AlertInput, Alert> {
    RuleSet::new().rule(
        "realizar_sobrecomprado",
        |i: &AlertInput| i.ema_distance_pct > 20.0 && i.rsi_diario > 70.0,
        |i: &AlertInput| {
            Alert::new(
                AlertKind::Volatilidade,
                AlertCategory::Urgente,
                "REALIZAR POSIÇÃO",
                format!(
                    "EMA144 +{:.1}% + RSI {:.0} - Tomar 40%",
                    i.ema_distance_pct, i.rsi_diario
                ),
                20.0,
                i.ema_distance_pct,
                "Realizar 40% da posição",
                120,
            )
        },
    )
}

fn tactical_detector() -> RuleSet<AlertInput, Alert> {
    RuleSet::new()
        .rule(
            "compra_desconto",
            |i: &AlertInput| i.ema_distance_pct < -8.0 && i.rsi_diario < 40.0,
            |i: &AlertInput| {
                Alert::new(
                    AlertKind::Tatico,
                    AlertCategory::Informativo,
                    "COMPRA: Desconto + Oversold",
                    format!(
                        "EMA144 {:+.1}% + RSI {:.0} - Oportunidade compra",
                        i.ema_distance_pct, i.rsi_diario
                    ),
                    -8.0,
                    i.ema_distance_pct,
                    "Adicionar 35% à posição",
                    120,
                )
            },
        )
        .rule(
            "aumentar_alavancagem",
            |i: &AlertInput| {
                i.score_mercado > 70.0
                    && i.alavancagem_atual.is_some_and(|a| {
                        a > 0.0 && a < i.alavancagem_permitida * LEVERAGE_ROOM_SHARE
                    })
            },
            |i: &AlertInput| {
                let atual = i.alavancagem_atual.unwrap_or_default();
                let teto = i.alavancagem_permitida * LEVERAGE_ROOM_SHARE;
                Alert::new(
                    AlertKind::Tatico,
                    AlertCategory::Informativo,
                    "AUMENTAR: Espaço para Leverage",
                    format!(
                        "Score {:.1} + Leverage {:.1}x < {:.1}x",
                        i.score_mercado, atual, teto
                    ),
                    70.0,
                    i.score_mercado,
                    format!("Pode aumentar até {:.1}x", teto - atual),
                    180,
                )
            },
        )
        .rule(
            "dca_correcao",
            |i: &AlertInput| {
                i.ema_distance_pct > -15.0
                    && i.ema_distance_pct < -5.0
                    && i.rsi_diario > 35.0
                    && i.rsi_diario < 55.0
            },
            |i: &AlertInput| {
                Alert::new(
                    AlertKind::Tatico,
                    AlertCategory::Informativo,
                    "DCA: Acumulação Gradual",
                    format!(
                        "EMA144 {:+.1}% + RSI {:.0} - Zona DCA",
                        i.ema_distance_pct, i.rsi_diario
                    ),
                    -5.0,
                    i.ema_distance_pct,
                    "DCA pequeno em 3 dias",
                    360,
                )
            },
        )
}

/// Drop repeated titles, keeping the first, then order by priority. The sort
/// is stable so detector order breaks ties.
pub fn filter_alerts(alerts: Vec<Alert>) -> Vec<Alert> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Alert> = alerts
        .into_iter()
        .filter(|a| {
            let fresh = seen.insert(a.titulo.clone());
            if !fresh {
                debug!("Alerta duplicado descartado: {}", a.titulo);
            }
            fresh
        })
        .collect();
    unique.sort_by_key(|a| a.prioridade);
    unique
}

pub fn summarize(alerts: &[Alert]) -> AlertSummary {
    let count = |c: AlertCategory| alerts.iter().filter(|a| a.categoria == c).count();
    AlertSummary {
        criticos: count(AlertCategory::Critico),
        urgentes: count(AlertCategory::Urgente),
        informativos: count(AlertCategory::Informativo),
        total: alerts.len(),
        proxima_acao: alerts.first().map(|a| a.acao_recomendada.clone()),
    }
}

/// Position, volatility and tactical detectors, run in that order.
pub struct AlertEngine {
    detectors: Vec<(AlertKind, RuleSet<AlertInput, Alert>)>,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self {
            detectors: vec![
                (AlertKind::Posicao, position_detector()),
                (AlertKind::Volatilidade, volatility_detector()),
                (AlertKind::Tatico, tactical_detector()),
            ],
        }
    }
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detect(&self, input: &AlertInput) -> AlertReport {
        let detected: Vec<Alert> = self
            .detectors
            .iter()
            .flat_map(|(kind, rules)| {
                let found = rules.resolve_all(input);
                debug!("Detector {:?}: {} alertas", kind, found.len());
                found
            })
            .collect();
        let alertas = filter_alerts(detected);
        let resumo = summarize(&alertas);
        AlertReport { alertas, resumo }
    }
}
