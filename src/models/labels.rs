use serde::{Deserialize, Serialize};
use std::fmt;

/// Named market-cycle phase produced by the cycle classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cycle {
    #[serde(rename = "CAPITULAÇÃO")]
    Capitulacao,
    #[serde(rename = "BEAR_PROFUNDO")]
    BearProfundo,
    #[serde(rename = "RECUPERAÇÃO")]
    Recuperacao,
    #[serde(rename = "ACUMULAÇÃO")]
    Acumulacao,
    #[serde(rename = "SAÍDA_ACUMULAÇÃO")]
    SaidaAcumulacao,
    #[serde(rename = "NOVO_CICLO")]
    NovoCiclo,
    #[serde(rename = "OPORTUNIDADE_GERACIONAL")]
    OportunidadeGeracional,
    #[serde(rename = "REVERSÃO_ÉPICA")]
    ReversaoEpica,
    #[serde(rename = "NEUTRO")]
    Neutro,
    #[serde(rename = "NEUTRO_ALTA")]
    NeutroAlta,
    #[serde(rename = "CORREÇÃO_BULL")]
    CorrecaoBull,
    #[serde(rename = "BULL_INICIAL")]
    BullInicial,
    #[serde(rename = "BULL_CONFIRMADO")]
    BullConfirmado,
    #[serde(rename = "BULL_FORTE")]
    BullForte,
    #[serde(rename = "BULL_TARDIO")]
    BullTardio,
    #[serde(rename = "EUFORIA")]
    Euforia,
    #[serde(rename = "DISTRIBUIÇÃO")]
    Distribuicao,
    #[serde(rename = "TOPO_MANIA")]
    TopoMania,
    #[serde(rename = "SCORE_EXTREMO_INDEFINIDO")]
    ScoreExtremoIndefinido,
    #[serde(rename = "SCORE_BAIXO_INDEFINIDO")]
    ScoreBaixoIndefinido,
    #[serde(rename = "INDEFINIDO")]
    Indefinido,
}

impl Cycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cycle::Capitulacao => "CAPITULAÇÃO",
            Cycle::BearProfundo => "BEAR_PROFUNDO",
            Cycle::Recuperacao => "RECUPERAÇÃO",
            Cycle::Acumulacao => "ACUMULAÇÃO",
            Cycle::SaidaAcumulacao => "SAÍDA_ACUMULAÇÃO",
            Cycle::NovoCiclo => "NOVO_CICLO",
            Cycle::OportunidadeGeracional => "OPORTUNIDADE_GERACIONAL",
            Cycle::ReversaoEpica => "REVERSÃO_ÉPICA",
            Cycle::Neutro => "NEUTRO",
            Cycle::NeutroAlta => "NEUTRO_ALTA",
            Cycle::CorrecaoBull => "CORREÇÃO_BULL",
            Cycle::BullInicial => "BULL_INICIAL",
            Cycle::BullConfirmado => "BULL_CONFIRMADO",
            Cycle::BullForte => "BULL_FORTE",
            Cycle::BullTardio => "BULL_TARDIO",
            Cycle::Euforia => "EUFORIA",
            Cycle::Distribuicao => "DISTRIBUIÇÃO",
            Cycle::TopoMania => "TOPO_MANIA",
            Cycle::ScoreExtremoIndefinido => "SCORE_EXTREMO_INDEFINIDO",
            Cycle::ScoreBaixoIndefinido => "SCORE_BAIXO_INDEFINIDO",
            Cycle::Indefinido => "INDEFINIDO",
        }
    }

    /// Risk-phase family used by the cycle × setup decision table.
    pub fn phase(&self) -> MatrixPhase {
        match self {
            Cycle::Capitulacao | Cycle::ReversaoEpica | Cycle::OportunidadeGeracional => {
                MatrixPhase::Bottom
            }
            Cycle::BearProfundo => MatrixPhase::Bear,
            Cycle::Acumulacao
            | Cycle::Recuperacao
            | Cycle::NovoCiclo
            | Cycle::SaidaAcumulacao => MatrixPhase::Acumulacao,
            Cycle::BullInicial | Cycle::Neutro | Cycle::NeutroAlta | Cycle::CorrecaoBull => {
                MatrixPhase::BullInicial
            }
            Cycle::BullConfirmado | Cycle::BullForte | Cycle::BullTardio => {
                MatrixPhase::BullMaduro
            }
            Cycle::Euforia | Cycle::Distribuicao | Cycle::TopoMania => MatrixPhase::EuforiaTopo,
            Cycle::ScoreExtremoIndefinido | Cycle::ScoreBaixoIndefinido | Cycle::Indefinido => {
                MatrixPhase::Indefinido
            }
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.phase() == MatrixPhase::Indefinido
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which precedence rule short-circuited the normal cycle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleOverride {
    NuplNegativo,
    MvrvExtremo,
    ScoreExtremo,
    ScoreExtremoIncompleto,
}

impl fmt::Display for CycleOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOverride::NuplNegativo => write!(f, "NUPL_NEGATIVO"),
            CycleOverride::MvrvExtremo => write!(f, "MVRV_EXTREMO"),
            CycleOverride::ScoreExtremo => write!(f, "SCORE_EXTREMO"),
            CycleOverride::ScoreExtremoIncompleto => write!(f, "SCORE_EXTREMO_INCOMPLETO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatrixPhase {
    Bottom,
    Bear,
    Acumulacao,
    BullInicial,
    BullMaduro,
    EuforiaTopo,
    Indefinido,
}

impl fmt::Display for MatrixPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixPhase::Bottom => write!(f, "BOTTOM"),
            MatrixPhase::Bear => write!(f, "BEAR"),
            MatrixPhase::Acumulacao => write!(f, "ACUMULACAO"),
            MatrixPhase::BullInicial => write!(f, "BULL_INICIAL"),
            MatrixPhase::BullMaduro => write!(f, "BULL_MADURO"),
            MatrixPhase::EuforiaTopo => write!(f, "EUFORIA_TOPO"),
            MatrixPhase::Indefinido => write!(f, "INDEFINIDO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Setup {
    OversoldExtremo,
    PullbackTendencia,
    TesteSuporte,
    Rompimento,
    Resistencia,
    Exaustao,
    Nenhum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupSide {
    Compra,
    Venda,
    Nenhum,
}

impl Setup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Setup::OversoldExtremo => "OVERSOLD_EXTREMO",
            Setup::PullbackTendencia => "PULLBACK_TENDENCIA",
            Setup::TesteSuporte => "TESTE_SUPORTE",
            Setup::Rompimento => "ROMPIMENTO",
            Setup::Resistencia => "RESISTENCIA",
            Setup::Exaustao => "EXAUSTAO",
            Setup::Nenhum => "NENHUM",
        }
    }

    pub fn side(&self) -> SetupSide {
        match self {
            Setup::OversoldExtremo
            | Setup::PullbackTendencia
            | Setup::TesteSuporte
            | Setup::Rompimento => SetupSide::Compra,
            Setup::Resistencia | Setup::Exaustao => SetupSide::Venda,
            Setup::Nenhum => SetupSide::Nenhum,
        }
    }
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Setup strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Forca {
    Nenhuma,
    Baixa,
    Media,
    Alta,
    MuitoAlta,
}

impl fmt::Display for Forca {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Forca::Nenhuma => write!(f, "nenhuma"),
            Forca::Baixa => write!(f, "baixa"),
            Forca::Media => write!(f, "media"),
            Forca::Alta => write!(f, "alta"),
            Forca::MuitoAlta => write!(f, "muito_alta"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Comprar,
    Realizar,
    Hold,
    Ignorar,
    Reduzir,
    EmergenciaLiquidar,
    FecharTudo,
    AvaliarLiquidez,
    BloqueadoCapital,
    AjustarAlavancagem,
    AllInHistorico,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Comprar => "COMPRAR",
            Action::Realizar => "REALIZAR",
            Action::Hold => "HOLD",
            Action::Ignorar => "IGNORAR",
            Action::Reduzir => "REDUZIR",
            Action::EmergenciaLiquidar => "EMERGENCIA_LIQUIDAR",
            Action::FecharTudo => "FECHAR_TUDO",
            Action::AvaliarLiquidez => "AVALIAR_LIQUIDEZ",
            Action::BloqueadoCapital => "BLOQUEADO_CAPITAL",
            Action::AjustarAlavancagem => "AJUSTAR_ALAVANCAGEM",
            Action::AllInHistorico => "ALL_IN_HISTORICO",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Priority tier of a decision-table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Nenhuma,
    Baixa,
    Media,
    Alta,
    Maxima,
}

impl Priority {
    pub fn urgency(self) -> Urgency {
        match self {
            Priority::Maxima => Urgency::Critica,
            Priority::Alta => Urgency::Alta,
            Priority::Media => Urgency::Media,
            Priority::Baixa | Priority::Nenhuma => Urgency::Baixa,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Baixa,
    Media,
    Alta,
    Critica,
    Maxima,
    Extrema,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Baixa => write!(f, "baixa"),
            Urgency::Media => write!(f, "media"),
            Urgency::Alta => write!(f, "alta"),
            Urgency::Critica => write!(f, "critica"),
            Urgency::Maxima => write!(f, "maxima"),
            Urgency::Extrema => write!(f, "extrema"),
        }
    }
}

/// Five-bucket quality label shared by the market score and the block scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreClass {
    #[serde(rename = "ótimo")]
    Otimo,
    #[serde(rename = "bom")]
    Bom,
    #[serde(rename = "neutro")]
    Neutro,
    #[serde(rename = "ruim")]
    Ruim,
    #[serde(rename = "crítico")]
    Critico,
}

impl ScoreClass {
    /// Classify a 0-100 score.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            ScoreClass::Otimo
        } else if score >= 60.0 {
            ScoreClass::Bom
        } else if score >= 40.0 {
            ScoreClass::Neutro
        } else if score >= 20.0 {
            ScoreClass::Ruim
        } else {
            ScoreClass::Critico
        }
    }
}

impl fmt::Display for ScoreClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreClass::Otimo => write!(f, "ótimo"),
            ScoreClass::Bom => write!(f, "bom"),
            ScoreClass::Neutro => write!(f, "neutro"),
            ScoreClass::Ruim => write!(f, "ruim"),
            ScoreClass::Critico => write!(f, "crítico"),
        }
    }
}
