use thiserror::Error;

/// Typed failures of one evaluation cycle.
///
/// Collaborator adapters return `anyhow::Result`; the evaluator maps those into
/// `UpstreamFetchFailure` naming the collaborator so callers can tell which
/// data source to fix.
#[derive(Error, Debug)]
pub enum EngineError {
    // -- Input --------------------------------------------------------------
    #[error("missing indicator: {field}")]
    MissingIndicator { field: String },

    // -- Upstream -----------------------------------------------------------
    #[error("upstream fetch failed ({source_name}): {reason}")]
    UpstreamFetchFailure { source_name: String, reason: String },

    #[error("upstream fetch timed out ({source_name}) after {seconds}s")]
    Timeout { source_name: String, seconds: u64 },

    // -- Persistence --------------------------------------------------------
    #[error("persistence failure: {reason}")]
    PersistenceFailure { reason: String },

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn missing(field: &str) -> Self {
        EngineError::MissingIndicator {
            field: field.to_string(),
        }
    }

    pub fn upstream(source_name: &str, err: &anyhow::Error) -> Self {
        EngineError::UpstreamFetchFailure {
            source_name: source_name.to_string(),
            reason: format!("{:#}", err),
        }
    }

    /// Human-readable remediation shown next to API errors.
    pub fn recommended_action(&self) -> String {
        match self {
            EngineError::MissingIndicator { field } => {
                format!("Corrigir fonte de dados {} antes de continuar", field)
            }
            EngineError::UpstreamFetchFailure { source_name, .. }
            | EngineError::Timeout { source_name, .. } => {
                format!("Verificar disponibilidade da fonte {} e tentar novamente", source_name)
            }
            EngineError::PersistenceFailure { .. } | EngineError::Io(_) => {
                "Verificar armazenamento de decisões; a decisão calculada não foi gravada".to_string()
            }
            EngineError::SerdeJson(_) => {
                "Verificar formato do payload recebido antes de continuar".to_string()
            }
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_indicator_names_field() {
        let err = EngineError::missing("mvrv");
        assert_eq!(err.to_string(), "missing indicator: mvrv");
        assert_eq!(
            err.recommended_action(),
            "Corrigir fonte de dados mvrv antes de continuar"
        );
    }

    #[test]
    fn upstream_keeps_context_chain() {
        let inner = anyhow::anyhow!("connection refused").context("Failed to fetch candles");
        let err = EngineError::upstream("coinbase", &inner);
        let msg = err.to_string();
        assert!(msg.contains("coinbase"));
        assert!(msg.contains("Failed to fetch candles"));
        assert!(msg.contains("connection refused"));
    }
}
