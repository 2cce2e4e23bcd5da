use thiserror::Error;

/// Why a single telemetry record was dropped from a batch
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Malformed envelope or payload; `raw` holds the offending input
    #[error("decode error: {reason}")]
    Decode { reason: String, raw: String },

    #[error("rule evaluation error: {0}")]
    RuleEvaluation(String),

    #[error("enrichment error: {0}")]
    Enrichment(String),
}

impl ProcessingError {
    pub fn decode(reason: impl Into<String>, raw: &serde_json::Value) -> Self {
        Self::Decode {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

pub type RecordResult<T> = Result<T, ProcessingError>;
