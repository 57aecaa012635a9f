use thiserror::Error;

/// Errors originating from the core parameter model and formula registry.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("parameter out of range: {reason}")]
    ParameterOutOfRange { reason: String },

    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("failed to parse fractal parameters: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("unknown formula identifier: {0}")]
    UnknownFormula(u32),
}

impl CoreError {
    pub fn out_of_range(reason: impl Into<String>) -> Self {
        Self::ParameterOutOfRange {
            reason: reason.into(),
        }
    }
}
