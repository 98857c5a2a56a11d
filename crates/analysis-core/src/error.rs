use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Input violates an ordering or range contract of the caller.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
