use thiserror::Error;

/// Errors raised by the engine
///
/// These are the engine-level faults the boundary layer catches and maps
/// onto its own error taxonomy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("scheme mismatch: {0}")]
    SchemeMismatch(String),

    #[error("crypto context mismatch: {0}")]
    ContextMismatch(String),

    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("missing key material: {0}")]
    MissingKey(String),

    #[error("key mismatch: {0}")]
    KeyMismatch(String),

    #[error("engine fault: {0}")]
    Fault(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
