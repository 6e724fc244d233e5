use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlagError {
    #[error("flag registry is invalid: {}", .0.join("; "))]
    InvalidRegistry(Vec<String>),

    #[error("feature flag manager is not initialized")]
    NotInitialized,

    #[error("unknown feature flag: {0}")]
    UnknownFlag(String),

    #[error("flag evaluation failed: {0}")]
    EvaluationError(String),
}
