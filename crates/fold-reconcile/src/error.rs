/// Errors raised before any comparison runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("unknown entity {0:?}")]
    UnknownEntity(String),

    #[error("invalid reconciliation config: {0}")]
    InvalidConfig(String),
}
