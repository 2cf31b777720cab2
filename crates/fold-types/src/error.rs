use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("identifier is empty")]
    EmptyIdentifier,

    #[error("invalid raw amount: {0:?}")]
    InvalidAmount(String),

    #[error("amount arithmetic overflowed")]
    AmountOverflow,

    #[error("amount {0} does not fit the display scale")]
    DisplayOverflow(i128),

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}
