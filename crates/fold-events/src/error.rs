/// Errors produced while decoding source rows into events.
///
/// Every variant is fatal for the run: a dropped or misread row silently
/// corrupts every cumulative total downstream of it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown event kind {kind:?} in source {table:?}")]
    UnknownKind { table: String, kind: String },

    #[error("{table} row {row}: missing column {column:?}")]
    MissingColumn {
        table: String,
        row: usize,
        column: &'static str,
    },

    #[error("{table} row {row}: column {column:?} is invalid: {reason}")]
    InvalidColumn {
        table: String,
        row: usize,
        column: &'static str,
        reason: String,
    },

    #[error("{table} row {row}: magnitude {column:?} is negative")]
    NegativeMagnitude {
        table: String,
        row: usize,
        column: &'static str,
    },
}
