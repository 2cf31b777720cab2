use fold_types::{SubjectKey, TypeError};

/// Errors produced while rolling up streams.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("sum overflow while aggregating {key}: {source}")]
    Overflow {
        key: SubjectKey,
        #[source]
        source: TypeError,
    },
}
