use serde::{Deserialize, Serialize};

use fold_stream::{OrderKey, OrderViolation};
use fold_types::{Amount, SubjectKey};

/// A per-key warning raised during replay.
///
/// Anomalies never abort the run. They are attached to the key's result and
/// surfaced next to any reconciliation of that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Anomaly {
    /// An outflow drove the share balance below zero. Usually a sign that
    /// the source delivered events out of order.
    #[error("ordering anomaly at {at}: share balance went negative ({shares})")]
    Ordering { at: OrderKey, shares: Amount },

    /// Arithmetic overflowed; folding of the key stopped at this event.
    #[error("overflow at {at}: {detail}")]
    Overflow { at: OrderKey, detail: String },

    /// A parameter value outside its valid range was ignored.
    #[error("invalid parameter at {at}: {detail}")]
    InvalidParameter { at: OrderKey, detail: String },
}

impl Anomaly {
    pub fn at(&self) -> OrderKey {
        match self {
            Self::Ordering { at, .. } | Self::Overflow { at, .. } | Self::InvalidParameter { at, .. } => *at,
        }
    }
}

/// Fatal replay errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("stream {key} is unordered: {source}")]
    Unordered {
        key: SubjectKey,
        #[source]
        source: OrderViolation,
    },

    #[error("failed to build replay worker pool: {0}")]
    WorkerPool(String),
}
