use fold_events::{EventKind, Role};
use fold_types::{Family, TypeError};

use crate::merge::OrderKey;

/// Errors raised while merging decoded events into keyed streams.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("{kind} event at arrival {arrival} feeds {family} but has no {role} party")]
    MissingParty {
        kind: EventKind,
        family: Family,
        role: Role,
        arrival: u64,
    },

    #[error("signed delta overflow: {0}")]
    Overflow(#[from] TypeError),
}

/// A sequence that is not strictly increasing by [`OrderKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event {index} is out of order: {current} does not follow {previous}")]
pub struct OrderViolation {
    pub index: usize,
    pub previous: OrderKey,
    pub current: OrderKey,
}
