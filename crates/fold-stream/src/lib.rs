//! Stream merger for Ledgerfold.
//!
//! Decoded events are routed to every entity family they feed, signed
//! according to the fixed [`SIGN_TABLE`], and ordered per [`SubjectKey`] by
//! an explicit [`OrderKey`]. Downstream folds must call [`validate_order`]
//! on a sequence before consuming it.
//!
//! [`SubjectKey`]: fold_types::SubjectKey

pub mod error;
pub mod merge;
pub mod sign;

pub use error::{MergeError, OrderViolation};
pub use merge::{MergedStreams, OrderKey, SignedEvent, merge, validate_order};
pub use sign::{LedgerField, SIGN_TABLE, Sign, SignRule, key_roles, routes, rules_for, subject_key};
