//! Aggregation engine for Ledgerfold.
//!
//! Order-insensitive derived values: signed sums per field, event counts,
//! first and last timestamps, and the latest event of each kind by block
//! ordinal. [`aggregate`] rolls up every key; [`group_by`] folds pair keys
//! into per-participant totals with active and distinct counts.

pub mod error;
pub mod group;
pub mod rollup;

pub use error::AggregateError;
pub use group::{GroupRollup, group_by};
pub use rollup::{KeyRollup, Rollups, aggregate, is_active, latest_by_ordinal};
