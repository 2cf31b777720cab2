//! Reconciliation layer for Ledgerfold.
//!
//! Compares computed snapshot rows against a reference sample, field by
//! field, under a per-field [`Comparison`] policy, and classifies every
//! schema field of an entity as covered, mapped but not stored, or not
//! computed. The layer is a read-only audit: it never touches computed
//! state, and mismatches are report data rather than errors.
//!
//! # Key Types
//!
//! - [`EntityConfig`]: how one reference entity maps onto a computed table
//! - [`FieldSpec`]: one compared field: names, [`Scale`], [`Comparison`]
//! - [`Reconciler`]: runs the comparison for one entity
//! - [`ReconciliationReport`]: per-entity results plus global pass/fail

pub mod catalogue;
pub mod compare;
pub mod config;
pub mod coverage;
pub mod error;
pub mod record;
pub mod report;

pub use catalogue::{CATALOGUE, EntityConfig, FieldSpec, entity};
pub use compare::{Comparison, FieldOutcome, FieldStatus, Scale, compare_field, compare_record};
pub use config::ReconcileConfig;
pub use coverage::{Coverage, CoverageReport, FieldCoverage, coverage};
pub use error::ReconcileError;
pub use record::{Record, sample_desc};
pub use report::{EntityReport, Reconciler, ReconciliationReport, RecordReport};
