//! Event model for Ledgerfold.
//!
//! Raw rows arrive from heterogeneous source tables. Each table maps to one
//! [`EventKind`], and each kind declares a [`KindSchema`]: which identifier
//! columns it carries, which magnitude columns, and its precedence class for
//! tie-breaking. [`decode_batch`] turns rows into canonical [`LedgerEvent`]s
//! and fails hard on anything it does not recognise.

pub mod decode;
pub mod error;
pub mod event;
pub mod kind;

pub use decode::{SourceBatch, SourceRow, decode_batch, decode_batches};
pub use error::DecodeError;
pub use event::{LedgerEvent, Magnitude, Role};
pub use kind::{EventKind, KindSchema, Precedence};
