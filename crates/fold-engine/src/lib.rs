//! Run orchestration for Ledgerfold.
//!
//! [`Engine`] drives one full recomputation: fetch source batches, decode,
//! merge, replay and aggregate, then build every snapshot table. Tables are
//! published only once all of them are built, so a failed run leaves the
//! sink untouched.
//!
//! The engine talks to the outside world through three traits in
//! [`traits`]: an [`EventSource`], a [`ReferenceProvider`] for
//! reconciliation samples and a [`SnapshotSink`]. In-memory implementations
//! live in [`memory`].

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod snapshot;
pub mod tables;
pub mod traits;

pub use config::EngineConfig;
pub use engine::{Engine, RunStats};
pub use error::{ConfigError, EngineError, SinkError, SourceError};
pub use memory::{InMemoryReference, InMemorySink, InMemorySource};
pub use snapshot::{Row, SnapshotSet, SnapshotTable, Warnings};
pub use tables::build_tables;
pub use traits::{EventSource, ReferenceProvider, SnapshotSink, SourceQuery};
