use fold_aggregate::AggregateError;
use fold_events::DecodeError;
use fold_reconcile::ReconcileError;
use fold_replay::ReplayError;
use fold_stream::MergeError;
use fold_types::TypeError;

/// Failures of an event source or reference provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed source data: {0}")]
    Malformed(String),
}

/// Failures of a snapshot sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink rejected table {table}: {reason}")]
    Rejected { table: String, reason: String },

    #[error("sink storage error: {0}")]
    Storage(String),
}

/// Configuration loading errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(String),

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("unknown event kind {0:?} in config")]
    UnknownKind(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Fatal errors of an engine run. Nothing is published when one occurs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("replay failed: {0}")]
    Replay(#[from] ReplayError),

    #[error("aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),

    #[error("table {table}: {source}")]
    Table {
        table: &'static str,
        #[source]
        source: TypeError,
    },

    #[error("snapshot digest failed: {0}")]
    Digest(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}
