use serde::{Deserialize, Serialize};

use fold_events::{EventKind, SourceBatch};
use fold_reconcile::{EntityConfig, Record};

use crate::error::{SinkError, SourceError};

/// Which source tables a run reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuery {
    pub kinds: Vec<EventKind>,
}

impl SourceQuery {
    /// Every modelled event kind.
    pub fn all() -> Self {
        Self {
            kinds: EventKind::ALL.to_vec(),
        }
    }

    /// Whether a batch named `kind` is in scope. Unknown names are kept so
    /// decoding can reject them.
    pub fn wants(&self, kind: &str) -> bool {
        match EventKind::from_source(kind) {
            Some(kind) => self.kinds.contains(&kind),
            None => true,
        }
    }
}

/// Supplies raw event batches for a run.
pub trait EventSource: Send + Sync {
    fn fetch(&self, query: &SourceQuery) -> Result<Vec<SourceBatch>, SourceError>;
}

/// Supplies reference records for reconciliation.
pub trait ReferenceProvider: Send + Sync {
    /// Up to `n` records of `entity`, ordered by `entity.order_by` descending.
    fn fetch_sample(&self, entity: &EntityConfig, n: usize) -> Result<Vec<Record>, SourceError>;
}

/// Receives finished snapshot tables. Publishing a table replaces it whole.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, table: &str, rows: &[Record]) -> Result<(), SinkError>;
}
