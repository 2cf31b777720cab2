use std::collections::BTreeMap;
use std::sync::RwLock;

use fold_events::SourceBatch;
use fold_reconcile::{EntityConfig, Record, sample_desc};

use crate::error::{SinkError, SourceError};
use crate::traits::{EventSource, ReferenceProvider, SnapshotSink, SourceQuery};

/// An event source backed by batches held in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    batches: RwLock<Vec<SourceBatch>>,
    outage: RwLock<Option<String>>,
}

impl InMemorySource {
    pub fn new(batches: Vec<SourceBatch>) -> Self {
        Self {
            batches: RwLock::new(batches),
            outage: RwLock::new(None),
        }
    }

    pub fn push(&self, batch: SourceBatch) -> Result<(), SourceError> {
        self.batches
            .write()
            .map_err(|_| SourceError::Unavailable("source write lock poisoned".into()))?
            .push(batch);
        Ok(())
    }

    /// Make every later fetch fail with `reason`, or clear the outage.
    pub fn set_outage(&self, reason: Option<String>) -> Result<(), SourceError> {
        *self
            .outage
            .write()
            .map_err(|_| SourceError::Unavailable("source write lock poisoned".into()))? = reason;
        Ok(())
    }
}

impl EventSource for InMemorySource {
    fn fetch(&self, query: &SourceQuery) -> Result<Vec<SourceBatch>, SourceError> {
        if let Some(reason) = self
            .outage
            .read()
            .map_err(|_| SourceError::Unavailable("source read lock poisoned".into()))?
            .as_ref()
        {
            return Err(SourceError::Unavailable(reason.clone()));
        }
        let batches = self
            .batches
            .read()
            .map_err(|_| SourceError::Unavailable("source read lock poisoned".into()))?;
        Ok(batches.iter().filter(|b| query.wants(&b.kind)).cloned().collect())
    }
}

/// Reference records per entity type, keyed by entity name or selector.
#[derive(Debug, Default)]
pub struct InMemoryReference {
    records: RwLock<BTreeMap<String, Vec<Record>>>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity: impl Into<String>, records: Vec<Record>) -> Result<(), SourceError> {
        self.records
            .write()
            .map_err(|_| SourceError::Unavailable("reference write lock poisoned".into()))?
            .insert(entity.into(), records);
        Ok(())
    }
}

impl ReferenceProvider for InMemoryReference {
    fn fetch_sample(&self, entity: &EntityConfig, n: usize) -> Result<Vec<Record>, SourceError> {
        let records = self
            .records
            .read()
            .map_err(|_| SourceError::Unavailable("reference read lock poisoned".into()))?;
        let rows = records
            .get(entity.name)
            .or_else(|| records.get(entity.key))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Ok(sample_desc(rows, entity.order_by, n))
    }
}

/// A sink that keeps the last published version of every table.
#[derive(Debug, Default)]
pub struct InMemorySink {
    tables: RwLock<BTreeMap<String, Vec<Record>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<Vec<Record>> {
        self.tables.read().ok()?.get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .read()
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl SnapshotSink for InMemorySink {
    fn publish(&self, table: &str, rows: &[Record]) -> Result<(), SinkError> {
        self.tables
            .write()
            .map_err(|_| SinkError::Storage("sink write lock poisoned".into()))?
            .insert(table.to_string(), rows.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use fold_events::EventKind;
    use fold_reconcile::entity;

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn source_filters_by_query() {
        let source = InMemorySource::new(vec![
            SourceBatch::new("stake_delegated", vec![]),
            SourceBatch::new("curation_signalled", vec![]),
        ]);
        source.push(SourceBatch::new("allocation_resized", vec![])).unwrap();

        let query = SourceQuery {
            kinds: vec![EventKind::StakeDelegated],
        };
        let kinds: Vec<_> = source.fetch(&query).unwrap().into_iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec!["stake_delegated", "allocation_resized"]);
        assert_eq!(source.fetch(&SourceQuery::all()).unwrap().len(), 3);
    }

    #[test]
    fn outage_fails_fetch() {
        let source = InMemorySource::default();
        source.set_outage(Some("warehouse down".into())).unwrap();
        assert_eq!(
            source.fetch(&SourceQuery::all()).unwrap_err(),
            SourceError::Unavailable("warehouse down".into())
        );
        source.set_outage(None).unwrap();
        assert!(source.fetch(&SourceQuery::all()).unwrap().is_empty());
    }

    #[test]
    fn reference_samples_largest_first() {
        let reference = InMemoryReference::new();
        reference
            .insert(
                "Delegator",
                vec![
                    record(json!({"id": "0x1", "totalStakedTokens": "5"})),
                    record(json!({"id": "0x2", "totalStakedTokens": "50"})),
                    record(json!({"id": "0x3", "totalStakedTokens": "20"})),
                ],
            )
            .unwrap();
        let delegator = entity("delegator").unwrap();
        let sample = reference.fetch_sample(delegator, 2).unwrap();
        let ids: Vec<_> = sample.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("0x2"), json!("0x3")]);
        assert!(reference.fetch_sample(entity("curator").unwrap(), 5).unwrap().is_empty());
    }

    #[test]
    fn sink_overwrites_tables() {
        let sink = InMemorySink::new();
        sink.publish("signal", &[record(json!({"id": "a"}))]).unwrap();
        sink.publish("signal", &[]).unwrap();
        assert_eq!(sink.table("signal"), Some(vec![]));
        assert_eq!(sink.table_names(), vec!["signal".to_string()]);
        assert_eq!(sink.table("indexer"), None);
    }
}
