use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fold_aggregate::aggregate;
use fold_events::{LedgerEvent, decode_batches};
use fold_reconcile::{EntityConfig, Reconciler, ReconciliationReport};
use fold_replay::Replayer;
use fold_stream::merge;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::snapshot::SnapshotSet;
use crate::tables::build_tables;
use crate::traits::{EventSource, ReferenceProvider, SnapshotSink};

/// Summary of one published run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub events: u64,
    pub keys: usize,
    pub tables: usize,
    pub rows: usize,
    pub warnings: usize,
    pub digest: String,
}

impl RunStats {
    fn of(set: &SnapshotSet, events: u64, keys: usize) -> Result<Self, EngineError> {
        Ok(Self {
            events,
            keys,
            tables: set.tables.len(),
            rows: set.tables.values().map(|t| t.len()).sum(),
            warnings: set.warning_count(),
            digest: set.digest().map_err(|e| EngineError::Digest(e.to_string()))?,
        })
    }
}

/// Recomputes snapshot tables from the full event history and reconciles
/// them against a reference.
#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch, decode and fold every event, returning all tables.
    ///
    /// Any decode error aborts the run before anything is folded.
    pub fn compute<S: EventSource + ?Sized>(&self, source: &S) -> Result<SnapshotSet, EngineError> {
        self.compute_events(self.decode(source)?)
    }

    fn decode<S: EventSource + ?Sized>(&self, source: &S) -> Result<Vec<LedgerEvent>, EngineError> {
        let query = self.config.query()?;
        let batches = source.fetch(&query)?;
        debug!(batches = batches.len(), "fetched source batches");
        Ok(decode_batches(&batches)?.into_iter().flatten().collect())
    }

    /// Fold already decoded events into all tables.
    pub fn compute_events<I>(&self, events: I) -> Result<SnapshotSet, EngineError>
    where
        I: IntoIterator<Item = LedgerEvent>,
    {
        Ok(self.fold(events)?.0)
    }

    fn fold<I>(&self, events: I) -> Result<(SnapshotSet, u64, usize), EngineError>
    where
        I: IntoIterator<Item = LedgerEvent>,
    {
        let streams = merge(events)?;
        let replayer = match self.config.workers {
            Some(workers) => Replayer::with_workers(workers),
            None => Replayer::new(),
        };
        let replay = replayer.replay_all(&streams)?;
        let rollups = aggregate(&streams)?;
        let set = build_tables(&rollups, &replay)?;

        if replay.anomaly_count() > 0 {
            warn!(anomalies = replay.anomaly_count(), "replay finished with warnings");
        }
        info!(
            events = streams.event_count(),
            keys = streams.len(),
            tables = set.tables.len(),
            "computed snapshot tables"
        );
        Ok((set, streams.event_count(), streams.len()))
    }

    /// Write every table of `set` to `sink`.
    pub fn publish<K: SnapshotSink + ?Sized>(&self, set: &SnapshotSet, sink: &K) -> Result<(), EngineError> {
        for table in set.tables.values() {
            sink.publish(&table.name, &table.rows)?;
            debug!(table = %table.name, rows = table.len(), "published table");
        }
        Ok(())
    }

    /// Compute every table, then publish. A failed computation publishes
    /// nothing.
    pub fn run<S, K>(&self, source: &S, sink: &K) -> Result<(SnapshotSet, RunStats), EngineError>
    where
        S: EventSource + ?Sized,
        K: SnapshotSink + ?Sized,
    {
        let (set, events, keys) = self.fold(self.decode(source)?)?;
        let stats = RunStats::of(&set, events, keys)?;
        self.publish(&set, sink)?;
        info!(digest = %stats.digest, rows = stats.rows, warnings = stats.warnings, "run published");
        Ok((set, stats))
    }

    /// Reconcile `entities` of a computed set against reference samples.
    ///
    /// Entities without compared fields report coverage only. A compared
    /// entity whose table is absent fails.
    pub fn validate<R: ReferenceProvider + ?Sized>(
        &self,
        set: &SnapshotSet,
        reference: &R,
        entities: &[&EntityConfig],
    ) -> Result<ReconciliationReport, EngineError> {
        let config = &self.config.reconcile;
        config.validate()?;
        let reconciler = Reconciler::new(config.clone());

        let mut report = ReconciliationReport::default();
        for entity in entities {
            let table = set.table(entity.table);
            let entity_report = match table {
                _ if !entity.is_compared() => {
                    reconciler.coverage_only(entity, table.map_or(&[][..], |t| t.rows.as_slice()))
                }
                None => reconciler.unavailable(entity, format!("table {} was not computed", entity.table)),
                Some(table) => {
                    let sample = reference.fetch_sample(entity, config.samples)?;
                    reconciler.reconcile(entity, &sample, &table.rows, &set.table_warnings(entity.table))
                }
            };
            report.push(entity_report);
        }
        Ok(report)
    }

    /// Coverage of `entities` against the computed columns, no sampling.
    pub fn coverage(&self, set: &SnapshotSet, entities: &[&EntityConfig]) -> ReconciliationReport {
        let reconciler = Reconciler::new(self.config.reconcile.clone());
        let mut report = ReconciliationReport::default();
        for entity in entities {
            let rows = set.table(entity.table).map_or(&[][..], |t| t.rows.as_slice());
            report.push(reconciler.coverage_only(entity, rows));
        }
        report
    }
}
