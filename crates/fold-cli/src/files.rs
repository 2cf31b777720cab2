//! JSON file adapters for the engine's collaborator traits.
//!
//! A snapshot directory holds one `<table>.json` array per table plus a
//! `manifest.json` with the id columns, warnings and digest of the run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fold_engine::{
    EventSource, InMemoryReference, RunStats, SinkError, SnapshotSet, SnapshotSink, SnapshotTable, SourceError,
    SourceQuery, Warnings,
};
use fold_events::SourceBatch;
use fold_reconcile::Record;

const MANIFEST: &str = "manifest.json";

/// Reads source batches from a JSON array file on every fetch.
#[derive(Clone, Debug)]
pub struct JsonEventFile {
    path: PathBuf,
}

impl JsonEventFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EventSource for JsonEventFile {
    fn fetch(&self, query: &SourceQuery) -> Result<Vec<SourceBatch>, SourceError> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", self.path.display())))?;
        let batches: Vec<SourceBatch> = serde_json::from_str(&text)
            .map_err(|e| SourceError::Malformed(format!("{}: {e}", self.path.display())))?;
        Ok(batches.into_iter().filter(|b| query.wants(&b.kind)).collect())
    }
}

/// Load a reference file: an object mapping entity names to record arrays.
pub fn load_reference(path: &Path) -> Result<InMemoryReference, SourceError> {
    let text =
        fs::read_to_string(path).map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?;
    let records: BTreeMap<String, Vec<Record>> =
        serde_json::from_str(&text).map_err(|e| SourceError::Malformed(format!("{}: {e}", path.display())))?;
    let reference = InMemoryReference::new();
    for (entity, rows) in records {
        reference.insert(entity, rows)?;
    }
    Ok(reference)
}

/// Writes each published table to `<dir>/<table>.json`, replacing it.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SnapshotSink for DirectorySink {
    fn publish(&self, table: &str, rows: &[Record]) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir).map_err(|e| SinkError::Storage(format!("{}: {e}", self.dir.display())))?;
        let json = serde_json::to_vec_pretty(rows).map_err(|e| SinkError::Rejected {
            table: table.to_string(),
            reason: e.to_string(),
        })?;
        let path = self.dir.join(format!("{table}.json"));
        fs::write(&path, json).map_err(|e| SinkError::Storage(format!("{}: {e}", path.display())))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    digest: String,
    #[serde(default)]
    as_of: Option<DateTime<Utc>>,
    /// Table name to id column.
    tables: BTreeMap<String, String>,
    #[serde(default)]
    warnings: Warnings,
}

/// Record what a published run wrote, so `load_snapshots` can rebuild it.
pub fn write_manifest(dir: &Path, set: &SnapshotSet, stats: &RunStats) -> anyhow::Result<()> {
    let manifest = Manifest {
        digest: stats.digest.clone(),
        as_of: set.as_of,
        tables: set
            .tables
            .values()
            .map(|t| (t.name.clone(), t.id_column.clone()))
            .collect(),
        warnings: set.warnings.clone(),
    };
    let path = dir.join(MANIFEST);
    fs::write(&path, serde_json::to_vec_pretty(&manifest)?).with_context(|| format!("writing {}", path.display()))
}

/// Rebuild a snapshot set from a directory written by `fold replay`.
pub fn load_snapshots(dir: &Path) -> anyhow::Result<SnapshotSet> {
    let path = dir.join(MANIFEST);
    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let manifest: Manifest = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    let mut set = SnapshotSet {
        as_of: manifest.as_of,
        warnings: manifest.warnings,
        ..SnapshotSet::default()
    };
    for (name, id_column) in manifest.tables {
        let path = dir.join(format!("{name}.json"));
        let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let rows: Vec<Record> = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        debug!(table = %name, rows = rows.len(), "loaded snapshot table");
        set.insert(SnapshotTable::new(name, id_column, rows));
    }

    let digest = set.digest()?;
    if digest != manifest.digest {
        warn!(expected = %manifest.digest, actual = %digest, "snapshot tables changed since they were written");
    }
    if set.tables.is_empty() {
        bail!("{} lists no tables", path.display());
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use fold_engine::Engine;
    use serde_json::json;

    use super::*;

    fn events_json() -> serde_json::Value {
        json!([
            {
                "kind": "stake_delegated",
                "rows": [{
                    "timestamp": 1,
                    "block_number": 10,
                    "delegator_id": "0xD",
                    "indexer_id": "0xA",
                    "tokens": "100000000000000000000",
                    "shares": "100000000000000000000"
                }]
            }
        ])
    }

    #[test]
    fn replay_round_trips_through_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let events = dir.path().join("events.json");
        fs::write(&events, events_json().to_string()).unwrap();
        let out = dir.path().join("out");

        let (set, stats) = Engine::default()
            .run(&JsonEventFile::new(&events), &DirectorySink::new(&out))
            .unwrap();
        write_manifest(&out, &set, &stats).unwrap();

        let loaded = load_snapshots(&out).unwrap();
        assert_eq!(loaded, set);
        assert_eq!(loaded.digest().unwrap(), stats.digest);
        assert!(out.join("delegated_stake.json").exists());
    }

    #[test]
    fn unreadable_event_file_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonEventFile::new(dir.path().join("absent.json"));
        assert!(matches!(missing.fetch(&SourceQuery::all()), Err(SourceError::Unavailable(_))));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "{not json").unwrap();
        assert!(matches!(
            JsonEventFile::new(&garbage).fetch(&SourceQuery::all()),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn reference_file_loads_by_entity() {
        use fold_engine::ReferenceProvider;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");
        fs::write(
            &path,
            json!({"Delegator": [{"id": "0xd", "totalStakedTokens": "1"}]}).to_string(),
        )
        .unwrap();
        let reference = load_reference(&path).unwrap();
        let delegator = fold_reconcile::entity("delegator").unwrap();
        assert_eq!(reference.fetch_sample(delegator, 10).unwrap().len(), 1);
    }

    #[test]
    fn missing_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshots(dir.path()).is_err());
    }
}
