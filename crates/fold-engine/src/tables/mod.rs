//! Snapshot table builders.
//!
//! Each builder reads the per-key replay states and rollups and emits one
//! row per entity. Column names are the computed column names the
//! reconciliation catalogue expects.

mod curation;
mod delegation;
mod network;

use std::collections::BTreeMap;

use fold_aggregate::{KeyRollup, Rollups};
use fold_events::EventKind;
use fold_replay::ReplayOutput;
use fold_types::{EntityId, Family, SubjectKey, TypeError, timestamp_to_utc};

use crate::error::EngineError;
use crate::snapshot::{SnapshotSet, SnapshotTable};

pub(crate) type TableResult = Result<SnapshotTable, TypeError>;

/// Everything a table builder may read.
pub(crate) struct Folded<'a> {
    pub rollups: &'a Rollups,
    pub replay: &'a ReplayOutput,
    pub display_names: BTreeMap<EntityId, String>,
}

impl<'a> Folded<'a> {
    fn new(rollups: &'a Rollups, replay: &'a ReplayOutput) -> Self {
        Self {
            display_names: display_names(rollups),
            rollups,
            replay,
        }
    }

    pub fn family(&self, family: Family) -> impl Iterator<Item = (&'a SubjectKey, &'a KeyRollup)> {
        self.rollups.iter().filter(move |(key, _)| key.family() == family)
    }

    pub fn display_name(&self, id: &EntityId) -> Option<&str> {
        self.display_names.get(id).map(String::as_str)
    }
}

/// Latest default display name per account.
fn display_names(rollups: &Rollups) -> BTreeMap<EntityId, String> {
    rollups
        .iter()
        .filter(|(key, _)| key.family() == Family::Account)
        .filter_map(|(key, rollup)| {
            let latest = rollup.latest_of(&[EventKind::DefaultNameSet])?;
            Some((key.primary().clone(), latest.event.text.clone()?))
        })
        .collect()
}

/// Build every snapshot table and attach replay warnings to their rows.
pub fn build_tables(rollups: &Rollups, replay: &ReplayOutput) -> Result<SnapshotSet, EngineError> {
    let folded = Folded::new(rollups, replay);
    let builders: [(&'static str, fn(&Folded<'_>) -> TableResult); 9] = [
        ("allocation", network::allocations),
        ("curator", curation::curators),
        ("delegated_stake", delegation::delegated_stakes),
        ("delegator", delegation::delegators),
        ("graph_network", network::graph_network),
        ("indexer", network::indexers),
        ("name_signal", curation::name_signals),
        ("signal", curation::signals),
        ("subgraph_deployment", network::deployments),
    ];

    let mut set = SnapshotSet::default();
    for (table, build) in builders {
        set.insert(build(&folded).map_err(|source| EngineError::Table { table, source })?);
    }

    let latest = rollups.values().filter_map(|r| r.last_at).max();
    set.as_of = latest
        .map(timestamp_to_utc)
        .transpose()
        .map_err(|source| EngineError::Table { table: "as_of", source })?;

    for (key, replayed) in &replay.cost_basis {
        for anomaly in &replayed.anomalies {
            set.warn("delegated_stake", &key.id(), anomaly.to_string());
            set.warn("delegator", key.primary().as_str(), format!("{key}: {anomaly}"));
        }
    }
    for (key, replayed) in &replay.indexers {
        for anomaly in &replayed.anomalies {
            set.warn("indexer", &key.id(), anomaly.to_string());
        }
    }
    Ok(set)
}
