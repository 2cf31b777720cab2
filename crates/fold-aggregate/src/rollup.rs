use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use fold_events::EventKind;
use fold_stream::{LedgerField, MergedStreams, SignedEvent};
use fold_types::{Amount, SubjectKey, TypeError};

use crate::error::AggregateError;

/// Rolled-up values of one subject key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyRollup {
    pub sums: BTreeMap<LedgerField, Amount>,
    pub events: u64,
    pub kind_counts: BTreeMap<EventKind, u64>,
    pub first_at: Option<i64>,
    pub last_at: Option<i64>,
    pub first_by_kind: BTreeMap<EventKind, i64>,
    pub last_by_kind: BTreeMap<EventKind, i64>,
    /// Latest event of each kind by block ordinal.
    pub latest: BTreeMap<EventKind, SignedEvent>,
}

impl KeyRollup {
    /// Roll up an ordered sequence.
    pub fn from_sequence(sequence: &[SignedEvent]) -> Result<Self, TypeError> {
        let mut rollup = Self::default();
        for signed in sequence {
            rollup.add(signed)?;
        }
        Ok(rollup)
    }

    fn add(&mut self, signed: &SignedEvent) -> Result<(), TypeError> {
        for (field, delta) in &signed.deltas {
            let sum = self.sums.entry(*field).or_insert(Amount::ZERO);
            *sum = sum.checked_add(*delta)?;
        }

        let kind = signed.kind();
        let timestamp = signed.position().timestamp;
        self.events += 1;
        *self.kind_counts.entry(kind).or_insert(0) += 1;
        self.first_at = Some(self.first_at.map_or(timestamp, |t| t.min(timestamp)));
        self.last_at = Some(self.last_at.map_or(timestamp, |t| t.max(timestamp)));
        self.first_by_kind
            .entry(kind)
            .and_modify(|t| *t = (*t).min(timestamp))
            .or_insert(timestamp);
        self.last_by_kind
            .entry(kind)
            .and_modify(|t| *t = (*t).max(timestamp))
            .or_insert(timestamp);

        let newer = self
            .latest
            .get(&kind)
            .map_or(true, |current| signed.order.ordinal() > current.order.ordinal());
        if newer {
            self.latest.insert(kind, signed.clone());
        }
        Ok(())
    }

    /// Net signed sum of a field; zero when no event touched it.
    pub fn sum(&self, field: LedgerField) -> Amount {
        self.sums.get(&field).copied().unwrap_or(Amount::ZERO)
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        self.kind_counts.get(&kind).copied().unwrap_or(0)
    }

    /// Earliest timestamp over any of `kinds`.
    pub fn first_of(&self, kinds: &[EventKind]) -> Option<i64> {
        kinds.iter().filter_map(|k| self.first_by_kind.get(k)).copied().min()
    }

    /// Latest timestamp over any of `kinds`.
    pub fn last_of(&self, kinds: &[EventKind]) -> Option<i64> {
        kinds.iter().filter_map(|k| self.last_by_kind.get(k)).copied().max()
    }

    /// Latest event over any of `kinds` by block ordinal.
    pub fn latest_of(&self, kinds: &[EventKind]) -> Option<&SignedEvent> {
        kinds
            .iter()
            .filter_map(|k| self.latest.get(k))
            .max_by_key(|signed| signed.order.ordinal())
    }

    /// Whether `field` is positive at the end of history.
    pub fn is_active(&self, field: LedgerField) -> bool {
        is_active(self.sum(field))
    }
}

/// Rollups for every key, in key order.
pub type Rollups = BTreeMap<SubjectKey, KeyRollup>;

/// Active means positive at the end of history, never "was ever positive".
pub fn is_active(net: Amount) -> bool {
    net.is_positive()
}

/// The latest event of `kind` in a sequence by (block, log index, arrival).
///
/// Timestamps are ignored; when block and log index tie, the later arrival
/// wins, which makes the choice stable across runs.
pub fn latest_by_ordinal(sequence: &[SignedEvent], kind: EventKind) -> Option<&SignedEvent> {
    sequence
        .iter()
        .filter(|signed| signed.kind() == kind)
        .max_by_key(|signed| signed.order.ordinal())
}

/// Roll up every key of a merged stream set.
pub fn aggregate(streams: &MergedStreams) -> Result<Rollups, AggregateError> {
    let keyed: Vec<(&SubjectKey, &[SignedEvent])> = streams.iter().collect();
    let rolled = keyed
        .par_iter()
        .map(|(key, sequence)| {
            KeyRollup::from_sequence(sequence)
                .map(|rollup| ((*key).clone(), rollup))
                .map_err(|source| AggregateError::Overflow {
                    key: (*key).clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rollups: Rollups = rolled.into_iter().collect();
    debug!(keys = rollups.len(), "aggregation complete");
    Ok(rollups)
}
