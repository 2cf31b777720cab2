use std::collections::BTreeMap;

use fold_events::EventKind;
use fold_stream::{LedgerField, SignedEvent};
use fold_types::{Amount, EntityId, Family, TypeError};

use crate::rollup::{KeyRollup, Rollups, is_active};

/// Totals of every pair key that shares one primary identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupRollup {
    /// Number of pair keys in the group.
    pub members: u64,
    /// Members whose field sum is positive at the end of history.
    pub active: BTreeMap<LedgerField, u64>,
    pub sums: BTreeMap<LedgerField, Amount>,
    /// Members with at least one event of the kind.
    pub distinct: BTreeMap<EventKind, u64>,
    pub first_by_kind: BTreeMap<EventKind, i64>,
    pub last_by_kind: BTreeMap<EventKind, i64>,
    /// Latest event of each kind across members, with the member's
    /// secondary identifier.
    pub latest: BTreeMap<EventKind, (EntityId, SignedEvent)>,
}

impl GroupRollup {
    fn add(&mut self, secondary: Option<&EntityId>, rollup: &KeyRollup) -> Result<(), TypeError> {
        self.members += 1;
        for (field, value) in &rollup.sums {
            let sum = self.sums.entry(*field).or_insert(Amount::ZERO);
            *sum = sum.checked_add(*value)?;
            if is_active(*value) {
                *self.active.entry(*field).or_insert(0) += 1;
            }
        }
        for kind in rollup.kind_counts.keys() {
            *self.distinct.entry(*kind).or_insert(0) += 1;
        }
        for (kind, ts) in &rollup.first_by_kind {
            self.first_by_kind
                .entry(*kind)
                .and_modify(|t| *t = (*t).min(*ts))
                .or_insert(*ts);
        }
        for (kind, ts) in &rollup.last_by_kind {
            self.last_by_kind
                .entry(*kind)
                .and_modify(|t| *t = (*t).max(*ts))
                .or_insert(*ts);
        }
        if let Some(secondary) = secondary {
            for (kind, signed) in &rollup.latest {
                let newer = self
                    .latest
                    .get(kind)
                    .map_or(true, |(_, current)| signed.order.ordinal() > current.order.ordinal());
                if newer {
                    self.latest.insert(*kind, (secondary.clone(), signed.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn sum(&self, field: LedgerField) -> Amount {
        self.sums.get(&field).copied().unwrap_or(Amount::ZERO)
    }

    pub fn active_count(&self, field: LedgerField) -> u64 {
        self.active.get(&field).copied().unwrap_or(0)
    }

    pub fn distinct_count(&self, kind: EventKind) -> u64 {
        self.distinct.get(&kind).copied().unwrap_or(0)
    }

    pub fn first_of(&self, kinds: &[EventKind]) -> Option<i64> {
        kinds.iter().filter_map(|k| self.first_by_kind.get(k)).copied().min()
    }

    pub fn last_of(&self, kinds: &[EventKind]) -> Option<i64> {
        kinds.iter().filter_map(|k| self.last_by_kind.get(k)).copied().max()
    }

    /// Secondary identifier of the member holding the latest `kind` event.
    pub fn latest_member(&self, kind: EventKind) -> Option<&EntityId> {
        self.latest.get(&kind).map(|(member, _)| member)
    }
}

/// Group the rollups of `family` by primary identifier.
///
/// Keys of other families are ignored. Groups come back in identifier order.
pub fn group_by(rollups: &Rollups, family: Family) -> Result<BTreeMap<EntityId, GroupRollup>, TypeError> {
    let mut groups: BTreeMap<EntityId, GroupRollup> = BTreeMap::new();
    for (key, rollup) in rollups.iter().filter(|(key, _)| key.family() == family) {
        groups
            .entry(key.primary().clone())
            .or_default()
            .add(key.secondary(), rollup)?;
    }
    Ok(groups)
}
