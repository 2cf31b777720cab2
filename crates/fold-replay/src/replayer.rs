use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fold_stream::{MergedStreams, SignedEvent, validate_order};
use fold_types::{Family, SubjectKey, TypeError};

use crate::cost_basis::CostBasisState;
use crate::error::{Anomaly, ReplayError};
use crate::flow::has_cost_basis;
use crate::indexer::IndexerState;

/// A per-key state machine folded over an ordered stream.
pub trait KeyFold: Default + Send {
    /// Apply one event. A returned anomaly is recorded and folding
    /// continues; an arithmetic error stops folding the key.
    fn apply(&mut self, family: Family, signed: &SignedEvent) -> Result<Option<Anomaly>, TypeError>;
}

/// Final state of one key plus what happened along the way.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyReplay<S> {
    pub state: S,
    pub anomalies: Vec<Anomaly>,
    /// Events applied before the fold finished or stopped.
    pub applied: u64,
}

impl<S> KeyReplay<S> {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Validate and fold one key's sequence.
pub fn replay_sequence<S: KeyFold>(key: &SubjectKey, sequence: &[SignedEvent]) -> Result<KeyReplay<S>, ReplayError> {
    validate_order(sequence).map_err(|source| ReplayError::Unordered {
        key: key.clone(),
        source,
    })?;

    let mut replay = KeyReplay::<S>::default();
    for signed in sequence {
        match replay.state.apply(key.family(), signed) {
            Ok(anomaly) => {
                replay.applied += 1;
                if let Some(anomaly) = anomaly {
                    warn!(%key, %anomaly, "replay anomaly");
                    replay.anomalies.push(anomaly);
                }
            }
            Err(err) => {
                let anomaly = Anomaly::Overflow {
                    at: signed.order,
                    detail: err.to_string(),
                };
                warn!(%key, %anomaly, "replay stopped for key");
                replay.anomalies.push(anomaly);
                break;
            }
        }
    }
    Ok(replay)
}

/// Replayed state for every key that has a state machine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayOutput {
    pub cost_basis: BTreeMap<SubjectKey, KeyReplay<CostBasisState>>,
    pub indexers: BTreeMap<SubjectKey, KeyReplay<IndexerState>>,
}

impl ReplayOutput {
    /// Anomalies recorded for `key`, across every state machine.
    pub fn anomalies(&self, key: &SubjectKey) -> &[Anomaly] {
        self.cost_basis
            .get(key)
            .map(|r| r.anomalies.as_slice())
            .or_else(|| self.indexers.get(key).map(|r| r.anomalies.as_slice()))
            .unwrap_or(&[])
    }

    pub fn anomaly_count(&self) -> usize {
        self.cost_basis.values().map(|r| r.anomalies.len()).sum::<usize>()
            + self.indexers.values().map(|r| r.anomalies.len()).sum::<usize>()
    }
}

enum Folded {
    CostBasis(SubjectKey, KeyReplay<CostBasisState>),
    Indexer(SubjectKey, KeyReplay<IndexerState>),
}

/// Folds every key of a merged stream set.
///
/// Keys share no state, so they are folded in parallel; results land in
/// ordered maps and are identical whatever the worker count.
#[derive(Clone, Debug, Default)]
pub struct Replayer {
    workers: Option<usize>,
}

impl Replayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated pool of `workers` threads instead of the global one.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: Some(workers),
        }
    }

    pub fn replay_all(&self, streams: &MergedStreams) -> Result<ReplayOutput, ReplayError> {
        let keyed: Vec<(&SubjectKey, &[SignedEvent])> = streams
            .iter()
            .filter(|(key, _)| has_cost_basis(key.family()) || key.family() == Family::Indexer)
            .collect();

        let fold = || {
            keyed
                .par_iter()
                .map(|(key, sequence)| fold_key(key, sequence))
                .collect::<Result<Vec<_>, _>>()
        };
        let folded = match self.workers {
            Some(workers) => rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| ReplayError::WorkerPool(e.to_string()))?
                .install(fold)?,
            None => fold()?,
        };

        let mut output = ReplayOutput::default();
        for result in folded {
            match result {
                Folded::CostBasis(key, replay) => {
                    output.cost_basis.insert(key, replay);
                }
                Folded::Indexer(key, replay) => {
                    output.indexers.insert(key, replay);
                }
            }
        }
        debug!(
            positions = output.cost_basis.len(),
            indexers = output.indexers.len(),
            anomalies = output.anomaly_count(),
            "replay complete"
        );
        Ok(output)
    }
}

fn fold_key(key: &SubjectKey, sequence: &[SignedEvent]) -> Result<Folded, ReplayError> {
    if key.family() == Family::Indexer {
        Ok(Folded::Indexer(key.clone(), replay_sequence(key, sequence)?))
    } else {
        Ok(Folded::CostBasis(key.clone(), replay_sequence(key, sequence)?))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use fold_events::{EventKind, LedgerEvent, Magnitude, Role};
    use fold_stream::merge;
    use fold_types::{Amount, EntityId, EventPosition};
    use rust_decimal::Decimal;

    use super::*;

    fn grt(n: i64) -> Amount {
        Amount::from_raw(i128::from(n) * 10i128.pow(18))
    }

    fn addr(raw: &str) -> EntityId {
        EntityId::address(raw).unwrap()
    }

    fn delegation(kind: EventKind, ts: i64, tokens: i64, shares: i64) -> LedgerEvent {
        LedgerEvent::new(kind, EventPosition::at(ts))
            .with_party(Role::Delegator, addr("0xd"))
            .with_party(Role::Indexer, addr("0xi"))
            .with_magnitude(Magnitude::Tokens, grt(tokens))
            .with_magnitude(Magnitude::Shares, grt(shares))
    }

    fn indexer_event(kind: EventKind, ts: i64) -> LedgerEvent {
        LedgerEvent::new(kind, EventPosition::at(ts))
            .with_party(Role::Indexer, addr("0xi"))
            .with_party(Role::Allocation, addr("0xa1"))
    }

    fn pair_key() -> SubjectKey {
        SubjectKey::pair(Family::Delegation, addr("0xd"), addr("0xi"))
    }

    fn indexer_key() -> SubjectKey {
        SubjectKey::single(Family::Indexer, addr("0xi"))
    }

    fn scenario() -> MergedStreams {
        merge([
            delegation(EventKind::StakeDelegatedLocked, 3, 60, 50),
            delegation(EventKind::StakeDelegated, 1, 100, 100),
            delegation(EventKind::StakeDelegated, 2, 50, 25),
        ])
        .unwrap()
    }

    #[test]
    fn end_to_end_position() {
        let output = Replayer::new().replay_all(&scenario()).unwrap();
        let replay = &output.cost_basis[&pair_key()];
        assert!(replay.is_clean());
        assert_eq!(replay.applied, 3);
        assert_eq!(replay.state.rate, Decimal::from_str("1.2").unwrap());
        assert_eq!(replay.state.shares, grt(75));
        assert_eq!(replay.state.cumulative_in, grt(150));
        assert_eq!(replay.state.cumulative_out, grt(60));
        assert_eq!(replay.state.created_at, Some(1));
    }

    #[test]
    fn replay_is_idempotent_across_worker_counts() {
        let streams = scenario();
        let a = Replayer::new().replay_all(&streams).unwrap();
        let b = Replayer::with_workers(1).replay_all(&streams).unwrap();
        let c = Replayer::with_workers(4).replay_all(&streams).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn unordered_sequence_is_rejected() {
        let streams = scenario();
        let mut sequence = streams.get(&pair_key()).to_vec();
        sequence.swap(0, 2);
        let err = replay_sequence::<CostBasisState>(&pair_key(), &sequence).unwrap_err();
        assert!(matches!(err, ReplayError::Unordered { .. }));
    }

    #[test]
    fn negative_shares_warn_without_aborting() {
        let streams = merge([
            delegation(EventKind::StakeDelegated, 1, 10, 10),
            delegation(EventKind::StakeDelegatedLocked, 2, 20, 20),
            delegation(EventKind::StakeDelegated, 3, 30, 30),
        ])
        .unwrap();
        let output = Replayer::new().replay_all(&streams).unwrap();
        let replay = &output.cost_basis[&pair_key()];
        assert_eq!(replay.applied, 3);
        assert_eq!(replay.anomalies.len(), 1);
        assert!(matches!(replay.anomalies[0], Anomaly::Ordering { .. }));
        assert_eq!(replay.state.shares, grt(20));
        assert_eq!(output.anomalies(&pair_key()).len(), 1);
    }

    #[test]
    fn indexer_reward_cut_follows_parameter_history() {
        let streams = merge([
            indexer_event(EventKind::RewardsAssigned, 1).with_magnitude(Magnitude::RewardAmount, Amount::from(1_000)),
            indexer_event(EventKind::DelegationParametersUpdated, 2)
                .with_magnitude(Magnitude::IndexingRewardCut, Amount::from(500_000))
                .with_magnitude(Magnitude::QueryFeeCut, Amount::from(0)),
            indexer_event(EventKind::RewardsAssigned, 3).with_magnitude(Magnitude::RewardAmount, Amount::from(1_000)),
            indexer_event(EventKind::StakeDeposited, 4).with_magnitude(Magnitude::Tokens, Amount::from(7)),
        ])
        .unwrap();
        let output = Replayer::new().replay_all(&streams).unwrap();
        let indexer = &output.indexers[&indexer_key()].state;
        assert_eq!(indexer.delegator_rewards, Amount::from(1_500));
        assert_eq!(indexer.indexing_reward_cut, 500_000);
        assert_eq!(indexer.created_at, Some(4));
    }

    #[test]
    fn invalid_cut_is_ignored_with_warning() {
        let streams = merge([indexer_event(EventKind::DelegationParametersUpdated, 1)
            .with_magnitude(Magnitude::IndexingRewardCut, Amount::from(2_000_000))
            .with_magnitude(Magnitude::QueryFeeCut, Amount::from(0))])
        .unwrap();
        let output = Replayer::new().replay_all(&streams).unwrap();
        let replay = &output.indexers[&indexer_key()];
        assert_eq!(replay.state.indexing_reward_cut, 0);
        assert!(matches!(replay.anomalies[0], Anomaly::InvalidParameter { .. }));
    }

    #[test]
    fn overflow_stops_only_that_key() {
        let huge = Amount::from_raw(i128::MAX);
        let streams = merge([
            indexer_event(EventKind::RewardsAssigned, 1).with_magnitude(Magnitude::RewardAmount, huge),
            indexer_event(EventKind::RewardsAssigned, 2).with_magnitude(Magnitude::RewardAmount, huge),
            delegation(EventKind::StakeDelegated, 1, 1, 1),
        ])
        .unwrap();
        let output = Replayer::new().replay_all(&streams).unwrap();
        let indexer = &output.indexers[&indexer_key()];
        // The delegation sorts first at t1, then one reward applies before the overflow.
        assert_eq!(indexer.applied, 2);
        assert!(matches!(indexer.anomalies[0], Anomaly::Overflow { .. }));
        assert!(output.cost_basis[&pair_key()].is_clean());
    }
}
