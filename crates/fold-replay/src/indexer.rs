use serde::{Deserialize, Serialize};

use fold_events::{EventKind, Magnitude};
use fold_stream::SignedEvent;
use fold_types::{Amount, Family, TypeError};

use crate::error::Anomaly;
use crate::replayer::KeyFold;

/// Parts per million in a whole.
pub const PPM: u32 = 1_000_000;

/// Order-sensitive indexer quantities that a plain signed sum cannot give.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerState {
    /// Share of indexing rewards the indexer keeps, in ppm, as of the last
    /// parameter update.
    pub indexing_reward_cut: u32,
    pub query_fee_cut: u32,
    /// Indexing rewards passed on to delegators after the cut.
    pub delegator_rewards: Amount,
    /// Tokens under the most recent stake lock, net of later withdrawals.
    pub locked_tokens: Amount,
    pub lock_seen: bool,
    /// Timestamp of the first stake deposit.
    pub created_at: Option<i64>,
}

impl IndexerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split an indexing reward and credit the delegators' portion.
    pub fn assign_rewards(&mut self, amount: Amount) -> Result<(), TypeError> {
        let kept = amount.checked_mul_ppm(self.indexing_reward_cut)?;
        let passed_on = amount.checked_sub(kept)?;
        self.delegator_rewards = self.delegator_rewards.checked_add(passed_on)?;
        Ok(())
    }

    /// A new lock replaces whatever was locked before.
    pub fn lock(&mut self, tokens: Amount) {
        self.locked_tokens = tokens;
        self.lock_seen = true;
    }

    /// Withdrawals only count against a lock that precedes them.
    pub fn withdraw(&mut self, tokens: Amount) -> Result<(), TypeError> {
        if self.lock_seen {
            self.locked_tokens = self.locked_tokens.checked_sub(tokens)?;
        }
        Ok(())
    }
}

fn ppm(amount: Amount) -> Option<u32> {
    u32::try_from(amount.raw()).ok().filter(|value| *value <= PPM)
}

impl KeyFold for IndexerState {
    fn apply(&mut self, family: Family, signed: &SignedEvent) -> Result<Option<Anomaly>, TypeError> {
        if family != Family::Indexer {
            return Ok(None);
        }
        let event = &signed.event;
        match event.kind {
            EventKind::DelegationParametersUpdated => {
                let indexing = event.magnitude(Magnitude::IndexingRewardCut);
                let query = event.magnitude(Magnitude::QueryFeeCut);
                match (ppm(indexing), ppm(query)) {
                    (Some(indexing), Some(query)) => {
                        self.indexing_reward_cut = indexing;
                        self.query_fee_cut = query;
                    }
                    _ => {
                        return Ok(Some(Anomaly::InvalidParameter {
                            at: signed.order,
                            detail: format!("reward cuts {indexing}/{query} exceed {PPM} ppm"),
                        }));
                    }
                }
            }
            EventKind::RewardsAssigned => self.assign_rewards(event.magnitude(Magnitude::RewardAmount))?,
            EventKind::StakeLocked => self.lock(event.magnitude(Magnitude::Tokens)),
            EventKind::StakeWithdrawn => self.withdraw(event.magnitude(Magnitude::Tokens))?,
            EventKind::StakeDeposited => {
                self.created_at.get_or_insert(event.position.timestamp);
            }
            _ => {}
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewards_after_cut() {
        let mut state = IndexerState::new();
        state.indexing_reward_cut = 250_000;
        state.assign_rewards(Amount::from(1_000)).unwrap();
        assert_eq!(state.delegator_rewards, Amount::from(750));
    }

    #[test]
    fn zero_cut_passes_everything_on() {
        let mut state = IndexerState::new();
        state.assign_rewards(Amount::from(999)).unwrap();
        assert_eq!(state.delegator_rewards, Amount::from(999));
    }

    #[test]
    fn lock_resets_and_withdraw_subtracts() {
        let mut state = IndexerState::new();
        state.withdraw(Amount::from(5)).unwrap();
        assert_eq!(state.locked_tokens, Amount::ZERO);

        state.lock(Amount::from(100));
        state.lock(Amount::from(40));
        assert_eq!(state.locked_tokens, Amount::from(40));

        state.withdraw(Amount::from(40)).unwrap();
        assert_eq!(state.locked_tokens, Amount::ZERO);
    }

    #[test]
    fn ppm_bounds() {
        assert_eq!(ppm(Amount::from(1_000_000)), Some(PPM));
        assert_eq!(ppm(Amount::from(1_000_001)), None);
        assert_eq!(ppm(Amount::from(-1)), None);
    }
}
