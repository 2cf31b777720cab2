use std::fmt;

use serde::{Deserialize, Serialize};

use fold_events::{EventKind, LedgerEvent, Magnitude, Role};
use fold_types::{Family, SubjectKey};

/// A derived quantity that signed deltas accumulate into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    StakedTokens,
    UnstakedTokens,
    Shares,
    LockedTokens,
    SignalledTokens,
    UnsignalledTokens,
    Signal,
    NameSignal,
    /// Name signal as the curator sees it: withdrawals leave it untouched.
    CuratorNameSignal,
    WithdrawnTokens,
    AllocatedTokens,
    ActiveAllocations,
    TotalAllocations,
    QueryFeesCollected,
    QueryFeeRebates,
    RewardsEarned,
    DelegatedTokens,
    DelegatorShares,
}

impl LedgerField {
    pub fn name(self) -> &'static str {
        match self {
            Self::StakedTokens => "staked_tokens",
            Self::UnstakedTokens => "unstaked_tokens",
            Self::Shares => "shares",
            Self::LockedTokens => "locked_tokens",
            Self::SignalledTokens => "signalled_tokens",
            Self::UnsignalledTokens => "unsignalled_tokens",
            Self::Signal => "signal",
            Self::NameSignal => "name_signal",
            Self::CuratorNameSignal => "curator_name_signal",
            Self::WithdrawnTokens => "withdrawn_tokens",
            Self::AllocatedTokens => "allocated_tokens",
            Self::ActiveAllocations => "active_allocations",
            Self::TotalAllocations => "total_allocations",
            Self::QueryFeesCollected => "query_fees_collected",
            Self::QueryFeeRebates => "query_fee_rebates",
            Self::RewardsEarned => "rewards_earned",
            Self::DelegatedTokens => "delegated_tokens",
            Self::DelegatorShares => "delegator_shares",
        }
    }

    /// Fields that count events rather than sum token amounts.
    pub fn is_count(self) -> bool {
        matches!(self, Self::ActiveAllocations | Self::TotalAllocations)
    }
}

impl fmt::Display for LedgerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction a magnitude moves a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    Credit,
    Debit,
}

/// One entry of the sign table: `(kind, family, magnitude) -> (field, sign)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignRule {
    pub kind: EventKind,
    pub family: Family,
    pub magnitude: Magnitude,
    pub field: LedgerField,
    pub sign: Sign,
}

const fn rule(
    kind: EventKind,
    family: Family,
    magnitude: Magnitude,
    field: LedgerField,
    sign: Sign,
) -> SignRule {
    SignRule {
        kind,
        family,
        magnitude,
        field,
        sign,
    }
}

use EventKind as K;
use Family as F;
use LedgerField as L;
use Magnitude as M;
use Sign::{Credit, Debit};

/// The fixed sign convention for every source.
///
/// Magnitudes arrive non-negative; this table alone decides whether they add
/// to or subtract from a field. Kinds that feed a family without touching any
/// field (publications, locks, parameter updates) have routes but no rules.
pub const SIGN_TABLE: &[SignRule] = &[
    // (delegator, indexer)
    rule(K::StakeDelegated, F::Delegation, M::Tokens, L::StakedTokens, Credit),
    rule(K::StakeDelegatedLocked, F::Delegation, M::Tokens, L::UnstakedTokens, Credit),
    rule(K::StakeDelegated, F::Delegation, M::Shares, L::Shares, Credit),
    rule(K::StakeDelegatedLocked, F::Delegation, M::Shares, L::Shares, Debit),
    rule(K::StakeDelegatedLocked, F::Delegation, M::Tokens, L::LockedTokens, Credit),
    rule(K::StakeDelegatedWithdrawn, F::Delegation, M::Tokens, L::LockedTokens, Debit),
    // (curator, deployment)
    rule(K::CurationSignalled, F::Curation, M::Tokens, L::SignalledTokens, Credit),
    rule(K::CurationSignalled, F::Curation, M::CurationTax, L::SignalledTokens, Debit),
    rule(K::CurationBurned, F::Curation, M::Tokens, L::UnsignalledTokens, Credit),
    rule(K::CurationSignalled, F::Curation, M::Signal, L::Signal, Credit),
    rule(K::CurationBurned, F::Curation, M::Signal, L::Signal, Debit),
    // (curator, subgraph)
    rule(K::NameSignalMinted, F::NameCuration, M::NameSignalCreated, L::NameSignal, Credit),
    rule(K::NameSignalBurned, F::NameCuration, M::NameSignalBurnt, L::NameSignal, Debit),
    rule(K::NameSignalWithdrawn, F::NameCuration, M::NameSignalBurnt, L::NameSignal, Debit),
    rule(K::NameSignalMinted, F::NameCuration, M::NameSignalCreated, L::CuratorNameSignal, Credit),
    rule(K::NameSignalBurned, F::NameCuration, M::NameSignalBurnt, L::CuratorNameSignal, Debit),
    rule(K::NameSignalMinted, F::NameCuration, M::SignalCreated, L::Signal, Credit),
    rule(K::NameSignalBurned, F::NameCuration, M::SignalBurnt, L::Signal, Debit),
    rule(K::NameSignalMinted, F::NameCuration, M::TokensDeposited, L::SignalledTokens, Credit),
    rule(K::NameSignalBurned, F::NameCuration, M::TokensReceived, L::UnsignalledTokens, Credit),
    rule(K::NameSignalWithdrawn, F::NameCuration, M::WithdrawnGrt, L::WithdrawnTokens, Credit),
    // deployment
    rule(K::CurationSignalled, F::Deployment, M::Tokens, L::SignalledTokens, Credit),
    rule(K::CurationSignalled, F::Deployment, M::CurationTax, L::SignalledTokens, Debit),
    rule(K::CurationBurned, F::Deployment, M::Tokens, L::SignalledTokens, Debit),
    rule(K::AllocationCollected, F::Deployment, M::CurationFees, L::SignalledTokens, Credit),
    rule(K::RebateCollected, F::Deployment, M::CurationFees, L::SignalledTokens, Credit),
    // indexer
    rule(K::StakeDeposited, F::Indexer, M::Tokens, L::StakedTokens, Credit),
    rule(K::StakeSlashed, F::Indexer, M::Tokens, L::StakedTokens, Debit),
    rule(K::StakeWithdrawn, F::Indexer, M::Tokens, L::StakedTokens, Debit),
    rule(K::AllocationCreated, F::Indexer, M::Tokens, L::AllocatedTokens, Credit),
    rule(K::AllocationClosed, F::Indexer, M::Tokens, L::AllocatedTokens, Debit),
    rule(K::AllocationCreated, F::Indexer, M::Unit, L::ActiveAllocations, Credit),
    rule(K::AllocationClosed, F::Indexer, M::Unit, L::ActiveAllocations, Debit),
    rule(K::AllocationCreated, F::Indexer, M::Unit, L::TotalAllocations, Credit),
    rule(K::RebateCollected, F::Indexer, M::QueryFees, L::QueryFeesCollected, Credit),
    rule(K::AllocationCollected, F::Indexer, M::RebateFees, L::QueryFeesCollected, Credit),
    rule(K::RebateClaimed, F::Indexer, M::Tokens, L::QueryFeeRebates, Credit),
    rule(K::RebateCollected, F::Indexer, M::QueryRebates, L::QueryFeeRebates, Credit),
    rule(K::RewardsAssigned, F::Indexer, M::RewardAmount, L::RewardsEarned, Credit),
    rule(K::StakeDelegated, F::Indexer, M::Tokens, L::DelegatedTokens, Credit),
    rule(K::StakeDelegatedLocked, F::Indexer, M::Tokens, L::DelegatedTokens, Debit),
    rule(K::RebateClaimed, F::Indexer, M::DelegationFees, L::DelegatedTokens, Credit),
    rule(K::RebateCollected, F::Indexer, M::DelegationRewards, L::DelegatedTokens, Credit),
    rule(K::StakeDelegated, F::Indexer, M::Shares, L::DelegatorShares, Credit),
    rule(K::StakeDelegatedLocked, F::Indexer, M::Shares, L::DelegatorShares, Debit),
    // allocation: tokens stay bonded on the closed allocation
    rule(K::AllocationCreated, F::Allocation, M::Tokens, L::AllocatedTokens, Credit),
    rule(K::AllocationCollected, F::Allocation, M::RebateFees, L::QueryFeesCollected, Credit),
    rule(K::RebateCollected, F::Allocation, M::QueryFees, L::QueryFeesCollected, Credit),
    rule(K::RebateCollected, F::Allocation, M::QueryRebates, L::QueryFeeRebates, Credit),
    rule(K::RebateClaimed, F::Allocation, M::Tokens, L::QueryFeeRebates, Credit),
    rule(K::RewardsAssigned, F::Allocation, M::RewardAmount, L::RewardsEarned, Credit),
];

/// Families an event kind is routed to.
pub fn routes(kind: EventKind) -> &'static [Family] {
    match kind {
        K::StakeDelegated | K::StakeDelegatedLocked => &[F::Delegation, F::Indexer],
        K::StakeDelegatedWithdrawn => &[F::Delegation],
        K::CurationSignalled | K::CurationBurned => &[F::Curation, F::Deployment],
        K::NameSignalMinted | K::NameSignalBurned | K::NameSignalWithdrawn => &[F::NameCuration],
        K::DefaultNameSet => &[F::Account],
        K::SubgraphPublished | K::SubgraphUpgraded | K::SubgraphVersionUpdated => &[F::Deployment],
        K::AllocationCollected | K::RebateCollected => &[F::Indexer, F::Deployment, F::Allocation],
        K::AllocationCreated | K::AllocationClosed | K::RebateClaimed | K::RewardsAssigned => {
            &[F::Indexer, F::Allocation]
        }
        K::StakeDeposited
        | K::StakeLocked
        | K::StakeWithdrawn
        | K::StakeSlashed
        | K::DelegationParametersUpdated => &[F::Indexer],
    }
}

/// Identifier roles that make up a family's subject key, primary first.
pub fn key_roles(family: Family) -> &'static [Role] {
    match family {
        F::Delegation => &[Role::Delegator, Role::Indexer],
        F::Curation => &[Role::Curator, Role::Deployment],
        F::NameCuration => &[Role::Curator, Role::Subgraph],
        F::Deployment => &[Role::Deployment],
        F::Indexer => &[Role::Indexer],
        F::Account => &[Role::Account],
        F::Allocation => &[Role::Allocation],
    }
}

/// The subject key an event is folded under for `family`.
///
/// Returns the first missing role when the event lacks an identifier the
/// family needs.
pub fn subject_key(event: &LedgerEvent, family: Family) -> Result<SubjectKey, Role> {
    let roles = key_roles(family);
    let primary = event.party(roles[0]).ok_or(roles[0])?.clone();
    match roles.get(1) {
        Some(role) => {
            let secondary = event.party(*role).ok_or(*role)?.clone();
            Ok(SubjectKey::pair(family, primary, secondary))
        }
        None => Ok(SubjectKey::single(family, primary)),
    }
}

/// Sign rules that apply to `kind` within `family`, in table order.
pub fn rules_for(kind: EventKind, family: Family) -> impl Iterator<Item = &'static SignRule> {
    SIGN_TABLE
        .iter()
        .filter(move |rule| rule.kind == kind && rule.family == family)
}

#[cfg(test)]
mod tests {
    use fold_types::{Amount, EntityId, EventPosition};

    use super::*;

    #[test]
    fn every_rule_is_routed() {
        for rule in SIGN_TABLE {
            assert!(
                routes(rule.kind).contains(&rule.family),
                "{} has a {} rule but is not routed there",
                rule.kind,
                rule.family
            );
        }
    }

    #[test]
    fn every_rule_reads_a_declared_magnitude() {
        for rule in SIGN_TABLE {
            if rule.magnitude == M::Unit {
                continue;
            }
            assert!(
                rule.kind.schema().magnitudes.contains(&rule.magnitude),
                "{} rule reads undeclared {:?}",
                rule.kind,
                rule.magnitude
            );
        }
    }

    #[test]
    fn routed_families_have_their_key_roles() {
        for kind in EventKind::ALL {
            for family in routes(kind) {
                for role in key_roles(*family) {
                    assert!(
                        kind.schema().roles.contains(role),
                        "{kind} routed to {family} lacks {role}"
                    );
                }
            }
        }
    }

    #[test]
    fn delegation_pair_key() {
        let event = fold_events::LedgerEvent::new(K::StakeDelegated, EventPosition::at(1))
            .with_party(Role::Delegator, EntityId::address("0xD").unwrap())
            .with_party(Role::Indexer, EntityId::address("0xI").unwrap())
            .with_magnitude(M::Tokens, Amount::from(1));
        let key = subject_key(&event, F::Delegation).unwrap();
        assert_eq!(key.id(), "0xd-0xi");
        assert_eq!(subject_key(&event, F::Indexer).unwrap().id(), "0xi");
        assert_eq!(subject_key(&event, F::Curation), Err(Role::Curator));
    }

    #[test]
    fn locked_delegation_debits_shares() {
        let rules: Vec<_> = rules_for(K::StakeDelegatedLocked, F::Delegation).collect();
        assert!(rules
            .iter()
            .any(|r| r.field == L::Shares && r.sign == Debit));
        assert!(rules
            .iter()
            .any(|r| r.field == L::UnstakedTokens && r.sign == Credit));
    }

    #[test]
    fn closing_keeps_allocation_tokens() {
        assert_eq!(routes(K::AllocationClosed), &[F::Indexer, F::Allocation]);
        assert_eq!(rules_for(K::AllocationClosed, F::Allocation).count(), 0);
        assert!(rules_for(K::AllocationClosed, F::Indexer).any(|r| r.field == L::AllocatedTokens && r.sign == Debit));
    }

    #[test]
    fn withdrawal_leaves_curator_name_signal_alone() {
        let withdrawn: Vec<_> = rules_for(K::NameSignalWithdrawn, F::NameCuration).map(|r| r.field).collect();
        assert!(withdrawn.contains(&L::NameSignal));
        assert!(!withdrawn.contains(&L::CuratorNameSignal));
        assert!(rules_for(K::NameSignalBurned, F::NameCuration)
            .any(|r| r.field == L::CuratorNameSignal && r.sign == Debit));
    }
}
