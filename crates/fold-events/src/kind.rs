use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::{Magnitude, Role};

/// Tie-break class for events that share a timestamp and block position.
///
/// Lower classes replay first: parameter changes apply before the flows
/// they govern, acquisitions before disposals, settlements last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Precedence {
    Parameter = 0,
    Inflow = 1,
    Outflow = 2,
    Settlement = 3,
    Metadata = 4,
}

/// Declared shape of one event kind's source rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindSchema {
    /// Source table name the kind is decoded from.
    pub source: &'static str,
    /// Identifier columns, all required.
    pub roles: &'static [Role],
    /// Magnitude columns, all required.
    pub magnitudes: &'static [Magnitude],
    /// Optional free-text column.
    pub text: Option<&'static str>,
    pub precedence: Precedence,
}

/// Every event kind the engine models.
///
/// Kinds outside this list (allocation resizes, cross-chain transfer
/// resets, ...) are rejected at decode time rather than guessed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    StakeDelegated,
    StakeDelegatedLocked,
    StakeDelegatedWithdrawn,
    CurationSignalled,
    CurationBurned,
    NameSignalMinted,
    NameSignalBurned,
    NameSignalWithdrawn,
    DefaultNameSet,
    SubgraphPublished,
    SubgraphUpgraded,
    SubgraphVersionUpdated,
    StakeDeposited,
    StakeLocked,
    StakeWithdrawn,
    StakeSlashed,
    AllocationCreated,
    AllocationClosed,
    AllocationCollected,
    RebateCollected,
    RebateClaimed,
    RewardsAssigned,
    DelegationParametersUpdated,
}

use EventKind::*;
use Magnitude as M;
use Role as R;

impl EventKind {
    pub const ALL: [EventKind; 23] = [
        StakeDelegated,
        StakeDelegatedLocked,
        StakeDelegatedWithdrawn,
        CurationSignalled,
        CurationBurned,
        NameSignalMinted,
        NameSignalBurned,
        NameSignalWithdrawn,
        DefaultNameSet,
        SubgraphPublished,
        SubgraphUpgraded,
        SubgraphVersionUpdated,
        StakeDeposited,
        StakeLocked,
        StakeWithdrawn,
        StakeSlashed,
        AllocationCreated,
        AllocationClosed,
        AllocationCollected,
        RebateCollected,
        RebateClaimed,
        RewardsAssigned,
        DelegationParametersUpdated,
    ];

    pub fn schema(self) -> KindSchema {
        const DELEGATION: &[Role] = &[R::Delegator, R::Indexer];
        const CURATION: &[Role] = &[R::Curator, R::Deployment];
        const NAME_CURATION: &[Role] = &[R::Curator, R::Subgraph];
        const PUBLICATION: &[Role] = &[R::Subgraph, R::Deployment];
        const INDEXER: &[Role] = &[R::Indexer];
        const ALLOCATION: &[Role] = &[R::Indexer, R::Deployment, R::Allocation];
        const SETTLEMENT: &[Role] = &[R::Indexer, R::Deployment, R::Allocation];
        const INDEXER_ALLOCATION: &[Role] = &[R::Indexer, R::Allocation];
        const TOKENS: &[Magnitude] = &[M::Tokens];
        const TOKENS_SHARES: &[Magnitude] = &[M::Tokens, M::Shares];

        let (source, roles, magnitudes, text, precedence): (
            &'static str,
            &'static [Role],
            &'static [Magnitude],
            Option<&'static str>,
            Precedence,
        ) = match self {
            StakeDelegated => ("stake_delegated", DELEGATION, TOKENS_SHARES, None, Precedence::Inflow),
            StakeDelegatedLocked => (
                "stake_delegated_locked",
                DELEGATION,
                TOKENS_SHARES,
                None,
                Precedence::Outflow,
            ),
            StakeDelegatedWithdrawn => (
                "stake_delegated_withdrawn",
                DELEGATION,
                TOKENS,
                None,
                Precedence::Settlement,
            ),
            CurationSignalled => (
                "curation_signalled",
                CURATION,
                &[M::Tokens, M::Signal, M::CurationTax],
                None,
                Precedence::Inflow,
            ),
            CurationBurned => (
                "curation_burned",
                CURATION,
                &[M::Tokens, M::Signal],
                None,
                Precedence::Outflow,
            ),
            NameSignalMinted => (
                "gns_signal_minted",
                NAME_CURATION,
                &[M::NameSignalCreated, M::SignalCreated, M::TokensDeposited],
                None,
                Precedence::Inflow,
            ),
            NameSignalBurned => (
                "gns_signal_burned",
                NAME_CURATION,
                &[M::NameSignalBurnt, M::SignalBurnt, M::TokensReceived],
                None,
                Precedence::Outflow,
            ),
            NameSignalWithdrawn => (
                "gns_grt_withdrawn",
                NAME_CURATION,
                &[M::NameSignalBurnt, M::WithdrawnGrt],
                None,
                Precedence::Settlement,
            ),
            DefaultNameSet => (
                "gns_set_default_name",
                &[R::Account],
                &[],
                Some("name"),
                Precedence::Metadata,
            ),
            SubgraphPublished => ("gns_subgraph_published", PUBLICATION, &[], None, Precedence::Metadata),
            SubgraphUpgraded => ("gns_subgraph_upgraded", PUBLICATION, &[], None, Precedence::Metadata),
            SubgraphVersionUpdated => (
                "gns_subgraph_version_updated",
                PUBLICATION,
                &[],
                None,
                Precedence::Metadata,
            ),
            StakeDeposited => ("stake_deposited", INDEXER, TOKENS, None, Precedence::Inflow),
            StakeLocked => ("stake_locked", INDEXER, TOKENS, None, Precedence::Outflow),
            StakeWithdrawn => ("stake_withdrawn", INDEXER, TOKENS, None, Precedence::Settlement),
            StakeSlashed => ("stake_slashed", INDEXER, TOKENS, None, Precedence::Outflow),
            AllocationCreated => ("allocation_created", ALLOCATION, TOKENS, None, Precedence::Inflow),
            AllocationClosed => ("allocation_closed", ALLOCATION, TOKENS, None, Precedence::Outflow),
            AllocationCollected => (
                "allocation_collected",
                SETTLEMENT,
                &[M::RebateFees, M::CurationFees],
                None,
                Precedence::Settlement,
            ),
            RebateCollected => (
                "rebate_collected",
                SETTLEMENT,
                &[M::QueryFees, M::QueryRebates, M::DelegationRewards, M::CurationFees],
                None,
                Precedence::Settlement,
            ),
            RebateClaimed => (
                "rebate_claimed",
                INDEXER_ALLOCATION,
                &[M::Tokens, M::DelegationFees],
                None,
                Precedence::Settlement,
            ),
            RewardsAssigned => (
                "rewards_assigned",
                INDEXER_ALLOCATION,
                &[M::RewardAmount],
                None,
                Precedence::Settlement,
            ),
            DelegationParametersUpdated => (
                "delegation_parameters_updated",
                INDEXER,
                &[M::IndexingRewardCut, M::QueryFeeCut],
                None,
                Precedence::Parameter,
            ),
        };

        KindSchema {
            source,
            roles,
            magnitudes,
            text,
            precedence,
        }
    }

    /// Source table name.
    pub fn source(self) -> &'static str {
        self.schema().source
    }

    pub fn precedence(self) -> Precedence {
        self.schema().precedence
    }

    /// Resolve a source table name.
    pub fn from_source(source: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.source() == source)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_source(s).ok_or_else(|| format!("unknown event kind: {s}"))
    }
}
