use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use fold_types::{Amount, EntityId, EventPosition, TypeError};

use crate::kind::EventKind;

/// The part an identifier plays in an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Delegator,
    Indexer,
    Curator,
    Deployment,
    Subgraph,
    Account,
    Allocation,
}

impl Role {
    /// Source column holding this identifier.
    pub fn column(self) -> &'static str {
        match self {
            Self::Delegator => "delegator_id",
            Self::Indexer => "indexer_id",
            Self::Curator => "curator_id",
            Self::Deployment => "subgraph_deployment_id",
            Self::Subgraph => "subgraph_id",
            Self::Account => "graph_account",
            Self::Allocation => "allocation_id",
        }
    }

    /// Normalize a raw identifier for this role.
    pub fn normalize(self, raw: &str) -> Result<EntityId, TypeError> {
        match self {
            Self::Deployment | Self::Subgraph => EntityId::content(raw),
            _ => EntityId::address(raw),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A named raw magnitude carried by an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Magnitude {
    Tokens,
    Shares,
    Signal,
    CurationTax,
    NameSignalCreated,
    SignalCreated,
    TokensDeposited,
    NameSignalBurnt,
    SignalBurnt,
    TokensReceived,
    WithdrawnGrt,
    RebateFees,
    CurationFees,
    QueryFees,
    QueryRebates,
    DelegationRewards,
    DelegationFees,
    RewardAmount,
    IndexingRewardCut,
    QueryFeeCut,
    /// Synthetic magnitude of exactly one raw unit, used for counting.
    Unit,
}

impl Magnitude {
    /// Source column holding this magnitude, `None` for synthetic ones.
    pub fn column(self) -> Option<&'static str> {
        let column = match self {
            Self::Tokens => "tokens",
            Self::Shares => "shares",
            Self::Signal => "signal",
            Self::CurationTax => "curation_tax",
            Self::NameSignalCreated => "n_signal_created",
            Self::SignalCreated => "v_signal_created",
            Self::TokensDeposited => "tokens_deposited",
            Self::NameSignalBurnt => "n_signal_burnt",
            Self::SignalBurnt => "v_signal_burnt",
            Self::TokensReceived => "tokens_received",
            Self::WithdrawnGrt => "withdrawn_grt",
            Self::RebateFees => "rebate_fees",
            Self::CurationFees => "curation_fees",
            Self::QueryFees => "query_fees",
            Self::QueryRebates => "query_rebates",
            Self::DelegationRewards => "delegation_rewards",
            Self::DelegationFees => "delegation_fees",
            Self::RewardAmount => "amount",
            Self::IndexingRewardCut => "indexing_reward_cut",
            Self::QueryFeeCut => "query_fee_cut",
            Self::Unit => return None,
        };
        Some(column)
    }
}

/// A canonical, immutable ledger event.
///
/// Magnitudes are raw non-negative integers exactly as emitted on chain;
/// direction (credit or debit) is decided by the stream merger's sign table,
/// never here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub kind: EventKind,
    pub position: EventPosition,
    pub parties: BTreeMap<Role, EntityId>,
    pub magnitudes: BTreeMap<Magnitude, Amount>,
    /// Free-text payload, e.g. a display name.
    pub text: Option<String>,
    /// Provenance of the row, for diagnostics.
    pub source_table: String,
}

impl LedgerEvent {
    pub fn new(kind: EventKind, position: EventPosition) -> Self {
        Self {
            kind,
            position,
            parties: BTreeMap::new(),
            magnitudes: BTreeMap::new(),
            text: None,
            source_table: kind.source().to_string(),
        }
    }

    pub fn with_party(mut self, role: Role, id: EntityId) -> Self {
        self.parties.insert(role, id);
        self
    }

    pub fn with_magnitude(mut self, magnitude: Magnitude, amount: Amount) -> Self {
        self.magnitudes.insert(magnitude, amount);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn party(&self, role: Role) -> Option<&EntityId> {
        self.parties.get(&role)
    }

    /// Value of a magnitude; absent magnitudes read as zero.
    pub fn magnitude(&self, magnitude: Magnitude) -> Amount {
        match magnitude {
            Magnitude::Unit => Amount::UNIT,
            other => self.magnitudes.get(&other).copied().unwrap_or(Amount::ZERO),
        }
    }
}
