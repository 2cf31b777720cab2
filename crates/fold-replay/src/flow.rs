use serde::{Deserialize, Serialize};

use fold_events::{EventKind, Magnitude};
use fold_types::Family;

/// Whether an event acquires or disposes of a share-based position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flow {
    Inflow,
    Outflow,
}

/// How one event kind moves a cost-basis position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowRule {
    pub kind: EventKind,
    pub family: Family,
    pub flow: Flow,
    pub tokens: Magnitude,
    pub shares: Magnitude,
}

/// Flow rules for cost-basis positions. Kinds not listed leave the
/// position untouched.
pub const FLOW_TABLE: &[FlowRule] = &[
    FlowRule {
        kind: EventKind::StakeDelegated,
        family: Family::Delegation,
        flow: Flow::Inflow,
        tokens: Magnitude::Tokens,
        shares: Magnitude::Shares,
    },
    FlowRule {
        kind: EventKind::StakeDelegatedLocked,
        family: Family::Delegation,
        flow: Flow::Outflow,
        tokens: Magnitude::Tokens,
        shares: Magnitude::Shares,
    },
];

pub fn flow_rule(kind: EventKind, family: Family) -> Option<&'static FlowRule> {
    FLOW_TABLE
        .iter()
        .find(|rule| rule.kind == kind && rule.family == family)
}

/// Families that carry a cost-basis position.
pub fn has_cost_basis(family: Family) -> bool {
    FLOW_TABLE.iter().any(|rule| rule.family == family)
}
