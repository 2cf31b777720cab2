use fold_aggregate::group_by;
use fold_events::EventKind;
use fold_replay::CostBasisState;
use fold_stream::LedgerField;
use fold_types::{EntityId, Family, SubjectKey};

use super::{Folded, TableResult};
use crate::snapshot::{Row, SnapshotTable};

/// One row per (delegator, indexer) position.
pub(crate) fn delegated_stakes(input: &Folded<'_>) -> TableResult {
    let fresh = CostBasisState::default();
    let mut rows = Vec::new();
    for (key, rollup) in input.family(Family::Delegation) {
        let state = input.replay.cost_basis.get(key).map_or(&fresh, |r| &r.state);
        let staked = rollup.sum(LedgerField::StakedTokens);
        let unstaked = rollup.sum(LedgerField::UnstakedTokens);
        let row = Row::new()
            .text("id", key.id())
            .text("delegator_id", key.primary().as_str())
            .opt_text("indexer_id", key.secondary().map(EntityId::as_str))
            .tokens("total_staked_tokens", staked)?
            .tokens("total_unstaked_tokens", unstaked)?
            .tokens("staked_tokens", staked.checked_sub(unstaked)?)?
            .tokens("locked_tokens", rollup.sum(LedgerField::LockedTokens))?
            .tokens("share_amount", state.shares)?
            .decimal("personal_exchange_rate", state.rate)
            .decimal("current_delegation", state.current_value()?)
            .number("activations", u64::from(state.activations))
            .timestamp("created_at", state.created_at)
            .timestamp("last_delegated_at", rollup.last_of(&[EventKind::StakeDelegated]))
            .timestamp("last_undelegated_at", rollup.last_of(&[EventKind::StakeDelegatedLocked]));
        rows.push(row.into_record());
    }
    Ok(SnapshotTable::new("delegated_stake", "id", rows))
}

/// One row per delegator that ever delegated.
pub(crate) fn delegators(input: &Folded<'_>) -> TableResult {
    let mut rows = Vec::new();
    for (delegator, group) in group_by(input.rollups, Family::Delegation)? {
        if group.distinct_count(EventKind::StakeDelegated) == 0 {
            continue;
        }
        let staked = group.sum(LedgerField::StakedTokens);
        let unstaked = group.sum(LedgerField::UnstakedTokens);
        // Points at the delegated_stake row of the most recent delegation.
        let last_delegation = group
            .latest_member(EventKind::StakeDelegated)
            .map(|indexer| SubjectKey::pair(Family::Delegation, delegator.clone(), indexer.clone()).id());
        let row = Row::new()
            .text("delegator_id", delegator.as_str())
            .tokens("total_staked_tokens", staked)?
            .tokens("total_unstaked_tokens", unstaked)?
            .tokens("staked_tokens", staked.checked_sub(unstaked)?)?
            .tokens("locked_tokens", group.sum(LedgerField::LockedTokens))?
            .number("stakes_count", group.distinct_count(EventKind::StakeDelegated))
            .number("active_stakes_count", group.active_count(LedgerField::Shares))
            .timestamp("created_at", group.first_of(&[EventKind::StakeDelegated]))
            .timestamp("last_delegated_at", group.last_of(&[EventKind::StakeDelegated]))
            .timestamp("last_undelegated_at", group.last_of(&[EventKind::StakeDelegatedLocked]))
            .opt_text("default_display_name", input.display_name(&delegator))
            .opt_text("last_delegation", last_delegation.as_deref());
        rows.push(row.into_record());
    }
    Ok(SnapshotTable::new("delegator", "delegator_id", rows))
}
