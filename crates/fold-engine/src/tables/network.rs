use rust_decimal::Decimal;

use fold_aggregate::group_by;
use fold_events::{EventKind, Role};
use fold_replay::IndexerState;
use fold_stream::LedgerField;
use fold_types::{Amount, EntityId, Family, TypeError};

use super::{Folded, TableResult};
use crate::snapshot::{Row, SnapshotTable};

const PUBLICATION: &[EventKind] = &[
    EventKind::SubgraphPublished,
    EventKind::SubgraphUpgraded,
    EventKind::SubgraphVersionUpdated,
];

const BASE58: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// One row per published subgraph deployment.
///
/// Deployments only ever seen through curation or fee events have no row.
pub(crate) fn deployments(input: &Folded<'_>) -> TableResult {
    let mut rows = Vec::new();
    for (key, rollup) in input.family(Family::Deployment) {
        let Some(published) = rollup.latest_of(PUBLICATION) else {
            continue;
        };
        let subgraph = published.event.party(Role::Subgraph);
        let row = Row::new()
            .text("id", key.id())
            .text("ipfs_hash", ipfs_hash(key.primary()))
            .tokens("signalled_tokens", rollup.sum(LedgerField::SignalledTokens))?
            .timestamp("created_at", rollup.first_of(PUBLICATION))
            .opt_text("subgraph_id", subgraph.map(|id| id.as_str()));
        rows.push(row.into_record());
    }
    Ok(SnapshotTable::new("subgraph_deployment", "id", rows))
}

/// One row per indexer.
pub(crate) fn indexers(input: &Folded<'_>) -> TableResult {
    let fresh = IndexerState::default();
    let mut rows = Vec::new();
    for (key, rollup) in input.family(Family::Indexer) {
        let state = input.replay.indexers.get(key).map_or(&fresh, |r| &r.state);
        let delegated = rollup
            .sum(LedgerField::DelegatedTokens)
            .checked_add(state.delegator_rewards)?;
        let shares = rollup.sum(LedgerField::DelegatorShares);

        let row = Row::new()
            .text("id", key.id())
            .tokens("staked_tokens", rollup.sum(LedgerField::StakedTokens))?
            .tokens("allocated_tokens", rollup.sum(LedgerField::AllocatedTokens))?
            .tokens("locked_tokens", state.locked_tokens)?
            .tokens("delegated_tokens", delegated)?
            .tokens("delegator_shares", shares)?
            .decimal("delegation_exchange_rate", exchange_rate(delegated, shares)?)
            .tokens("query_fees_collected", rollup.sum(LedgerField::QueryFeesCollected))?
            .tokens("query_fee_rebates", rollup.sum(LedgerField::QueryFeeRebates))?
            .tokens("rewards_earned", rollup.sum(LedgerField::RewardsEarned))?
            .count("allocation_count", rollup.sum(LedgerField::ActiveAllocations))?
            .count("total_allocation_count", rollup.sum(LedgerField::TotalAllocations))?
            .number("indexing_reward_cut", u64::from(state.indexing_reward_cut))
            .number("query_fee_cut", u64::from(state.query_fee_cut))
            .timestamp("created_at", state.created_at)
            .opt_text("default_display_name", input.display_name(key.primary()));
        rows.push(row.into_record());
    }
    Ok(SnapshotTable::new("indexer", "id", rows))
}

/// One row per opened allocation.
pub(crate) fn allocations(input: &Folded<'_>) -> TableResult {
    let mut rows = Vec::new();
    for (key, rollup) in input.family(Family::Allocation) {
        let Some(created) = rollup.latest_of(&[EventKind::AllocationCreated]) else {
            continue;
        };
        let indexer = created.event.party(Role::Indexer).map(EntityId::as_str);
        let closed_at = rollup.last_of(&[EventKind::AllocationClosed]);
        let row = Row::new()
            .text("id", key.id())
            .opt_text("indexer_id", indexer)
            .opt_text(
                "subgraph_deployment_id",
                created.event.party(Role::Deployment).map(EntityId::as_str),
            )
            .tokens("allocated_tokens", rollup.sum(LedgerField::AllocatedTokens))?
            .tokens("query_fees_collected", rollup.sum(LedgerField::QueryFeesCollected))?
            .tokens("query_fee_rebates", rollup.sum(LedgerField::QueryFeeRebates))?
            .tokens("indexing_rewards", rollup.sum(LedgerField::RewardsEarned))?
            .timestamp("created_at", rollup.first_of(&[EventKind::AllocationCreated]))
            .timestamp("closed_at", closed_at)
            .text("status", if closed_at.is_some() { "Closed" } else { "Active" })
            .opt_text("active_for_indexer", indexer.filter(|_| closed_at.is_none()));
        rows.push(row.into_record());
    }
    Ok(SnapshotTable::new("allocation", "id", rows))
}

/// The single network-wide totals row.
pub(crate) fn graph_network(input: &Folded<'_>) -> TableResult {
    let mut delegated = Amount::ZERO;
    let mut staked_indexers = 0u64;
    for (key, rollup) in input.family(Family::Indexer) {
        let rewards = input
            .replay
            .indexers
            .get(key)
            .map_or(Amount::ZERO, |r| r.state.delegator_rewards);
        delegated = delegated
            .checked_add(rollup.sum(LedgerField::DelegatedTokens))?
            .checked_add(rewards)?;
        if rollup.is_active(LedgerField::StakedTokens) {
            staked_indexers += 1;
        }
    }
    let signalled = total(input, Family::Curation, LedgerField::SignalledTokens)?
        .checked_sub(total(input, Family::Curation, LedgerField::UnsignalledTokens)?)?;

    let delegators = group_by(input.rollups, Family::Delegation)?;
    let active_delegators = delegators
        .values()
        .filter(|group| group.sum(LedgerField::Shares).is_positive())
        .count();
    let delegations = input.family(Family::Delegation).count();
    let active_delegations = input
        .family(Family::Delegation)
        .filter(|(_, rollup)| rollup.is_active(LedgerField::Shares))
        .count();

    let row = Row::new()
        .text("id", "1")
        .tokens("total_tokens_staked", total(input, Family::Indexer, LedgerField::StakedTokens)?)?
        .tokens("total_tokens_allocated", total(input, Family::Indexer, LedgerField::AllocatedTokens)?)?
        .tokens("total_delegated_tokens", delegated)?
        .tokens("total_tokens_signalled", signalled)?
        .tokens("total_indexing_rewards", total(input, Family::Indexer, LedgerField::RewardsEarned)?)?
        .tokens(
            "total_indexer_query_fees_collected",
            total(input, Family::Indexer, LedgerField::QueryFeesCollected)?,
        )?
        .tokens(
            "total_indexer_query_fee_rebates",
            total(input, Family::Indexer, LedgerField::QueryFeeRebates)?,
        )?
        .count("allocation_count", total(input, Family::Indexer, LedgerField::TotalAllocations)?)?
        .count(
            "active_allocation_count",
            total(input, Family::Indexer, LedgerField::ActiveAllocations)?,
        )?
        .number("delegator_count", delegators.len() as u64)
        .number("active_delegator_count", active_delegators as u64)
        .number("delegation_count", delegations as u64)
        .number("active_delegation_count", active_delegations as u64)
        .number("staked_indexers_count", staked_indexers)
        .number("subgraph_deployment_count", input.family(Family::Deployment).count() as u64);
    Ok(SnapshotTable::new("graph_network", "id", vec![row.into_record()]))
}

fn total(input: &Folded<'_>, family: Family, field: LedgerField) -> Result<Amount, TypeError> {
    input
        .family(family)
        .try_fold(Amount::ZERO, |sum, (_, rollup)| sum.checked_add(rollup.sum(field)))
}

/// IPFS hash of a deployment: bytes32 ids become base58 sha2-256
/// multihashes, anything else is already a content id.
fn ipfs_hash(id: &EntityId) -> String {
    let raw = id.as_str();
    let digest = raw
        .strip_prefix("0x")
        .filter(|hex| hex.len() == 64)
        .and_then(|hex| hex::decode(hex).ok());
    match digest {
        Some(digest) => {
            let mut multihash = vec![0x12, 0x20];
            multihash.extend_from_slice(&digest);
            base58(&multihash)
        }
        None => raw.to_string(),
    }
}

fn base58(bytes: &[u8]) -> String {
    let zeros = bytes.iter().take_while(|b| **b == 0).count();
    // Little-endian base58 digits.
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 138 / 100 + 1);
    for &byte in bytes {
        let mut carry = u32::from(byte);
        for digit in digits.iter_mut() {
            carry += u32::from(*digit) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let mut encoded = "1".repeat(zeros);
    encoded.extend(digits.iter().rev().map(|d| char::from(BASE58[usize::from(*d)])));
    encoded
}

/// Delegated tokens per delegator share; 1 while no shares exist.
fn exchange_rate(delegated: Amount, shares: Amount) -> Result<Decimal, TypeError> {
    if !shares.is_positive() {
        return Ok(Decimal::ONE);
    }
    delegated
        .to_display()?
        .checked_div(shares.to_display()?)
        .ok_or(TypeError::DisplayOverflow(delegated.raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_rate_defaults_to_one() {
        assert_eq!(exchange_rate(Amount::from(10), Amount::ZERO).unwrap(), Decimal::ONE);
        assert_eq!(exchange_rate(Amount::from(10), Amount::from(-1)).unwrap(), Decimal::ONE);
        assert_eq!(exchange_rate(Amount::from(12), Amount::from(10)).unwrap(), Decimal::new(12, 1));
    }

    #[test]
    fn base58_known_vectors() {
        assert_eq!(base58(b"Hello World!"), "2NEpo7TZRRrLZSi2U");
        assert_eq!(base58(&[0, 0, 1]), "112");
        assert_eq!(base58(&[]), "");
    }

    #[test]
    fn bytes32_deployment_ids_become_cids() {
        let bytes32 = EntityId::content(&format!("0x{}", "ab".repeat(32))).unwrap();
        let cid = ipfs_hash(&bytes32);
        assert!(cid.starts_with("Qm"), "{cid}");
        assert_eq!(cid.len(), 46);

        let cid_id = EntityId::content("QmDep").unwrap();
        assert_eq!(ipfs_hash(&cid_id), "QmDep");
    }
}
