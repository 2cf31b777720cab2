use serde::Serialize;

use crate::compare::{Comparison, Scale};

/// Default timestamp skew, in seconds.
pub const DEFAULT_SKEW_SECS: i64 = 1;

/// One compared field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Field name in reference records.
    pub reference: &'static str,
    /// Column name in the computed table.
    pub column: &'static str,
    pub comparison: Comparison,
    /// Scale reference values are divided by before comparing.
    pub scale: Scale,
}

impl FieldSpec {
    /// Token amount: reference in wei, computed in display units.
    pub const fn tokens(reference: &'static str, column: &'static str) -> Self {
        Self {
            reference,
            column,
            comparison: Comparison::Tolerant,
            scale: Scale::Wei,
        }
    }

    /// Unscaled ratio.
    pub const fn ratio(reference: &'static str, column: &'static str) -> Self {
        Self {
            reference,
            column,
            comparison: Comparison::Tolerant,
            scale: Scale::Unit,
        }
    }

    pub const fn count(reference: &'static str, column: &'static str) -> Self {
        Self {
            reference,
            column,
            comparison: Comparison::ExactInteger,
            scale: Scale::Unit,
        }
    }

    pub const fn timestamp(reference: &'static str, column: &'static str) -> Self {
        Self {
            reference,
            column,
            comparison: Comparison::Timestamp {
                max_skew_secs: DEFAULT_SKEW_SECS,
            },
            scale: Scale::Unit,
        }
    }

    pub const fn text(reference: &'static str, column: &'static str) -> Self {
        Self {
            reference,
            column,
            comparison: Comparison::CaseInsensitive,
            scale: Scale::Unit,
        }
    }
}

/// How a reference entity type maps onto a computed table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EntityConfig {
    /// Selector used on the command line, e.g. `delegated_stake`.
    pub key: &'static str,
    /// Reference entity type name, e.g. `DelegatedStake`.
    pub name: &'static str,
    /// Computed snapshot table.
    pub table: &'static str,
    /// Computed column matched against the reference `id`.
    pub id_column: &'static str,
    /// Reference field samples are ordered by, descending.
    pub order_by: &'static str,
    pub fields: &'static [FieldSpec],
    /// Every field of the reference schema, for coverage.
    pub schema: &'static [&'static str],
}

impl EntityConfig {
    /// Whether any field is compared; entities without fields are listed
    /// for coverage only.
    pub fn is_compared(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn field(&self, reference: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.reference == reference)
    }
}

/// Resolve an entity by selector key or reference type name.
pub fn entity(name: &str) -> Option<&'static EntityConfig> {
    CATALOGUE
        .iter()
        .find(|e| e.key.eq_ignore_ascii_case(name) || e.name.eq_ignore_ascii_case(name))
}

/// Every reconciled entity, in selector order.
pub const CATALOGUE: &[EntityConfig] = &[
    EntityConfig {
        key: "allocation",
        name: "Allocation",
        table: "allocation",
        id_column: "id",
        order_by: "allocatedTokens",
        fields: &[
            FieldSpec::tokens("allocatedTokens", "allocated_tokens"),
            FieldSpec::tokens("queryFeesCollected", "query_fees_collected"),
            FieldSpec::tokens("queryFeeRebates", "query_fee_rebates"),
            FieldSpec::tokens("indexingRewards", "indexing_rewards"),
            FieldSpec::timestamp("createdAt", "created_at"),
            FieldSpec::timestamp("closedAt", "closed_at"),
            FieldSpec::text("status", "status"),
        ],
        schema: &[
            "id",
            "indexer",
            "creator",
            "activeForIndexer",
            "subgraphDeployment",
            "allocatedTokens",
            "effectiveAllocation",
            "createdAtEpoch",
            "createdAtBlockNumber",
            "createdAt",
            "closedAtEpoch",
            "closedAtBlockNumber",
            "closedAt",
            "queryFeesCollected",
            "queryFeeRebates",
            "distributedRebates",
            "curatorRewards",
            "indexingRewards",
            "indexingIndexerRewards",
            "indexingDelegatorRewards",
            "delegationFees",
            "status",
            "poi",
            "isLegacy",
            "forceClosed",
        ],
    },
    EntityConfig {
        key: "curator",
        name: "Curator",
        table: "curator",
        id_column: "curator_id",
        order_by: "totalSignalledTokens",
        fields: &[
            FieldSpec::tokens("totalSignalledTokens", "total_signalled_tokens"),
            FieldSpec::tokens("totalUnsignalledTokens", "total_unsignalled_tokens"),
            FieldSpec::tokens("totalNameSignalledTokens", "total_name_signalled_tokens"),
            FieldSpec::tokens("totalNameUnsignalledTokens", "total_name_unsignalled_tokens"),
            FieldSpec::tokens("totalWithdrawnTokens", "total_withdrawn_tokens"),
            FieldSpec::tokens("totalSignal", "total_signal"),
            FieldSpec::tokens("totalNameSignal", "total_name_signal"),
            FieldSpec::count("signalCount", "signal_count"),
            FieldSpec::count("activeSignalCount", "active_signal_count"),
            FieldSpec::count("nameSignalCount", "name_signal_count"),
            FieldSpec::count("activeNameSignalCount", "active_name_signal_count"),
            FieldSpec::count("combinedSignalCount", "combined_signal_count"),
            FieldSpec::count("activeCombinedSignalCount", "active_combined_signal_count"),
            FieldSpec::timestamp("createdAt", "created_at"),
            FieldSpec::text("defaultDisplayName", "default_display_name"),
        ],
        schema: &[
            "id",
            "createdAt",
            "account",
            "defaultDisplayName",
            "totalSignalledTokens",
            "totalUnsignalledTokens",
            "totalNameSignalledTokens",
            "totalNameUnsignalledTokens",
            "totalWithdrawnTokens",
            "realizedRewards",
            "annualizedReturn",
            "totalReturn",
            "signalingEfficiency",
            "totalNameSignal",
            "totalNameSignalAverageCostBasis",
            "totalAverageCostBasisPerNameSignal",
            "totalSignal",
            "totalSignalAverageCostBasis",
            "totalAverageCostBasisPerSignal",
            "signalCount",
            "activeSignalCount",
            "nameSignalCount",
            "activeNameSignalCount",
            "combinedSignalCount",
            "activeCombinedSignalCount",
        ],
    },
    EntityConfig {
        key: "delegated_stake",
        name: "DelegatedStake",
        table: "delegated_stake",
        id_column: "id",
        order_by: "stakedTokens",
        fields: &[
            FieldSpec::tokens("stakedTokens", "total_staked_tokens"),
            FieldSpec::tokens("unstakedTokens", "total_unstaked_tokens"),
            FieldSpec::tokens("lockedTokens", "locked_tokens"),
            FieldSpec::tokens("shareAmount", "share_amount"),
            FieldSpec::ratio("personalExchangeRate", "personal_exchange_rate"),
            FieldSpec::timestamp("createdAt", "created_at"),
            FieldSpec::timestamp("lastDelegatedAt", "last_delegated_at"),
            FieldSpec::timestamp("lastUndelegatedAt", "last_undelegated_at"),
        ],
        schema: &[
            "id",
            "indexer",
            "delegator",
            "stakedTokens",
            "unstakedTokens",
            "lockedTokens",
            "lockedUntil",
            "legacyLockedTokens",
            "legacyLockedUntil",
            "shareAmount",
            "personalExchangeRate",
            "realizedRewards",
            "createdAt",
            "lastDelegatedAt",
            "lastUndelegatedAt",
            "transferredToL2",
            "transferredToL2At",
            "transferredToL2AtBlockNumber",
            "transferredToL2AtTx",
            "stakedTokensTransferredToL2",
            "idOnL2",
            "idOnL1",
            "dataService",
            "provision",
        ],
    },
    EntityConfig {
        key: "delegator",
        name: "Delegator",
        table: "delegator",
        id_column: "delegator_id",
        order_by: "totalStakedTokens",
        fields: &[
            FieldSpec::tokens("totalStakedTokens", "total_staked_tokens"),
            FieldSpec::tokens("totalUnstakedTokens", "total_unstaked_tokens"),
            FieldSpec::count("stakesCount", "stakes_count"),
            FieldSpec::count("activeStakesCount", "active_stakes_count"),
            FieldSpec::timestamp("createdAt", "created_at"),
            FieldSpec::text("defaultDisplayName", "default_display_name"),
        ],
        schema: &[
            "id",
            "account",
            "createdAt",
            "defaultDisplayName",
            "totalStakedTokens",
            "totalUnstakedTokens",
            "totalRealizedRewards",
            "stakesCount",
            "activeStakesCount",
        ],
    },
    EntityConfig {
        key: "indexer",
        name: "Indexer",
        table: "indexer",
        id_column: "id",
        order_by: "stakedTokens",
        fields: &[
            FieldSpec::tokens("stakedTokens", "staked_tokens"),
            FieldSpec::tokens("allocatedTokens", "allocated_tokens"),
            FieldSpec::tokens("lockedTokens", "locked_tokens"),
            FieldSpec::tokens("delegatedTokens", "delegated_tokens"),
            FieldSpec::tokens("queryFeesCollected", "query_fees_collected"),
            FieldSpec::tokens("queryFeeRebates", "query_fee_rebates"),
            FieldSpec::tokens("rewardsEarned", "rewards_earned"),
            FieldSpec::tokens("delegatorShares", "delegator_shares"),
            FieldSpec::ratio("delegationExchangeRate", "delegation_exchange_rate"),
            FieldSpec::count("allocationCount", "allocation_count"),
            FieldSpec::count("totalAllocationCount", "total_allocation_count"),
            FieldSpec::count("indexingRewardCut", "indexing_reward_cut"),
            FieldSpec::count("queryFeeCut", "query_fee_cut"),
            FieldSpec::timestamp("createdAt", "created_at"),
            FieldSpec::text("defaultDisplayName", "default_display_name"),
        ],
        schema: &[
            "id",
            "createdAt",
            "url",
            "geoHash",
            "defaultDisplayName",
            "stakedTokens",
            "allocatedTokens",
            "lockedTokens",
            "delegatedTokens",
            "delegatorShares",
            "delegationExchangeRate",
            "allocationCount",
            "totalAllocationCount",
            "queryFeesCollected",
            "queryFeeRebates",
            "rewardsEarned",
            "indexerIndexingRewards",
            "delegatorIndexingRewards",
            "indexingRewardCut",
            "queryFeeCut",
            "delegatedCapacity",
            "tokenCapacity",
            "availableStake",
            "ownStakeRatio",
            "delegatedStakeRatio",
        ],
    },
    EntityConfig {
        key: "name_signal",
        name: "NameSignal",
        table: "name_signal",
        id_column: "id",
        order_by: "signalledTokens",
        fields: &[
            FieldSpec::tokens("signalledTokens", "signalled_tokens"),
            FieldSpec::tokens("unsignalledTokens", "unsignalled_tokens"),
            FieldSpec::tokens("withdrawnTokens", "withdrawn_tokens"),
            FieldSpec::tokens("nameSignal", "name_signal"),
            FieldSpec::tokens("signal", "signal"),
            FieldSpec::timestamp("lastNameSignalChange", "last_name_signal_change"),
        ],
        schema: &[
            "id",
            "curator",
            "subgraph",
            "signalledTokens",
            "unsignalledTokens",
            "withdrawnTokens",
            "nameSignal",
            "signal",
            "lastNameSignalChange",
            "realizedRewards",
            "averageCostBasis",
            "averageCostBasisPerSignal",
            "nameSignalAverageCostBasis",
            "nameSignalAverageCostBasisPerSignal",
            "signalAverageCostBasis",
            "signalAverageCostBasisPerSignal",
            "entityVersion",
            "linkedEntity",
            "signalledTokensSentToL2",
            "signalledTokensReceivedOnL2",
            "transferredToL2",
            "transferredToL2At",
            "transferredToL2AtBlockNumber",
            "transferredToL2AtTx",
            "idOnL2",
            "idOnL1",
        ],
    },
    EntityConfig {
        key: "signal",
        name: "Signal",
        table: "signal",
        id_column: "id",
        order_by: "signalledTokens",
        fields: &[
            FieldSpec::tokens("signalledTokens", "signalled_tokens"),
            FieldSpec::tokens("unsignalledTokens", "unsignalled_tokens"),
            FieldSpec::tokens("signal", "signal"),
            FieldSpec::timestamp("createdAt", "created_at"),
            FieldSpec::timestamp("lastUpdatedAt", "last_updated_at"),
        ],
        schema: &[
            "id",
            "curator",
            "subgraphDeployment",
            "signalledTokens",
            "unsignalledTokens",
            "signal",
            "averageCostBasis",
            "averageCostBasisPerSignal",
            "lastSignalChange",
            "realizedRewards",
            "createdAt",
            "lastUpdatedAt",
            "createdAtBlock",
            "lastUpdatedAtBlock",
        ],
    },
    EntityConfig {
        key: "subgraph_deployment",
        name: "SubgraphDeployment",
        table: "subgraph_deployment",
        id_column: "id",
        order_by: "signalledTokens",
        fields: &[
            FieldSpec::text("ipfsHash", "ipfs_hash"),
            FieldSpec::tokens("signalledTokens", "signalled_tokens"),
            FieldSpec::timestamp("createdAt", "created_at"),
        ],
        schema: &[
            "id",
            "ipfsHash",
            "createdAt",
            "deniedAt",
            "originalName",
            "stakedTokens",
            "indexingRewardAmount",
            "indexingIndexerRewardAmount",
            "indexingDelegatorRewardAmount",
            "queryFeesAmount",
            "queryFeeRebates",
            "curatorFeeRewards",
            "delegatorsQueryFeeRebates",
            "signalledTokens",
            "unsignalledTokens",
            "signalAmount",
            "pricePerShare",
            "reserveRatio",
            "subgraphCount",
            "activeSubgraphCount",
            "deprecatedSubgraphCount",
            "transferredToL2",
            "transferredToL2At",
            "transferredToL2AtBlockNumber",
            "transferredToL2AtTx",
            "signalledTokensSentToL2",
            "signalledTokensReceivedOnL2",
        ],
    },
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn selectors_resolve() {
        assert_eq!(entity("delegated_stake").unwrap().name, "DelegatedStake");
        assert_eq!(entity("DelegatedStake").unwrap().key, "delegated_stake");
        assert!(entity("billing").is_none());
    }

    #[test]
    fn compared_fields_belong_to_the_schema() {
        for config in CATALOGUE {
            for field in config.fields {
                assert!(
                    config.schema.contains(&field.reference),
                    "{}.{} is not in the schema",
                    config.name,
                    field.reference
                );
            }
        }
    }

    #[test]
    fn keys_and_tables_are_unique() {
        let keys: HashSet<_> = CATALOGUE.iter().map(|c| c.key).collect();
        let tables: HashSet<_> = CATALOGUE.iter().map(|c| c.table).collect();
        assert_eq!(keys.len(), CATALOGUE.len());
        assert_eq!(tables.len(), CATALOGUE.len());
    }

    #[test]
    fn every_entity_is_compared() {
        assert!(CATALOGUE.iter().all(EntityConfig::is_compared));
        assert_eq!(entity("allocation").unwrap().field("status").unwrap().column, "status");
    }
}
