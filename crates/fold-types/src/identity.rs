use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A participant or content identifier.
///
/// Addresses (accounts, delegators, indexers, curators, allocations) are
/// case-insensitive on chain, so they are lowercased on construction.
/// Content identifiers (deployment hashes, subgraph ids) may be
/// case-sensitive encodings and are kept verbatim apart from trimming.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Normalize an address-like identifier.
    pub fn address(raw: &str) -> Result<Self, TypeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyIdentifier);
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Keep a content identifier verbatim.
    pub fn content(raw: &str) -> Result<Self, TypeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyIdentifier);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of state an event contributes to.
///
/// Each family partitions events by one or two identifiers; see
/// [`Family::arity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Family {
    /// (delegator, indexer) stake positions.
    Delegation,
    /// (curator, deployment) bonding-curve signal.
    Curation,
    /// (curator, subgraph) name signal.
    NameCuration,
    /// Per deployment totals.
    Deployment,
    /// Per indexer stake, allocation and fee totals.
    Indexer,
    /// Per account metadata (display names).
    Account,
    /// Per allocation tokens, fees and rewards.
    Allocation,
}

impl Family {
    /// Number of identifiers in a subject key of this family.
    pub fn arity(self) -> usize {
        match self {
            Self::Delegation | Self::Curation | Self::NameCuration => 2,
            Self::Deployment | Self::Indexer | Self::Account | Self::Allocation => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Delegation => "delegation",
            Self::Curation => "curation",
            Self::NameCuration => "name-curation",
            Self::Deployment => "deployment",
            Self::Indexer => "indexer",
            Self::Account => "account",
            Self::Allocation => "allocation",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The partition key an entity state is folded under.
///
/// Ordering is `family` → `primary` → `secondary`, so all keys of one
/// family and one primary identifier are adjacent in ordered maps.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectKey {
    family: Family,
    primary: EntityId,
    secondary: Option<EntityId>,
}

impl SubjectKey {
    /// Key for a single-identifier family.
    pub fn single(family: Family, id: EntityId) -> Self {
        debug_assert_eq!(family.arity(), 1, "{family} keys take one identifier");
        Self {
            family,
            primary: id,
            secondary: None,
        }
    }

    /// Key for a two-identifier family.
    pub fn pair(family: Family, primary: EntityId, secondary: EntityId) -> Self {
        debug_assert_eq!(family.arity(), 2, "{family} keys take two identifiers");
        Self {
            family,
            primary,
            secondary: Some(secondary),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn primary(&self) -> &EntityId {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&EntityId> {
        self.secondary.as_ref()
    }

    /// The identifier in the materializer's format: parts joined by `-`.
    pub fn id(&self) -> String {
        match &self.secondary {
            Some(secondary) => format!("{}-{}", self.primary, secondary),
            None => self.primary.to_string(),
        }
    }
}

impl fmt::Debug for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectKey({}:{})", self.family, self.id())
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_lowercased() {
        let id = EntityId::address("  0xAbCdEF ").unwrap();
        assert_eq!(id.as_str(), "0xabcdef");
    }

    #[test]
    fn content_ids_keep_case() {
        let id = EntityId::content("QmYwAPJzv5CZsnA").unwrap();
        assert_eq!(id.as_str(), "QmYwAPJzv5CZsnA");
    }

    #[test]
    fn empty_identifier_rejected() {
        assert_eq!(EntityId::address("   "), Err(TypeError::EmptyIdentifier));
        assert_eq!(EntityId::content(""), Err(TypeError::EmptyIdentifier));
    }

    #[test]
    fn pair_key_joins_with_dash() {
        let key = SubjectKey::pair(
            Family::Delegation,
            EntityId::address("0xD1").unwrap(),
            EntityId::address("0xI1").unwrap(),
        );
        assert_eq!(key.id(), "0xd1-0xi1");
        assert_eq!(format!("{key}"), "0xd1-0xi1");
    }

    #[test]
    fn keys_group_by_family_then_primary() {
        let a = SubjectKey::pair(
            Family::Delegation,
            EntityId::address("0xb").unwrap(),
            EntityId::address("0x1").unwrap(),
        );
        let b = SubjectKey::single(Family::Indexer, EntityId::address("0xa").unwrap());
        let c = SubjectKey::pair(
            Family::Delegation,
            EntityId::address("0xb").unwrap(),
            EntityId::address("0x2").unwrap(),
        );
        let mut keys = vec![b.clone(), c.clone(), a.clone()];
        keys.sort();
        assert_eq!(keys, vec![a, c, b]);
    }
}
