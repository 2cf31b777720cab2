use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalogue::EntityConfig;

/// How far a reference schema field is reproduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Coverage {
    /// Mapped to a column that the computed table carries.
    Covered,
    /// Mapped, but the computed table does not store the column.
    MappedNotStored,
    /// No mapping at all.
    NotComputed,
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Covered => "COVERED",
            Self::MappedNotStored => "MAPPED-NOT-STORED",
            Self::NotComputed => "NOT-COMPUTED",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCoverage {
    pub field: String,
    pub column: Option<String>,
    pub coverage: Coverage,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub entity: String,
    pub fields: Vec<FieldCoverage>,
}

impl CoverageReport {
    pub fn count(&self, coverage: Coverage) -> usize {
        self.fields.iter().filter(|f| f.coverage == coverage).count()
    }

    /// Schema fields with any mapping.
    pub fn mapped(&self) -> usize {
        self.fields.len() - self.count(Coverage::NotComputed)
    }
}

/// Classify every schema field of `config` against the computed table's
/// columns. Independent of any sampling.
pub fn coverage(config: &EntityConfig, columns: &BTreeSet<String>) -> CoverageReport {
    let fields = config
        .schema
        .iter()
        .map(|field| match config.field(field) {
            Some(spec) => FieldCoverage {
                field: field.to_string(),
                column: Some(spec.column.to_string()),
                coverage: if columns.contains(spec.column) {
                    Coverage::Covered
                } else {
                    Coverage::MappedNotStored
                },
            },
            None => FieldCoverage {
                field: field.to_string(),
                column: None,
                coverage: Coverage::NotComputed,
            },
        })
        .collect();

    CoverageReport {
        entity: config.name.to_string(),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use crate::catalogue::entity;

    use super::*;

    fn columns(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classifies_fields() {
        let config = entity("subgraph_deployment").unwrap();
        let report = coverage(config, &columns(&["id", "signalled_tokens", "created_at"]));

        let status = |name: &str| {
            report
                .fields
                .iter()
                .find(|f| f.field == name)
                .map(|f| f.coverage)
                .unwrap()
        };
        assert_eq!(status("signalledTokens"), Coverage::Covered);
        assert_eq!(status("ipfsHash"), Coverage::MappedNotStored);
        assert_eq!(status("pricePerShare"), Coverage::NotComputed);
        assert_eq!(report.count(Coverage::Covered), 2);
        assert_eq!(report.mapped(), 3);
        assert_eq!(report.fields.len(), config.schema.len());
    }

    #[test]
    fn missing_table_stores_nothing() {
        let config = entity("allocation").unwrap();
        let report = coverage(config, &BTreeSet::new());
        assert_eq!(report.count(Coverage::Covered), 0);
        assert_eq!(report.count(Coverage::MappedNotStored), config.fields.len());
        assert_eq!(
            report.count(Coverage::NotComputed),
            config.schema.len() - config.fields.len()
        );
    }
}
