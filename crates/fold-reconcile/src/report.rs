use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalogue::EntityConfig;
use crate::compare::{FieldOutcome, compare_record};
use crate::config::ReconcileConfig;
use crate::coverage::{CoverageReport, coverage};
use crate::record::{Record, record_id};

/// Field-level results for one sampled reference record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReport {
    pub id: String,
    pub fields: Vec<FieldOutcome>,
    /// Replay warnings recorded for this key. Informational only.
    pub warnings: Vec<String>,
}

impl RecordReport {
    pub fn passed(&self) -> bool {
        self.fields.iter().all(FieldOutcome::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.fields.iter().filter(|f| !f.passed())
    }
}

/// Reconciliation result for one entity type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity: String,
    pub table: String,
    pub coverage: CoverageReport,
    /// False when only coverage was computed.
    pub compared: bool,
    pub sampled: usize,
    pub records: Vec<RecordReport>,
    /// Reference ids with no computed row.
    pub missing: Vec<String>,
    /// Why the entity could not be reconciled at all.
    pub error: Option<String>,
}

impl EntityReport {
    pub fn passed(&self) -> bool {
        if self.error.is_some() {
            return false;
        }
        if !self.compared {
            return true;
        }
        self.sampled > 0 && self.missing.is_empty() && self.records.iter().all(RecordReport::passed)
    }

    /// `(passed, failed)` field comparisons.
    pub fn field_totals(&self) -> (usize, usize) {
        self.records.iter().fold((0, 0), |(ok, bad), record| {
            let failed = record.failures().count();
            (ok + record.fields.len() - failed, bad + failed)
        })
    }

    pub fn warning_count(&self) -> usize {
        self.records.iter().map(|r| r.warnings.len()).sum()
    }
}

/// Results for every reconciled entity plus the global verdict.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub entities: Vec<EntityReport>,
}

impl ReconciliationReport {
    pub fn passed(&self) -> bool {
        self.entities.iter().all(EntityReport::passed)
    }

    pub fn push(&mut self, report: EntityReport) {
        self.entities.push(report);
    }
}

/// Compares computed tables against reference samples.
#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Coverage only, no sample comparison.
    pub fn coverage_only(&self, entity: &EntityConfig, rows: &[Record]) -> EntityReport {
        self.empty_report(entity, rows, false)
    }

    /// An entity that could not be reconciled, e.g. its table is absent.
    pub fn unavailable(&self, entity: &EntityConfig, reason: impl Into<String>) -> EntityReport {
        let mut report = self.empty_report(entity, &[], entity.is_compared());
        report.error = Some(reason.into());
        report
    }

    /// Compare a reference sample against the computed rows.
    ///
    /// `warnings` maps lowercase row ids to replay warnings; they are
    /// attached to the matching record and never change the verdict.
    pub fn reconcile(
        &self,
        entity: &EntityConfig,
        sample: &[Record],
        rows: &[Record],
        warnings: &BTreeMap<String, Vec<String>>,
    ) -> EntityReport {
        let mut report = self.empty_report(entity, rows, true);
        report.sampled = sample.len();

        let by_id: BTreeMap<String, &Record> = rows
            .iter()
            .filter_map(|row| record_id(row, entity.id_column).map(|id| (id, row)))
            .collect();

        for reference in sample {
            let Some(id) = record_id(reference, "id") else {
                report.missing.push("<reference record without id>".into());
                continue;
            };
            match by_id.get(&id) {
                Some(computed) => report.records.push(RecordReport {
                    fields: compare_record(entity.fields, reference, computed, &self.config),
                    warnings: warnings.get(&id).cloned().unwrap_or_default(),
                    id,
                }),
                None => report.missing.push(id),
            }
        }

        let (ok, failed) = report.field_totals();
        if report.passed() {
            info!(entity = entity.name, sampled = report.sampled, fields = ok, "reconciled");
        } else {
            warn!(
                entity = entity.name,
                sampled = report.sampled,
                passed = ok,
                failed,
                missing = report.missing.len(),
                "reconciliation failed"
            );
        }
        report
    }

    fn empty_report(&self, entity: &EntityConfig, rows: &[Record], compared: bool) -> EntityReport {
        let columns: BTreeSet<String> = rows.iter().flat_map(|row| row.keys().cloned()).collect();
        EntityReport {
            entity: entity.name.to_string(),
            table: entity.table.to_string(),
            coverage: coverage(entity, &columns),
            compared,
            sampled: 0,
            records: Vec::new(),
            missing: Vec::new(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::catalogue::entity;
    use crate::coverage::Coverage;

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn delegator_rows() -> Vec<Record> {
        vec![record(json!({
            "delegator_id": "0xabc",
            "total_staked_tokens": "150",
            "total_unstaked_tokens": "60",
            "stakes_count": 1,
            "active_stakes_count": 1,
            "created_at": 1,
            "default_display_name": null,
        }))]
    }

    fn reference(id: &str, staked_wei: &str) -> Record {
        record(json!({
            "id": id,
            "totalStakedTokens": staked_wei,
            "totalUnstakedTokens": "60000000000000000000",
            "stakesCount": 1,
            "activeStakesCount": 1,
            "createdAt": 1,
            "defaultDisplayName": null,
        }))
    }

    #[test]
    fn matching_sample_passes() {
        let entity = entity("delegator").unwrap();
        let report = Reconciler::default().reconcile(
            entity,
            &[reference("0xABC", "150000000000000000000")],
            &delegator_rows(),
            &BTreeMap::new(),
        );
        assert!(report.passed(), "{report:#?}");
        assert_eq!(report.field_totals(), (6, 0));
        assert_eq!(report.coverage.count(Coverage::Covered), 6);
    }

    #[test]
    fn missing_key_is_its_own_failure() {
        let entity = entity("delegator").unwrap();
        let report = Reconciler::default().reconcile(
            entity,
            &[reference("0xdef", "1")],
            &delegator_rows(),
            &BTreeMap::new(),
        );
        assert!(!report.passed());
        assert_eq!(report.missing, vec!["0xdef".to_string()]);
        assert!(report.records.is_empty());
    }

    #[test]
    fn warnings_do_not_fail() {
        let entity = entity("delegator").unwrap();
        let warnings = BTreeMap::from([("0xabc".to_string(), vec!["ordering anomaly".to_string()])]);
        let report = Reconciler::default().reconcile(
            entity,
            &[reference("0xabc", "150000000000000000000")],
            &delegator_rows(),
            &warnings,
        );
        assert!(report.passed());
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn mismatch_fails_globally() {
        let entity = entity("delegator").unwrap();
        let bad = Reconciler::default().reconcile(
            entity,
            &[reference("0xabc", "999000000000000000000")],
            &delegator_rows(),
            &BTreeMap::new(),
        );
        assert_eq!(bad.field_totals(), (5, 1));

        let mut global = ReconciliationReport::default();
        global.push(Reconciler::default().coverage_only(entity, &delegator_rows()));
        assert!(global.passed());
        global.push(bad);
        assert!(!global.passed());
    }

    #[test]
    fn empty_sample_fails() {
        let entity = entity("delegator").unwrap();
        let report = Reconciler::default().reconcile(entity, &[], &delegator_rows(), &BTreeMap::new());
        assert!(!report.passed());
    }

    #[test]
    fn unavailable_entity_fails() {
        let entity = entity("indexer").unwrap();
        let report = Reconciler::default().unavailable(entity, "table indexer was not produced");
        assert!(!report.passed());
        assert_eq!(report.coverage.count(Coverage::Covered), 0);
    }
}
