use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fold_reconcile::Record;
use fold_types::{Amount, TypeError};

/// Replay warnings: table name to row id to messages.
pub type Warnings = BTreeMap<String, BTreeMap<String, Vec<String>>>;

const DIGEST_DOMAIN: &str = "ledgerfold-snapshot-v1";

/// Builds one snapshot row.
///
/// Token amounts are written in display scale as decimal strings, counts and
/// timestamps as JSON numbers, and absent values as null.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row(Record);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, column: &str, value: impl Into<String>) -> Self {
        self.0.insert(column.into(), Value::String(value.into()));
        self
    }

    pub fn opt_text(mut self, column: &str, value: Option<&str>) -> Self {
        self.0
            .insert(column.into(), value.map_or(Value::Null, |v| Value::String(v.into())));
        self
    }

    pub fn tokens(self, column: &str, amount: Amount) -> Result<Self, TypeError> {
        Ok(self.decimal(column, amount.to_display()?))
    }

    pub fn decimal(mut self, column: &str, value: Decimal) -> Self {
        self.0.insert(column.into(), Value::String(value.normalize().to_string()));
        self
    }

    /// A unit count stored raw, e.g. active allocations.
    pub fn count(mut self, column: &str, amount: Amount) -> Result<Self, TypeError> {
        let count = i64::try_from(amount.raw()).map_err(|_| TypeError::DisplayOverflow(amount.raw()))?;
        self.0.insert(column.into(), Value::from(count));
        Ok(self)
    }

    pub fn number(mut self, column: &str, value: u64) -> Self {
        self.0.insert(column.into(), Value::from(value));
        self
    }

    pub fn timestamp(mut self, column: &str, secs: Option<i64>) -> Self {
        self.0.insert(column.into(), secs.map_or(Value::Null, Value::from));
        self
    }

    pub fn into_record(self) -> Record {
        self.0
    }
}

/// One computed entity table, rows ordered by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTable {
    pub name: String,
    pub id_column: String,
    pub rows: Vec<Record>,
}

impl SnapshotTable {
    pub fn new(name: impl Into<String>, id_column: impl Into<String>, rows: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            id_column: id_column.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row whose id column equals `id`, case-insensitively.
    pub fn row(&self, id: &str) -> Option<&Record> {
        self.rows.iter().find(|row| {
            row.get(&self.id_column)
                .and_then(Value::as_str)
                .is_some_and(|value| value.eq_ignore_ascii_case(id))
        })
    }
}

/// Every table of one run plus the warnings raised while computing them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSet {
    /// Timestamp of the latest event folded into the set.
    pub as_of: Option<DateTime<Utc>>,
    pub tables: BTreeMap<String, SnapshotTable>,
    #[serde(default)]
    pub warnings: Warnings,
}

impl SnapshotSet {
    pub fn insert(&mut self, table: SnapshotTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<&SnapshotTable> {
        self.tables.get(name)
    }

    pub fn warn(&mut self, table: &str, id: &str, message: impl Into<String>) {
        self.warnings
            .entry(table.to_string())
            .or_default()
            .entry(id.to_lowercase())
            .or_default()
            .push(message.into());
    }

    /// Warnings for `table`, keyed by lowercase row id.
    pub fn table_warnings(&self, table: &str) -> BTreeMap<String, Vec<String>> {
        self.warnings.get(table).cloned().unwrap_or_default()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.values().flat_map(|rows| rows.values()).map(Vec::len).sum()
    }

    /// Domain-separated BLAKE3 digest of the canonical JSON form, hex
    /// encoded. Identical inputs give identical digests.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let data = serde_json::to_vec(self)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(DIGEST_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(&data);
        Ok(hex::encode(hasher.finalize().as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn row_encodings() {
        let row = Row::new()
            .text("id", "0xabc")
            .opt_text("default_display_name", None)
            .tokens("staked_tokens", Amount::from_raw(150_000_000_000_000_000_000))
            .unwrap()
            .count("allocation_count", Amount::from(3))
            .unwrap()
            .timestamp("created_at", Some(1))
            .timestamp("last_undelegated_at", None)
            .into_record();
        assert_eq!(
            Value::Object(row),
            json!({
                "id": "0xabc",
                "default_display_name": null,
                "staked_tokens": "150",
                "allocation_count": 3,
                "created_at": 1,
                "last_undelegated_at": null,
            })
        );
    }

    #[test]
    fn rows_found_case_insensitively() {
        let table = SnapshotTable::new("delegator", "delegator_id", vec![Row::new().text("delegator_id", "0xabc").into_record()]);
        assert!(table.row("0xABC").is_some());
        assert!(table.row("0xdef").is_none());
    }

    #[test]
    fn digest_tracks_content() {
        let mut a = SnapshotSet::default();
        a.insert(SnapshotTable::new("signal", "id", vec![Row::new().text("id", "x").into_record()]));
        let b = a.clone();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.digest().unwrap().len(), 64);

        let mut c = a.clone();
        c.warn("signal", "X", "ordering anomaly");
        assert_ne!(a.digest().unwrap(), c.digest().unwrap());
        assert_eq!(c.table_warnings("signal")["x"].len(), 1);
        assert_eq!(c.warning_count(), 1);
    }
}
