use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use fold_types::{Amount, EventPosition};

use crate::error::DecodeError;
use crate::event::LedgerEvent;
use crate::kind::EventKind;

/// One raw tabular row: column name to JSON value.
pub type SourceRow = Map<String, Value>;

/// Rows fetched from one source table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBatch {
    /// Event kind name, e.g. `stake_delegated`.
    pub kind: String,
    /// Provenance label; defaults to the kind name.
    #[serde(default)]
    pub table: Option<String>,
    pub rows: Vec<SourceRow>,
}

impl SourceBatch {
    pub fn new(kind: impl Into<String>, rows: Vec<SourceRow>) -> Self {
        Self {
            kind: kind.into(),
            table: None,
            rows,
        }
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.kind)
    }
}

/// Decode every row of a batch.
pub fn decode_batch(batch: &SourceBatch) -> Result<Vec<LedgerEvent>, DecodeError> {
    let table = batch.table_name();
    let kind = EventKind::from_source(&batch.kind).ok_or_else(|| DecodeError::UnknownKind {
        table: table.to_string(),
        kind: batch.kind.clone(),
    })?;

    let events = batch
        .rows
        .iter()
        .enumerate()
        .map(|(row, columns)| decode_row(kind, table, row, columns))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(%kind, table, rows = events.len(), "decoded batch");
    Ok(events)
}

/// Decode several batches, stopping at the first error.
pub fn decode_batches(batches: &[SourceBatch]) -> Result<Vec<Vec<LedgerEvent>>, DecodeError> {
    batches.iter().map(decode_batch).collect()
}

fn decode_row(
    kind: EventKind,
    table: &str,
    row: usize,
    columns: &SourceRow,
) -> Result<LedgerEvent, DecodeError> {
    let schema = kind.schema();
    let cx = RowContext { table, row, columns };

    let timestamp = cx.integer("timestamp")?;
    let timestamp = i64::try_from(timestamp).map_err(|_| cx.invalid("timestamp", "out of range"))?;
    let block_number = cx.integer("block_number")?;
    let block_number = u64::try_from(block_number).map_err(|_| cx.invalid("block_number", "must be non-negative"))?;
    let log_index = match cx.optional("log_index") {
        Some(_) => {
            let raw = cx.integer("log_index")?;
            Some(u32::try_from(raw).map_err(|_| cx.invalid("log_index", "out of range"))?)
        }
        None => None,
    };

    let mut event = LedgerEvent::new(kind, EventPosition::new(timestamp, block_number, log_index));
    event.source_table = table.to_string();

    for role in schema.roles {
        let column = role.column();
        let raw = cx.text(column)?;
        let id = role
            .normalize(raw)
            .map_err(|e| cx.invalid(column, &e.to_string()))?;
        event.parties.insert(*role, id);
    }

    for magnitude in schema.magnitudes {
        // Synthetic magnitudes never appear in a schema (checked by test).
        let Some(column) = magnitude.column() else {
            continue;
        };
        let amount = Amount::from_raw(cx.integer(column)?);
        if amount.is_negative() {
            return Err(DecodeError::NegativeMagnitude {
                table: table.to_string(),
                row,
                column,
            });
        }
        event.magnitudes.insert(*magnitude, amount);
    }

    if let Some(column) = schema.text {
        event.text = Some(cx.text(column)?.to_string());
    }

    Ok(event)
}

struct RowContext<'a> {
    table: &'a str,
    row: usize,
    columns: &'a SourceRow,
}

impl<'a> RowContext<'a> {
    fn optional(&self, column: &'static str) -> Option<&'a Value> {
        self.columns.get(column).filter(|v| !v.is_null())
    }

    fn required(&self, column: &'static str) -> Result<&'a Value, DecodeError> {
        self.optional(column).ok_or_else(|| DecodeError::MissingColumn {
            table: self.table.to_string(),
            row: self.row,
            column,
        })
    }

    fn invalid(&self, column: &'static str, reason: &str) -> DecodeError {
        DecodeError::InvalidColumn {
            table: self.table.to_string(),
            row: self.row,
            column,
            reason: reason.to_string(),
        }
    }

    fn text(&self, column: &'static str) -> Result<&'a str, DecodeError> {
        self.required(column)?
            .as_str()
            .ok_or_else(|| self.invalid(column, "expected a string"))
    }

    /// Exact integer from a JSON integer or a base-10 digit string.
    ///
    /// JSON floats are rejected: large on-chain magnitudes lose precision as
    /// doubles and must be shipped as strings.
    fn integer(&self, column: &'static str) -> Result<i128, DecodeError> {
        match self.required(column)? {
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(i128::from(v))
                } else if let Some(v) = n.as_u64() {
                    Ok(i128::from(v))
                } else {
                    Err(self.invalid(column, "not an exact integer; send large values as strings"))
                }
            }
            Value::String(s) => Amount::parse(s)
                .map(Amount::raw)
                .map_err(|e| self.invalid(column, &e.to_string())),
            _ => Err(self.invalid(column, "expected an integer")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::{Magnitude, Role};

    fn row(value: Value) -> SourceRow {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn decodes_delegation_row() {
        let batch = SourceBatch::new(
            "stake_delegated",
            vec![row(json!({
                "delegator_id": "0xDEL",
                "indexer_id": "0xIDX",
                "tokens": "1000000000000000000000",
                "shares": 500,
                "timestamp": 1700000000,
                "block_number": 42,
                "log_index": 3
            }))],
        );
        let events = decode_batch(&batch).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.kind, EventKind::StakeDelegated);
        assert_eq!(event.party(Role::Delegator).unwrap().as_str(), "0xdel");
        assert_eq!(event.magnitude(Magnitude::Tokens).raw(), 10i128.pow(21));
        assert_eq!(event.magnitude(Magnitude::Shares).raw(), 500);
        assert_eq!(event.position, EventPosition::new(1_700_000_000, 42, Some(3)));
    }

    #[test]
    fn unknown_kind_is_fatal() {
        let batch = SourceBatch::new("allocation_resized", vec![]);
        assert!(matches!(decode_batch(&batch), Err(DecodeError::UnknownKind { .. })));
    }

    #[test]
    fn missing_magnitude_is_fatal() {
        let batch = SourceBatch::new(
            "stake_deposited",
            vec![row(json!({"indexer_id": "0x1", "timestamp": 1, "block_number": 1}))],
        );
        assert_eq!(
            decode_batch(&batch),
            Err(DecodeError::MissingColumn {
                table: "stake_deposited".into(),
                row: 0,
                column: "tokens",
            })
        );
    }

    #[test]
    fn float_magnitude_is_rejected() {
        let batch = SourceBatch::new(
            "stake_deposited",
            vec![row(json!({"indexer_id": "0x1", "tokens": 1.5e21, "timestamp": 1, "block_number": 1}))],
        );
        assert!(matches!(
            decode_batch(&batch),
            Err(DecodeError::InvalidColumn { column: "tokens", .. })
        ));
    }

    #[test]
    fn negative_magnitude_is_rejected() {
        let batch = SourceBatch::new(
            "stake_deposited",
            vec![row(json!({"indexer_id": "0x1", "tokens": "-5", "timestamp": 1, "block_number": 1}))],
        );
        assert!(matches!(
            decode_batch(&batch),
            Err(DecodeError::NegativeMagnitude { column: "tokens", .. })
        ));
    }

    #[test]
    fn error_names_the_offending_row() {
        let good = row(json!({"indexer_id": "0x1", "tokens": 1, "timestamp": 1, "block_number": 1}));
        let bad = row(json!({"indexer_id": 7, "tokens": 1, "timestamp": 1, "block_number": 1}));
        let mut batch = SourceBatch::new("stake_deposited", vec![good, bad]);
        batch.table = Some("warehouse.stake_deposited".into());
        match decode_batch(&batch) {
            Err(DecodeError::InvalidColumn { table, row, column, .. }) => {
                assert_eq!(table, "warehouse.stake_deposited");
                assert_eq!(row, 1);
                assert_eq!(column, "indexer_id");
            }
            other => panic!("expected InvalidColumn, got {other:?}"),
        }
    }

    #[test]
    fn default_name_keeps_text() {
        let batch = SourceBatch::new(
            "gns_set_default_name",
            vec![row(json!({"graph_account": "0xA", "name": "Alice", "timestamp": 9, "block_number": 9}))],
        );
        let events = decode_batch(&batch).unwrap();
        assert_eq!(events[0].text.as_deref(), Some("Alice"));
        assert_eq!(events[0].position.log_index, None);
    }
}
