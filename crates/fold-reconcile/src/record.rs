use std::cmp::Ordering;
use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

/// One row of a computed table or a reference sample: field name to value.
pub type Record = Map<String, Value>;

/// Read a numeric value. `Ok(None)` for null.
///
/// Accepts JSON numbers and numeric strings, including exponent notation.
pub fn numeric(value: &Value) -> Result<Option<Decimal>, String> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            return Err(format!("expected a number, got {value}"));
        }
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|e| format!("{text:?} is not a number: {e}"))
}

/// Read a unix-seconds timestamp. `Ok(None)` for null.
///
/// Accepts integer or fractional seconds, numeric strings, and RFC 3339
/// strings.
pub fn timestamp(value: &Value) -> Result<Option<i64>, String> {
    if let Value::String(s) = value {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(s.trim()) {
            return Ok(Some(parsed.timestamp()));
        }
    }
    let Some(secs) = numeric(value)? else {
        return Ok(None);
    };
    i64::try_from(secs.round()).map(Some).map_err(|_| format!("timestamp {secs} is out of range"))
}

/// Read a value as text. Null reads as `None`; other scalars are rendered.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The record's `id` (or `column`) value as a lowercase string.
pub fn record_id(record: &Record, column: &str) -> Option<String> {
    record.get(column).and_then(text).map(|id| id.to_lowercase())
}

/// The first `n` records ordered by `field`, descending.
///
/// Records whose field does not parse as a number sort last; ties keep
/// input order.
pub fn sample_desc(records: &[Record], field: &str, n: usize) -> Vec<Record> {
    let mut keyed: Vec<(Option<Decimal>, &Record)> = records
        .iter()
        .map(|r| (r.get(field).and_then(|v| numeric(v).ok().flatten()), r))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    keyed.into_iter().take(n).map(|(_, r)| r.clone()).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn numeric_forms() {
        assert_eq!(numeric(&json!("100.5")).unwrap(), Some(Decimal::from_str("100.5").unwrap()));
        assert_eq!(numeric(&json!(42)).unwrap(), Some(Decimal::from(42)));
        assert_eq!(numeric(&json!("1.5e3")).unwrap(), Some(Decimal::from(1500)));
        assert_eq!(numeric(&Value::Null).unwrap(), None);
        assert!(numeric(&json!("abc")).is_err());
        assert!(numeric(&json!(true)).is_err());
    }

    #[test]
    fn timestamp_forms() {
        assert_eq!(timestamp(&json!(1700000000)).unwrap(), Some(1_700_000_000));
        assert_eq!(timestamp(&json!("1700000000")).unwrap(), Some(1_700_000_000));
        assert_eq!(timestamp(&json!("2023-11-14T22:13:20Z")).unwrap(), Some(1_700_000_000));
        assert_eq!(timestamp(&Value::Null).unwrap(), None);
    }

    #[test]
    fn ids_are_lowercased() {
        let row = record(json!({"id": "0xABC"}));
        assert_eq!(record_id(&row, "id").as_deref(), Some("0xabc"));
        assert_eq!(record_id(&row, "curator_id"), None);
    }

    #[test]
    fn sample_orders_descending() {
        let rows = vec![
            record(json!({"id": "a", "stakedTokens": "10"})),
            record(json!({"id": "b", "stakedTokens": "300"})),
            record(json!({"id": "c"})),
            record(json!({"id": "d", "stakedTokens": 20})),
        ];
        let ids: Vec<_> = sample_desc(&rows, "stakedTokens", 3)
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
    }
}
