use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalogue::FieldSpec;
use crate::config::ReconcileConfig;
use crate::record::{self, Record};

/// Per-field comparison policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    /// Both sides must be the same whole number; any fractional part fails.
    ExactInteger,
    /// Relative error within the configured tolerance. An expected value of
    /// exactly zero only matches an actual of exactly zero.
    Tolerant,
    /// Unix seconds within `max_skew_secs` of each other.
    Timestamp { max_skew_secs: i64 },
    /// Strings equal ignoring ASCII case.
    CaseInsensitive,
}

/// Scale of reference values relative to computed ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scale {
    /// Reference is in wei, computed is in display units (10^18).
    Wei,
    Unit,
}

impl Scale {
    /// Bring a reference value to the computed scale.
    pub fn apply(self, value: Decimal) -> Option<Decimal> {
        match self {
            Self::Unit => Some(value),
            Self::Wei => {
                let scale = value.scale() + 18;
                if scale <= 28 {
                    let mut rescaled = value;
                    rescaled.set_scale(scale).ok()?;
                    Some(rescaled)
                } else {
                    value.checked_div(Decimal::from_i128_with_scale(10i128.pow(18), 0))
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldStatus {
    Match,
    Mismatch,
    /// A value could not be read; counts as a failure.
    Unparseable,
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Match => "OK",
            Self::Mismatch => "MISMATCH",
            Self::Unparseable => "UNPARSEABLE",
        })
    }
}

/// Result of comparing one field of one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOutcome {
    pub field: String,
    pub column: String,
    pub status: FieldStatus,
    /// Reference value after scaling, rendered.
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub detail: Option<String>,
}

impl FieldOutcome {
    pub fn passed(&self) -> bool {
        self.status == FieldStatus::Match
    }
}

struct Outcome {
    status: FieldStatus,
    expected: Option<String>,
    actual: Option<String>,
    detail: Option<String>,
}

impl Outcome {
    fn matched(expected: Option<String>, actual: Option<String>) -> Self {
        Self::new(FieldStatus::Match, expected, actual, None)
    }

    fn mismatch(expected: Option<String>, actual: Option<String>, detail: Option<String>) -> Self {
        Self::new(FieldStatus::Mismatch, expected, actual, detail)
    }

    fn unparseable(detail: String) -> Self {
        Self::new(FieldStatus::Unparseable, None, None, Some(detail))
    }

    fn new(status: FieldStatus, expected: Option<String>, actual: Option<String>, detail: Option<String>) -> Self {
        Self {
            status,
            expected,
            actual,
            detail,
        }
    }
}

fn is_null(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

/// Compare one field. `None` means the record does not carry the field.
pub fn compare_field(
    spec: &FieldSpec,
    reference: Option<&Value>,
    computed: Option<&Value>,
    config: &ReconcileConfig,
) -> FieldOutcome {
    let outcome = if is_null(reference) && is_null(computed) {
        Outcome::matched(None, None)
    } else {
        let reference = reference.unwrap_or(&Value::Null);
        let computed = computed.unwrap_or(&Value::Null);
        match spec.comparison {
            Comparison::CaseInsensitive => compare_text(reference, computed),
            Comparison::Timestamp { max_skew_secs } => {
                compare_timestamp(reference, computed, config.max_skew_secs.unwrap_or(max_skew_secs))
            }
            Comparison::ExactInteger => compare_numeric(spec.scale, reference, computed, exact_integer),
            Comparison::Tolerant => compare_numeric(spec.scale, reference, computed, |e, a| {
                tolerant(e, a, config.tolerance)
            }),
        }
    };

    FieldOutcome {
        field: spec.reference.to_string(),
        column: spec.column.to_string(),
        status: outcome.status,
        expected: outcome.expected,
        actual: outcome.actual,
        detail: outcome.detail,
    }
}

fn compare_text(reference: &Value, computed: &Value) -> Outcome {
    let expected = record::text(reference).unwrap_or_default();
    let actual = record::text(computed).unwrap_or_default();
    if expected.to_lowercase() == actual.to_lowercase() {
        Outcome::matched(Some(expected), Some(actual))
    } else {
        Outcome::mismatch(Some(expected), Some(actual), None)
    }
}

fn compare_timestamp(reference: &Value, computed: &Value, max_skew_secs: i64) -> Outcome {
    let expected = match record::timestamp(reference) {
        Ok(v) => v,
        Err(e) => return Outcome::unparseable(format!("reference: {e}")),
    };
    let actual = match record::timestamp(computed) {
        Ok(v) => v,
        Err(e) => return Outcome::unparseable(format!("computed: {e}")),
    };
    let render = |v: Option<i64>| v.map(|t| t.to_string());
    match (expected, actual) {
        (Some(e), Some(a)) if e.abs_diff(a) <= max_skew_secs.unsigned_abs() => {
            Outcome::matched(render(expected), render(actual))
        }
        (Some(e), Some(a)) => Outcome::mismatch(
            render(expected),
            render(actual),
            Some(format!("skew {}s exceeds {max_skew_secs}s", e.abs_diff(a))),
        ),
        _ => Outcome::mismatch(render(expected), render(actual), Some("one side is null".into())),
    }
}

fn compare_numeric<F>(scale: Scale, reference: &Value, computed: &Value, check: F) -> Outcome
where
    F: Fn(Decimal, Decimal) -> (bool, Option<String>),
{
    let expected = match record::numeric(reference) {
        Ok(Some(v)) => v,
        Ok(None) => Decimal::ZERO,
        Err(e) => return Outcome::unparseable(format!("reference: {e}")),
    };
    let Some(expected) = scale.apply(expected) else {
        return Outcome::unparseable(format!("reference {expected} cannot be rescaled"));
    };
    // A computed null reads as zero, the same as an absent balance.
    let actual = match record::numeric(computed) {
        Ok(v) => v.unwrap_or(Decimal::ZERO),
        Err(e) => return Outcome::unparseable(format!("computed: {e}")),
    };

    let (ok, detail) = check(expected, actual);
    let expected = Some(expected.normalize().to_string());
    let actual = Some(actual.normalize().to_string());
    if ok {
        Outcome::new(FieldStatus::Match, expected, actual, detail)
    } else {
        Outcome::mismatch(expected, actual, detail)
    }
}

fn exact_integer(expected: Decimal, actual: Decimal) -> (bool, Option<String>) {
    if !expected.fract().is_zero() || !actual.fract().is_zero() {
        return (false, Some("not a whole number".into()));
    }
    (expected == actual, None)
}

fn tolerant(expected: Decimal, actual: Decimal, tolerance: Decimal) -> (bool, Option<String>) {
    if expected.is_zero() {
        return (actual.is_zero(), None);
    }
    let Some(diff) = actual.checked_sub(expected) else {
        return (false, Some("difference overflowed".into()));
    };
    let Some(relative) = diff.abs().checked_div(expected.abs()) else {
        return (false, Some("relative error overflowed".into()));
    };
    let detail = match relative.checked_mul(Decimal::ONE_HUNDRED) {
        Some(percent) => format!("diff={percent:.4}%"),
        None => format!("diff={relative:.4}x"),
    };
    (relative <= tolerance, Some(detail))
}

/// Compare every configured field of one reference record against its
/// computed row.
pub fn compare_record(
    fields: &[FieldSpec],
    reference: &Record,
    computed: &Record,
    config: &ReconcileConfig,
) -> Vec<FieldOutcome> {
    fields
        .iter()
        .map(|spec| compare_field(spec, reference.get(spec.reference), computed.get(spec.column), config))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn config() -> ReconcileConfig {
        ReconcileConfig::default()
    }

    fn check(spec: FieldSpec, reference: Value, computed: Value) -> FieldOutcome {
        compare_field(&spec, Some(&reference), Some(&computed), &config())
    }

    #[test]
    fn zero_reference_rejects_any_nonzero() {
        let spec = FieldSpec::ratio("x", "x");
        let outcome = check(spec, json!("0"), json!("0.0000001"));
        assert_eq!(outcome.status, FieldStatus::Mismatch);
        assert!(check(spec, json!(0), json!("0")).passed());
    }

    #[test]
    fn within_tolerance_passes() {
        let spec = FieldSpec::ratio("x", "x");
        assert!(check(spec, json!("100"), json!("100.5")).passed());
        assert!(!check(spec, json!("100"), json!("101.5")).passed());
    }

    #[test]
    fn wei_reference_is_rescaled() {
        let spec = FieldSpec::tokens("stakedTokens", "staked_tokens");
        let outcome = check(spec, json!("1500000000000000000000"), json!("1500"));
        assert!(outcome.passed());
        assert_eq!(outcome.expected.as_deref(), Some("1500"));
    }

    #[test]
    fn scale_apply_handles_fractions() {
        assert_eq!(Scale::Wei.apply(dec("2.5")), Some(dec("0.0000000000000000025")));
        assert_eq!(Scale::Unit.apply(dec("2.5")), Some(dec("2.5")));
    }

    #[test]
    fn integers_compare_exactly() {
        let spec = FieldSpec::count("stakesCount", "stakes_count");
        assert!(check(spec, json!(3), json!(3)).passed());
        assert!(!check(spec, json!(3), json!(4)).passed());

        let fractional = check(spec, json!(3), json!("3.9"));
        assert_eq!(fractional.status, FieldStatus::Mismatch);
        assert_eq!(fractional.detail.as_deref(), Some("not a whole number"));
        assert!(!check(spec, json!("3.0000001"), json!(3)).passed());
        assert!(check(spec, json!("3.0"), json!(3)).passed());
    }

    #[test]
    fn huge_relative_error_is_a_mismatch() {
        let spec = FieldSpec::tokens("stakedTokens", "staked_tokens");
        let outcome = check(spec, json!("1"), json!("1000000000"));
        assert_eq!(outcome.status, FieldStatus::Mismatch);
        assert!(outcome.detail.as_deref().is_some_and(|d| d.starts_with("diff=")));

        let extreme = check(spec, json!("1"), json!("79228162514264337593543950335"));
        assert_eq!(extreme.status, FieldStatus::Mismatch);
        assert!(extreme.detail.is_some());
    }

    #[test]
    fn timestamps_allow_skew() {
        let spec = FieldSpec::timestamp("createdAt", "created_at");
        assert!(check(spec, json!(100), json!(101)).passed());
        assert!(!check(spec, json!(100), json!(102)).passed());
        assert!(!check(spec, json!(100), Value::Null).passed());

        let wide = ReconcileConfig {
            max_skew_secs: Some(5),
            ..ReconcileConfig::default()
        };
        assert!(compare_field(&spec, Some(&json!(100)), Some(&json!(104)), &wide).passed());
    }

    #[test]
    fn strings_ignore_case() {
        let spec = FieldSpec::text("defaultDisplayName", "default_display_name");
        assert!(check(spec, json!("Alice.eth"), json!("alice.ETH")).passed());
        assert!(!check(spec, json!("alice"), json!("bob")).passed());
        assert!(!check(spec, json!("alice"), Value::Null).passed());
    }

    #[test]
    fn both_null_passes() {
        let spec = FieldSpec::tokens("stakedTokens", "staked_tokens");
        assert!(compare_field(&spec, None, Some(&Value::Null), &config()).passed());
    }

    #[test]
    fn computed_null_reads_as_zero() {
        let spec = FieldSpec::tokens("stakedTokens", "staked_tokens");
        assert!(check(spec, json!("0"), Value::Null).passed());
        assert!(!check(spec, json!("1000000000000000000"), Value::Null).passed());
    }

    #[test]
    fn unparseable_reference_fails() {
        let spec = FieldSpec::tokens("stakedTokens", "staked_tokens");
        let outcome = check(spec, json!("n/a"), json!("1"));
        assert_eq!(outcome.status, FieldStatus::Unparseable);
        assert!(!outcome.passed());
    }

    #[test]
    fn record_compares_every_field() {
        let fields = [
            FieldSpec::tokens("stakedTokens", "staked_tokens"),
            FieldSpec::count("allocationCount", "allocation_count"),
        ];
        let reference = json!({"id": "0x1", "stakedTokens": "2000000000000000000", "allocationCount": 2});
        let computed = json!({"id": "0x1", "staked_tokens": "2", "allocation_count": 1});
        let outcomes = compare_record(
            &fields,
            reference.as_object().unwrap(),
            computed.as_object().unwrap(),
            &config(),
        );
        assert!(outcomes[0].passed());
        assert!(!outcomes[1].passed());
    }
}
