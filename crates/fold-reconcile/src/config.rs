use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Knobs for a reconciliation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Relative tolerance for tolerant numeric fields (0.01 = 1%).
    pub tolerance: Decimal,
    /// Reference records sampled per entity.
    pub samples: usize,
    /// Overrides the per-field timestamp skew when set.
    pub max_skew_secs: Option<i64>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(1, 2),
            samples: 10,
            max_skew_secs: None,
        }
    }
}

impl ReconcileConfig {
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.tolerance.is_sign_negative() {
            return Err(ReconcileError::InvalidConfig(format!(
                "tolerance must not be negative, got {}",
                self.tolerance
            )));
        }
        if self.samples == 0 {
            return Err(ReconcileError::InvalidConfig("samples must be at least 1".into()));
        }
        if matches!(self.max_skew_secs, Some(skew) if skew < 0) {
            return Err(ReconcileError::InvalidConfig("timestamp skew must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ReconcileConfig::default();
        assert_eq!(config.tolerance.to_string(), "0.01");
        assert_eq!(config.samples, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let config = ReconcileConfig {
            samples: 0,
            ..ReconcileConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ReconcileConfig {
            tolerance: Decimal::new(-1, 2),
            ..ReconcileConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
