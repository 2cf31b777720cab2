use std::path::Path;

use serde::{Deserialize, Serialize};

use fold_events::EventKind;
use fold_reconcile::ReconcileConfig;

use crate::error::ConfigError;
use crate::traits::SourceQuery;

/// Configuration for an engine run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for the per-key replay. `None` uses the global pool.
    pub workers: Option<usize>,
    /// Source tables to fetch, by name. Empty fetches every modelled kind.
    pub kinds: Vec<String>,
    /// Reconciliation settings used by `validate`.
    pub reconcile: ReconcileConfig,
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Parse("workers must be at least 1".into()));
        }
        self.query()?;
        self.reconcile.validate()?;
        Ok(())
    }

    /// The source query implied by `kinds`.
    pub fn query(&self) -> Result<SourceQuery, ConfigError> {
        if self.kinds.is_empty() {
            return Ok(SourceQuery::all());
        }
        let kinds = self
            .kinds
            .iter()
            .map(|name| EventKind::from_source(name).ok_or_else(|| ConfigError::UnknownKind(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SourceQuery { kinds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.query().unwrap().kinds.len(), EventKind::ALL.len());
    }

    #[test]
    fn parses_nested_reconcile_table() {
        let config = EngineConfig::from_toml_str(
            r#"
            workers = 4
            kinds = ["stake_delegated", "stake_delegated_locked"]

            [reconcile]
            tolerance = "0.005"
            samples = 25
            max_skew_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, Some(4));
        assert_eq!(
            config.query().unwrap().kinds,
            vec![EventKind::StakeDelegated, EventKind::StakeDelegatedLocked]
        );
        assert_eq!(config.reconcile.samples, 25);
        assert_eq!(config.reconcile.tolerance.to_string(), "0.005");
        assert_eq!(config.reconcile.max_skew_secs, Some(3));
    }

    #[test]
    fn rejects_unknown_kind_and_zero_workers() {
        assert_eq!(
            EngineConfig::from_toml_str(r#"kinds = ["allocation_resized"]"#).unwrap_err(),
            ConfigError::UnknownKind("allocation_resized".into())
        );
        assert!(matches!(
            EngineConfig::from_toml_str("workers = 0").unwrap_err(),
            ConfigError::Parse(_)
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[reconcile]\nsamples = 0").unwrap_err(),
            ConfigError::Reconcile(_)
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerfold.toml");
        std::fs::write(&path, "workers = 2\n").unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap().workers, Some(2));
        assert!(matches!(
            EngineConfig::load(&dir.path().join("absent.toml")).unwrap_err(),
            ConfigError::Io(_)
        ));
    }
}
