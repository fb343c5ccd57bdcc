use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use argus_core::orchestrator::FetchConfig;
use argus_core::reconcile::ReconcileConfig;
use argus_core::record::{FieldKey, NOT_AVAILABLE};

/// Run configuration, loaded from a JSON file. Every key is optional and
/// falls back to the defaults below; unknown keys are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub max_workers: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub validity_threshold: usize,
    pub sentinel: String,
    pub equality_keys: Vec<FieldKey>,
    pub priority_table: HashMap<String, u32>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            max_retries: 2,
            retry_delay_ms: 500,
            fetch_timeout_secs: 30,
            validity_threshold: 5,
            sentinel: NOT_AVAILABLE.to_string(),
            equality_keys: vec![FieldKey::Name, FieldKey::Ticker, FieldKey::Website],
            priority_table: HashMap::new(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid run configuration in {}", path.display()))
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            max_workers: self.max_workers,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            equality_keys: self.equality_keys.clone(),
            priority_table: self.priority_table.clone(),
            validity_threshold: self.validity_threshold,
            sentinel: self.sentinel.clone(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = RunConfig::default();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.sentinel, NOT_AVAILABLE);
        assert_eq!(config.equality_keys.len(), 3);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_workers": 2, "priority_table": {{"icodrops": 0, "trackico": 1}}}}"#
        )
        .unwrap();

        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.priority_table["icodrops"], 0);
        // untouched keys fall back
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.validity_threshold, 5);
    }

    #[test]
    fn equality_keys_parse_as_field_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"equality_keys": ["name", "ticker"]}}"#).unwrap();

        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(
            config.equality_keys,
            vec![FieldKey::Name, FieldKey::Ticker]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_wrokers": 2}}"#).unwrap();
        assert!(RunConfig::load(file.path()).is_err());
    }
}
