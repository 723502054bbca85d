use serde::{Deserialize, Serialize};

use crate::error::{DatasError, DatasResult};

/// Configuration for a [`CommitStore`](crate::CommitStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitStoreConfig {
    /// Dataset used by [`CommitStore::default_head`](crate::CommitStore::default_head).
    pub default_dataset: String,
    /// Reject commits whose parents are not already stored.
    pub verify_parents: bool,
    /// How many times a compare-and-swap is retried when the store root
    /// moved because of a write to another dataset.
    pub max_root_retries: u32,
}

impl Default for CommitStoreConfig {
    fn default() -> Self {
        Self {
            default_dataset: "master".to_string(),
            verify_parents: true,
            max_root_retries: 16,
        }
    }
}

impl CommitStoreConfig {
    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(s: &str) -> DatasResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| DatasError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> DatasResult<String> {
        toml::to_string_pretty(self).map_err(|e| DatasError::Config(e.to_string()))
    }

    pub fn validate(&self) -> DatasResult<()> {
        if self.default_dataset.is_empty() {
            return Err(DatasError::Config("default_dataset must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = CommitStoreConfig::default();
        assert_eq!(c.default_dataset, "master");
        assert!(c.verify_parents);
        assert_eq!(c.max_root_retries, 16);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = CommitStoreConfig::from_toml_str("max_root_retries = 3\n").unwrap();
        assert_eq!(c.max_root_retries, 3);
        assert_eq!(c.default_dataset, "master");
        assert!(c.verify_parents);
    }

    #[test]
    fn toml_round_trip() {
        let c = CommitStoreConfig {
            default_dataset: "main".into(),
            verify_parents: false,
            max_root_retries: 1,
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(CommitStoreConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        assert!(matches!(
            CommitStoreConfig::from_toml_str("max_root_retries = \"many\""),
            Err(DatasError::Config(_))
        ));
        assert!(matches!(
            CommitStoreConfig::from_toml_str("default_dataset = \"\""),
            Err(DatasError::Config(_))
        ));
    }
}
