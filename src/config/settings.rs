use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ml::ForestParams;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub model: ModelSettings,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.host.trim().is_empty() {
            errors.push("server.host must not be empty".to_string());
        }
        if self.storage.history_csv.as_os_str().is_empty() {
            errors.push("storage.history_csv must not be empty".to_string());
        }
        if self.storage.model_path.as_os_str().is_empty() {
            errors.push("storage.model_path must not be empty".to_string());
        }
        if self.model.n_trees == 0 {
            errors.push("model.n_trees must be > 0".to_string());
        }
        if self.model.max_features == 0 || self.model.max_features > 2 {
            errors.push("model.max_features must be 1 or 2".to_string());
        }
        if self.model.min_samples_split < 2 {
            errors.push("model.min_samples_split must be >= 2".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub history_csv: PathBuf,
    pub model_path: PathBuf,
    /// Write the model file after every retrain
    pub persist_model: bool,
    /// Truncate the history log when the history is cleared
    pub clear_log_on_reset: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            history_csv: PathBuf::from("historical_results.csv"),
            model_path: PathBuf::from("baccarat_model.json"),
            persist_model: true,
            clear_log_on_reset: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub n_trees: usize,
    pub max_features: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        let params = ForestParams::default();
        Self {
            n_trees: params.n_trees,
            max_features: params.max_features,
            min_samples_split: params.min_samples_split,
            seed: params.seed,
        }
    }
}

impl ModelSettings {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            max_features: self.max_features,
            min_samples_split: self.min_samples_split,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 10000);
        assert_eq!(config.model.forest_params(), ForestParams::default());
    }

    #[test]
    fn test_validation_collects_errors() {
        let mut config = AppConfig::default();
        config.model.n_trees = 0;
        config.model.min_samples_split = 1;
        config.server.host = " ".to_string();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("n_trees")));
    }
}
