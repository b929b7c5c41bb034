use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{debug, info};

use super::settings::AppConfig;

/// Environment variable prefix, e.g. `PREDICTOR__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "PREDICTOR";

/// Load configuration: built-in defaults, then the TOML file at `path` if
/// it exists, then `PREDICTOR__*` environment variables (a `.env` file in
/// the working directory is honoured).
pub fn load_config(path: &str) -> Result<AppConfig> {
    match dotenvy::dotenv() {
        Ok(env_path) => debug!("Loaded environment from {}", env_path.display()),
        Err(_) => debug!("No .env file found"),
    }

    let defaults = config::Config::try_from(&AppConfig::default())
        .context("Failed to build default configuration")?;

    let settings = config::Config::builder()
        .add_source(defaults)
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to load configuration from {}", path))?;

    let config: AppConfig = settings
        .try_deserialize()
        .context("Invalid configuration")?;

    config
        .validate()
        .map_err(|errors| anyhow!("Invalid configuration: {}", errors.join(", ")))?;

    if Path::new(path).exists() {
        info!("Configuration loaded from {}", path);
    } else {
        info!("No configuration file at {}, using defaults", path);
    }
    Ok(config)
}

/// Write the default configuration as TOML.
pub fn write_default_config(path: &str) -> Result<()> {
    let toml = toml::to_string_pretty(&AppConfig::default())?;
    std::fs::write(path, toml).with_context(|| format!("Failed to write {}", path))?;
    info!("Wrote default configuration to {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config("definitely_missing_predictor_config.toml").unwrap();
        assert_eq!(config.storage, AppConfig::default().storage);
        assert_eq!(config.model, AppConfig::default().model);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("predictor_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("predictor.toml");
        std::fs::write(&path, "[model]\nn_trees = 10\nseed = 7\n\n[storage]\npersist_model = false\n").unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.model.n_trees, 10);
        assert_eq!(config.model.seed, 7);
        assert_eq!(config.model.max_features, 1);
        assert!(!config.storage.persist_model);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = std::env::temp_dir().join(format!("predictor_default_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("predictor.toml");
        write_default_config(path.to_str().unwrap()).unwrap();

        let parsed: AppConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, AppConfig::default());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = std::env::temp_dir().join(format!("predictor_bad_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("predictor.toml");
        std::fs::write(&path, "[model]\nn_trees = 0\n").unwrap();

        assert!(load_config(path.to_str().unwrap()).is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
