use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::error::{PredictorError, PredictorResult};
use crate::types::Outcome;

/// Version tag written into every model file
pub const MODEL_FORMAT_VERSION: &str = "1.0.0";

/// Model file contents: the predictor's exported state plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub samples: usize,
    pub state: String,
}

impl PersistedModel {
    pub fn new(state: String, samples: usize) -> Self {
        Self {
            version: MODEL_FORMAT_VERSION.to_string(),
            trained_at: Utc::now(),
            samples,
            state,
        }
    }

    /// Whether this model was fit on the results a restored log yields.
    ///
    /// The log has one row per result after the first, so a model fit on
    /// `n` results (`n - 2` samples) pairs with a restored history of
    /// `n - 1` results.
    pub fn matches_restored_history(&self, restored_len: usize) -> bool {
        self.samples + 1 == restored_len
    }
}

/// Durable storage for the result log and the fitted model.
#[cfg_attr(test, automock)]
pub trait StateStore: Send + Sync {
    /// Results recorded in the log, oldest first
    fn load_history(&self) -> PredictorResult<Vec<Outcome>>;

    /// Record a submitted result together with the one before it
    fn append_pair(&self, previous: Outcome, current: Outcome) -> PredictorResult<()>;

    fn clear_history(&self) -> PredictorResult<()>;

    fn load_model(&self) -> PredictorResult<Option<PersistedModel>>;

    fn save_model(&self, model: &PersistedModel) -> PredictorResult<()>;

    fn remove_model(&self) -> PredictorResult<()>;
}

fn unavailable(context: &str, path: &Path, err: impl std::fmt::Display) -> PredictorError {
    PredictorError::PersistenceUnavailable(format!("{} {}: {}", context, path.display(), err))
}

/// File-backed store: a two-column CSV of `previous,current` rows and a
/// JSON model file.
pub struct FileStore {
    history_path: PathBuf,
    model_path: PathBuf,
}

impl FileStore {
    pub fn new(history_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            history_path: history_path.into(),
            model_path: model_path.into(),
        }
    }

    #[cfg(test)]
    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn ensure_parent(path: &Path) -> PredictorResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| unavailable("Failed to create directory for", path, e))?;
            }
        }
        Ok(())
    }
}

impl StateStore for FileStore {
    fn load_history(&self) -> PredictorResult<Vec<Outcome>> {
        if !self.history_path.exists() {
            return Err(unavailable("History log not found:", &self.history_path, "starting empty"));
        }

        let content = std::fs::read_to_string(&self.history_path)
            .map_err(|e| unavailable("Failed to read history log", &self.history_path, e))?;

        // The current result of each row is in the second column
        let mut history = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some(label) = line.split(',').nth(1) else {
                warn!("History log line {}: missing second column, skipped", line_no + 1);
                continue;
            };
            match Outcome::parse_label(label) {
                Ok(outcome) => history.push(outcome),
                Err(e) => warn!("History log line {}: {}, skipped", line_no + 1, e),
            }
        }

        info!("Loaded {} results from {}", history.len(), self.history_path.display());
        Ok(history)
    }

    fn append_pair(&self, previous: Outcome, current: Outcome) -> PredictorResult<()> {
        Self::ensure_parent(&self.history_path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
            .map_err(|e| unavailable("Failed to open history log", &self.history_path, e))?;

        writeln!(file, "{},{}", previous, current)
            .map_err(|e| unavailable("Failed to append to history log", &self.history_path, e))?;

        debug!("Logged pair {},{}", previous, current);
        Ok(())
    }

    fn clear_history(&self) -> PredictorResult<()> {
        if self.history_path.exists() {
            std::fs::write(&self.history_path, "")
                .map_err(|e| unavailable("Failed to truncate history log", &self.history_path, e))?;
            info!("Truncated history log {}", self.history_path.display());
        }
        Ok(())
    }

    fn load_model(&self) -> PredictorResult<Option<PersistedModel>> {
        if !self.model_path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.model_path)
            .map_err(|e| unavailable("Failed to read model file", &self.model_path, e))?;
        let model: PersistedModel = serde_json::from_str(&json)
            .map_err(|e| PredictorError::CorruptState(format!("{}: {}", self.model_path.display(), e)))?;

        if model.version != MODEL_FORMAT_VERSION {
            return Err(PredictorError::CorruptState(format!(
                "unsupported model format version {}",
                model.version
            )));
        }

        info!(
            "Loaded model v{} trained at {} on {} samples from {}",
            model.version,
            model.trained_at.format("%Y-%m-%d %H:%M:%S"),
            model.samples,
            self.model_path.display()
        );
        Ok(Some(model))
    }

    fn save_model(&self, model: &PersistedModel) -> PredictorResult<()> {
        Self::ensure_parent(&self.model_path)?;
        let json = serde_json::to_string(model).map_err(|e| PredictorError::CorruptState(e.to_string()))?;

        // Write then rename so a crash never leaves a half-written model
        let tmp = self.model_path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| unavailable("Failed to write model file", &tmp, e))?;
        std::fs::rename(&tmp, &self.model_path)
            .map_err(|e| unavailable("Failed to replace model file", &self.model_path, e))?;

        debug!("Saved model ({} samples) to {}", model.samples, self.model_path.display());
        Ok(())
    }

    fn remove_model(&self) -> PredictorResult<()> {
        if self.model_path.exists() {
            std::fs::remove_file(&self.model_path)
                .map_err(|e| unavailable("Failed to remove model file", &self.model_path, e))?;
            info!("Removed model file {}", self.model_path.display());
        }
        Ok(())
    }
}
