use thiserror::Error;

/// Failures surfaced by the prediction engine.
///
/// None of these are fatal: labels are rejected at the ingest boundary,
/// insufficient history is reported as "no prediction yet" and persistence
/// problems degrade to in-memory defaults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictorError {
    #[error("Invalid outcome label '{0}': expected Banker, Player or Tie")]
    InvalidOutcomeLabel(String),

    #[error("At least {need} results are required to predict (have {have})")]
    InsufficientHistory { have: usize, need: usize },

    #[error("Predictor has not been trained yet")]
    NotTrained,

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Corrupt model state: {0}")]
    CorruptState(String),
}

pub type PredictorResult<T> = std::result::Result<T, PredictorError>;
