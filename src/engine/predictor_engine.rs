use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PredictorError, PredictorResult};
use crate::ml::{
    build_query_features, ForestParams, FullRefit, OutcomePredictor, PersistedModel, PredictorState,
    RetrainPolicy, TrainingReport,
};
use crate::types::{Outcome, Prediction};

/// What happened when a result was accepted.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub outcome: Outcome,
    /// The result recorded just before this one, if any
    pub previous: Option<Outcome>,
    pub history_len: usize,
    pub report: Option<TrainingReport>,
}

/// How the engine was seeded at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    None,
    Imported,
    Refit,
}

/// Owner of the result history and the predictor fitted on it.
///
/// Not synchronised; wrap it in an [`EngineHandle`](super::EngineHandle)
/// to share it.
pub struct PredictionEngine {
    history: Vec<Outcome>,
    predictor: OutcomePredictor,
    policy: Box<dyn RetrainPolicy>,
}

impl PredictionEngine {
    pub fn new(params: ForestParams) -> Self {
        Self::with_policy(params, Box::new(FullRefit))
    }

    pub fn with_policy(params: ForestParams, policy: Box<dyn RetrainPolicy>) -> Self {
        Self {
            history: Vec::new(),
            predictor: OutcomePredictor::with_params(params),
            policy,
        }
    }

    /// Install a persisted history and, optionally, a persisted model.
    ///
    /// The model is only imported when it was fit on the results the log
    /// restored; a stale model (left over from before a reset, or fit on a
    /// different log) is discarded, as is one that fails to import.
    /// Whenever no model could be imported the predictor is refit from the
    /// seeded history.
    pub fn seed(&mut self, history: Vec<Outcome>, model: Option<&PersistedModel>) -> ModelSource {
        self.history = history;
        self.predictor.reset();

        if let Some(model) = model {
            if !model.matches_restored_history(self.history.len()) {
                warn!(
                    "Ignoring persisted model: fit on {} samples, log restored {} results",
                    model.samples,
                    self.history.len()
                );
            } else {
                match self.predictor.import_state(&model.state) {
                    Ok(()) => return ModelSource::Imported,
                    Err(e) => warn!("Ignoring persisted model: {}", e),
                }
            }
        }

        match self.policy.on_append(&self.history, &mut self.predictor) {
            Some(_) => {
                info!("Refit predictor from {} seeded results", self.history.len());
                ModelSource::Refit
            }
            None => ModelSource::None,
        }
    }

    /// Append a result and run the retrain policy.
    pub fn submit(&mut self, outcome: Outcome) -> Submission {
        let previous = self.history.last().copied();
        self.history.push(outcome);
        let report = self.policy.on_append(&self.history, &mut self.predictor);

        debug!(
            "Accepted {} (history {}, policy {})",
            outcome,
            self.history.len(),
            self.policy.name()
        );

        Submission {
            outcome,
            previous,
            history_len: self.history.len(),
            report,
        }
    }

    /// Validate a raw label and submit it. Rejected labels leave the
    /// engine untouched.
    #[cfg(test)]
    pub fn submit_label(&mut self, raw: &str) -> PredictorResult<Submission> {
        let outcome = Outcome::parse_label(raw)?;
        Ok(self.submit(outcome))
    }

    /// Best guess for the next result.
    pub fn query(&self) -> PredictorResult<Prediction> {
        let features = build_query_features(&self.history)?;
        self.predictor.predict(&features)
    }

    /// Forget all results and return the predictor to untrained.
    pub fn clear(&mut self) {
        let dropped = self.history.len();
        self.history.clear();
        self.predictor.reset();
        info!("History cleared ({} results dropped)", dropped);
    }

    pub fn history(&self) -> &[Outcome] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn predictor_state(&self) -> PredictorState {
        self.predictor.state()
    }

    pub fn export_state(&self) -> PredictorResult<String> {
        self.predictor.export_state()
    }

    pub fn trained_samples(&self) -> Option<usize> {
        self.predictor.trained_samples()
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

/// Engine failures that a caller should present as "no prediction yet"
/// rather than as an error.
pub fn is_not_ready(err: &PredictorError) -> bool {
    matches!(err, PredictorError::InsufficientHistory { .. } | PredictorError::NotTrained)
}
