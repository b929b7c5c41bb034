use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::features::{FeatureVector, TrainingSet};
use super::forest::{ForestParams, RandomForest};
use crate::error::PredictorError;
use crate::types::{Prediction, NUM_OUTCOMES};

/// Training report after model fit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub accuracy: f64,
    /// Label counts indexed by outcome code
    pub class_counts: [usize; NUM_OUTCOMES],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PredictorState {
    Untrained,
    Trained,
}

/// Serialized predictor state
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelState {
    params: ForestParams,
    samples: usize,
    forest: RandomForest,
}

/// Next-outcome classifier over the two-result window.
///
/// Every `retrain` is a full refit on the given set; there is no
/// incremental update of the fitted forest.
pub struct OutcomePredictor {
    params: ForestParams,
    model: Option<ModelState>,
}

impl OutcomePredictor {
    pub fn new() -> Self {
        Self::with_params(ForestParams::default())
    }

    pub fn with_params(params: ForestParams) -> Self {
        Self { params, model: None }
    }

    pub fn state(&self) -> PredictorState {
        if self.model.is_some() {
            PredictorState::Trained
        } else {
            PredictorState::Untrained
        }
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Number of samples the current model was fit on.
    pub fn trained_samples(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.samples)
    }

    /// Refit from scratch. An empty set leaves the predictor untouched and
    /// returns `None`.
    pub fn retrain(&mut self, training_set: &TrainingSet) -> Option<TrainingReport> {
        if training_set.is_empty() {
            debug!("Skipping retrain: no training samples yet");
            return None;
        }

        let (features, labels) = training_set.to_arrays();
        let forest = RandomForest::fit(&features, &labels, &self.params);

        let n = training_set.len();
        let mut correct = 0;
        let mut class_counts = [0usize; NUM_OUTCOMES];
        for (feat, label) in training_set.samples() {
            let probs = forest.predict_proba(&feat.to_array());
            if Prediction::from_probabilities(probs).outcome.code() == *label {
                correct += 1;
            }
            if let Some(c) = class_counts.get_mut(*label as usize) {
                *c += 1;
            }
        }
        let accuracy = correct as f64 / n as f64;

        info!(
            "Model retrained: {} samples, {:.1}% training accuracy, max depth {}, class counts {:?}",
            n,
            accuracy * 100.0,
            forest.max_depth(),
            class_counts
        );

        self.model = Some(ModelState {
            params: self.params.clone(),
            samples: n,
            forest,
        });

        Some(TrainingReport { samples: n, accuracy, class_counts })
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictorError> {
        let model = self.model.as_ref().ok_or(PredictorError::NotTrained)?;
        let prediction = Prediction::from_probabilities(model.forest.predict_proba(&features.to_array()));
        debug!(
            "Prediction for {:?}: {} {:?}",
            features, prediction.outcome, prediction.probabilities
        );
        Ok(prediction)
    }

    /// Return to the untrained state.
    pub fn reset(&mut self) {
        self.model = None;
    }

    /// Serialize the fitted model to a JSON blob
    pub fn export_state(&self) -> Result<String, PredictorError> {
        let model = self.model.as_ref().ok_or(PredictorError::NotTrained)?;
        serde_json::to_string(model).map_err(|e| PredictorError::CorruptState(e.to_string()))
    }

    /// Replace the fitted model with one from `export_state`. A blob that
    /// fails to parse or validate leaves the predictor unchanged. Later
    /// refits keep using this predictor's own parameters.
    pub fn import_state(&mut self, blob: &str) -> Result<(), PredictorError> {
        let model: ModelState =
            serde_json::from_str(blob).map_err(|e| PredictorError::CorruptState(e.to_string()))?;
        model
            .forest
            .validate(FeatureVector::NUM_FEATURES)
            .map_err(PredictorError::CorruptState)?;

        info!(
            "Loaded model state: {} trees, fit on {} samples",
            model.forest.n_trees(),
            model.samples
        );
        self.model = Some(model);
        Ok(())
    }
}

impl Default for OutcomePredictor {
    fn default() -> Self {
        Self::new()
    }
}
