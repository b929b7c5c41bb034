use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::PredictorError;
use crate::types::Outcome;

/// Minimum number of recorded results before a prediction is offered.
/// Feature construction only needs two, this is a confidence gate.
pub const MIN_PREDICTION_HISTORY: usize = 6;

/// The two outcomes preceding a target, as outcome codes (oldest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub second_last: u8,
    pub last: u8,
}

impl FeatureVector {
    pub const NUM_FEATURES: usize = 2;

    pub fn from_window(second_last: Outcome, last: Outcome) -> Self {
        Self {
            second_last: second_last.code(),
            last: last.code(),
        }
    }

    pub fn to_array(&self) -> [f64; Self::NUM_FEATURES] {
        [self.second_last as f64, self.last as f64]
    }
}

/// Feature/label pairs derived from a history snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    samples: Vec<(FeatureVector, u8)>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[(FeatureVector, u8)] {
        &self.samples
    }

    /// Lay the set out as a feature matrix (n x 2) and a label vector.
    pub fn to_arrays(&self) -> (Array2<f64>, Array1<usize>) {
        let n = self.samples.len();
        let mut features = Array2::<f64>::zeros((n, FeatureVector::NUM_FEATURES));
        let mut labels = Array1::<usize>::zeros(n);

        for (i, (feat, label)) in self.samples.iter().enumerate() {
            for (j, &val) in feat.to_array().iter().enumerate() {
                features[[i, j]] = val;
            }
            labels[i] = *label as usize;
        }

        (features, labels)
    }
}

/// Slide a width-2 window over the history: sample `i - 2` uses
/// `history[i-2], history[i-1]` as features and `history[i]` as label.
/// Fewer than three results yield an empty set.
pub fn build_training_set(history: &[Outcome]) -> TrainingSet {
    let samples = history
        .windows(3)
        .map(|w| (FeatureVector::from_window(w[0], w[1]), w[2].code()))
        .collect();
    TrainingSet { samples }
}

/// Features for predicting the result that follows `history`.
pub fn build_query_features(history: &[Outcome]) -> Result<FeatureVector, PredictorError> {
    if history.len() < MIN_PREDICTION_HISTORY {
        return Err(PredictorError::InsufficientHistory {
            have: history.len(),
            need: MIN_PREDICTION_HISTORY,
        });
    }
    let n = history.len();
    Ok(FeatureVector::from_window(history[n - 2], history[n - 1]))
}
