use serde::{Deserialize, Serialize};

use super::outcome::{Outcome, NUM_OUTCOMES};

/// Predicted next outcome with its class distribution.
///
/// `probabilities` is indexed by outcome code: `[banker, player, tie]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub outcome: Outcome,
    pub probabilities: [f64; NUM_OUTCOMES],
}

impl Prediction {
    /// Build a prediction from a distribution, picking the most likely
    /// outcome. Ties go to the lowest code.
    pub fn from_probabilities(probabilities: [f64; NUM_OUTCOMES]) -> Self {
        let mut best = 0;
        for (i, &p) in probabilities.iter().enumerate().skip(1) {
            if p > probabilities[best] {
                best = i;
            }
        }
        let outcome = Outcome::from_code(best as u8).unwrap_or(Outcome::Banker);
        Self { outcome, probabilities }
    }

    pub fn probability_of(&self, outcome: Outcome) -> f64 {
        self.probabilities[outcome.code() as usize]
    }

    /// Probabilities scaled to percentages and rounded to two decimals.
    pub fn percentages(&self) -> [f64; NUM_OUTCOMES] {
        self.probabilities.map(|p| (p * 10_000.0).round() / 100.0)
    }
}
