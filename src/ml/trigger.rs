use super::features::build_training_set;
use super::model::{OutcomePredictor, TrainingReport};
use crate::types::Outcome;

/// Decides how the predictor reacts to a newly appended result.
///
/// Runs after the append has been applied to `history`.
pub trait RetrainPolicy: Send + Sync {
    fn on_append(&self, history: &[Outcome], predictor: &mut OutcomePredictor) -> Option<TrainingReport>;

    fn name(&self) -> &str;
}

/// Rebuild the training set from the whole history and refit on every append.
///
/// Each call is O(L) in the history length, so L submissions cost O(L^2)
/// in total. Histories here stay small; a windowed policy can replace this
/// one without touching callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullRefit;

impl RetrainPolicy for FullRefit {
    fn on_append(&self, history: &[Outcome], predictor: &mut OutcomePredictor) -> Option<TrainingReport> {
        let training_set = build_training_set(history);
        predictor.retrain(&training_set)
    }

    fn name(&self) -> &str {
        "full_refit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Outcome::*;

    #[test]
    fn test_full_refit_waits_for_three_results() {
        let mut predictor = OutcomePredictor::new();
        let policy = FullRefit;

        assert!(policy.on_append(&[Banker, Player], &mut predictor).is_none());
        assert!(!predictor.is_trained());

        let report = policy.on_append(&[Banker, Player, Tie], &mut predictor).unwrap();
        assert_eq!(report.samples, 1);
        assert!(predictor.is_trained());
    }

    #[test]
    fn test_full_refit_uses_entire_history() {
        let mut predictor = OutcomePredictor::new();
        let history = [Banker, Player, Tie, Banker, Banker, Player, Tie];
        let report = FullRefit.on_append(&history, &mut predictor).unwrap();
        assert_eq!(report.samples, history.len() - 2);
        assert_eq!(FullRefit.name(), "full_refit");
    }
}
