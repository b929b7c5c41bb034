use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task;
use tracing::{info, warn};

use super::predictor_engine::{PredictionEngine, Submission};
use super::writer::PersistJob;
use crate::error::PredictorResult;
use crate::ml::{PersistedModel, PredictorState};
use crate::types::{Outcome, Prediction};

/// Which side effects the handle forwards to the persistence writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOptions {
    pub save_model: bool,
    pub clear_log_on_reset: bool,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            save_model: true,
            clear_log_on_reset: false,
        }
    }
}

/// Consistent view of the engine taken under a single lock.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub history: Vec<Outcome>,
    pub predictor_state: PredictorState,
    pub trained_samples: Option<usize>,
    pub prediction: PredictorResult<Prediction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub history_len: usize,
    pub predictor_state: PredictorState,
    pub trained_samples: Option<usize>,
}

/// Shared, serialised access to a [`PredictionEngine`].
///
/// Every mutation (append, retrain, clear) runs under one mutex. Persistence
/// jobs are queued while that lock is held, so the writer sees them in the
/// same order as the mutations.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<Mutex<PredictionEngine>>,
    persist_tx: Option<mpsc::UnboundedSender<PersistJob>>,
    options: PersistOptions,
}

impl EngineHandle {
    #[cfg(test)]
    pub fn new(engine: PredictionEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            persist_tx: None,
            options: PersistOptions::default(),
        }
    }

    pub fn with_persistence(
        engine: PredictionEngine,
        persist_tx: mpsc::UnboundedSender<PersistJob>,
        options: PersistOptions,
    ) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            persist_tx: Some(persist_tx),
            options,
        }
    }

    fn enqueue(&self, job: PersistJob) {
        if let Some(tx) = &self.persist_tx {
            if tx.send(job).is_err() {
                warn!("Persistence writer is gone, dropping job");
            }
        }
    }

    /// Validate and record one result, retrain, and queue persistence.
    ///
    /// The refit runs on the blocking pool with the lock still held, so
    /// runtime workers stay free while mutations remain serialised.
    pub async fn submit_label(&self, raw: &str) -> PredictorResult<Submission> {
        let outcome = Outcome::parse_label(raw)?;

        let mut engine = Arc::clone(&self.engine).lock_owned().await;
        let (engine, submission) = match task::spawn_blocking(move || {
            let submission = engine.submit(outcome);
            (engine, submission)
        })
        .await
        {
            Ok(done) => done,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        if let Some(previous) = submission.previous {
            self.enqueue(PersistJob::AppendPair { previous, current: outcome });
        }
        if self.options.save_model {
            if let Some(report) = &submission.report {
                match engine.export_state() {
                    Ok(state) => self.enqueue(PersistJob::SaveModel(PersistedModel::new(state, report.samples))),
                    Err(e) => warn!("Could not export model state: {}", e),
                }
            }
        }

        Ok(submission)
    }

    pub async fn query(&self) -> PredictorResult<Prediction> {
        self.engine.lock().await.query()
    }

    pub async fn clear(&self) {
        let mut engine = self.engine.lock().await;
        engine.clear();
        if self.options.clear_log_on_reset {
            self.enqueue(PersistJob::ClearHistory);
        }
        if self.options.save_model {
            self.enqueue(PersistJob::RemoveModel);
        }
        info!("Engine reset");
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let engine = self.engine.lock().await;
        EngineSnapshot {
            history: engine.history().to_vec(),
            predictor_state: engine.predictor_state(),
            trained_samples: engine.trained_samples(),
            prediction: engine.query(),
        }
    }

    pub async fn status(&self) -> EngineStatus {
        let engine = self.engine.lock().await;
        EngineStatus {
            history_len: engine.len(),
            predictor_state: engine.predictor_state(),
            trained_samples: engine.trained_samples(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictorError;
    use crate::ml::{ForestParams, FullRefit, OutcomePredictor, RetrainPolicy, TrainingReport};
    use std::time::{Duration, Instant};
    use tokio_test::{assert_err, assert_ok};

    /// Full refit that also holds its thread for a while.
    struct SlowRefit(Duration);

    impl RetrainPolicy for SlowRefit {
        fn on_append(&self, history: &[Outcome], predictor: &mut OutcomePredictor) -> Option<TrainingReport> {
            std::thread::sleep(self.0);
            FullRefit.on_append(history, predictor)
        }

        fn name(&self) -> &str {
            "slow-refit"
        }
    }

    fn handle_with_channel(options: PersistOptions) -> (EngineHandle, mpsc::UnboundedReceiver<PersistJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EngineHandle::with_persistence(PredictionEngine::default(), tx, options), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PersistJob>) -> Vec<PersistJob> {
        let mut jobs = Vec::new();
        while let Ok(job) = rx.try_recv() {
            jobs.push(job);
        }
        jobs
    }

    #[tokio::test]
    async fn test_submit_queues_pair_snapshots() {
        let (handle, mut rx) = handle_with_channel(PersistOptions { save_model: false, clear_log_on_reset: false });

        assert_ok!(handle.submit_label("Banker").await);
        assert!(drain(&mut rx).is_empty());

        assert_ok!(handle.submit_label("player").await);
        assert_eq!(
            drain(&mut rx),
            vec![PersistJob::AppendPair { previous: Outcome::Banker, current: Outcome::Player }]
        );
    }

    #[tokio::test]
    async fn test_model_saved_after_each_retrain() {
        let (handle, mut rx) = handle_with_channel(PersistOptions::default());
        for label in ["Banker", "Player", "Tie", "Tie"] {
            assert_ok!(handle.submit_label(label).await);
        }
        let saves = drain(&mut rx)
            .into_iter()
            .filter(|job| matches!(job, PersistJob::SaveModel(_)))
            .count();
        assert_eq!(saves, 2);
    }

    #[tokio::test]
    async fn test_rejected_label_changes_nothing() {
        let (handle, mut rx) = handle_with_channel(PersistOptions::default());
        assert_ok!(handle.submit_label("Tie").await);

        let err = assert_err!(handle.submit_label("Dealer").await);
        assert_eq!(err, PredictorError::InvalidOutcomeLabel("Dealer".to_string()));
        assert_eq!(handle.status().await.history_len, 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_clear_and_query_gate() {
        let (handle, mut rx) = handle_with_channel(PersistOptions { save_model: false, clear_log_on_reset: true });
        for label in ["Banker", "Player", "Banker", "Tie", "Player", "Banker"] {
            assert_ok!(handle.submit_label(label).await);
        }
        assert_ok!(handle.query().await);

        handle.clear().await;
        let snapshot = handle.snapshot().await;
        assert!(snapshot.history.is_empty());
        assert_eq!(snapshot.predictor_state, PredictorState::Untrained);
        assert!(matches!(snapshot.prediction, Err(PredictorError::InsufficientHistory { have: 0, need: 6 })));
        assert_eq!(drain(&mut rx).last(), Some(&PersistJob::ClearHistory));
    }

    #[tokio::test]
    async fn test_clear_removes_saved_model() {
        let (handle, mut rx) = handle_with_channel(PersistOptions::default());
        for label in ["Banker", "Player", "Tie"] {
            assert_ok!(handle.submit_label(label).await);
        }
        drain(&mut rx);

        handle.clear().await;
        assert_eq!(drain(&mut rx), vec![PersistJob::RemoveModel]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_refit_does_not_block_runtime() {
        let engine = PredictionEngine::with_policy(ForestParams::default(), Box::new(SlowRefit(Duration::from_millis(300))));
        let handle = EngineHandle::new(engine);

        let (submitted_at, ticked_at) = tokio::join!(
            async {
                assert_ok!(handle.submit_label("Banker").await);
                Instant::now()
            },
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Instant::now()
            }
        );
        assert!(ticked_at < submitted_at);
        assert_eq!(handle.status().await.history_len, 1);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_are_serialised() {
        let handle = EngineHandle::new(PredictionEngine::default());
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let handle = handle.clone();
                let label = ["Banker", "Player", "Tie"][i % 3];
                tokio::spawn(async move { handle.submit_label(label).await })
            })
            .collect();
        for task in tasks {
            assert_ok!(task.await.unwrap());
        }

        let status = handle.status().await;
        assert_eq!(status.history_len, 20);
        assert_eq!(status.trained_samples, Some(18));
    }
}
