use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ml::{PersistedModel, StateStore};
use crate::types::Outcome;

/// Immutable snapshot handed to the background writer. Captured while the
/// engine lock is held so the writer never reads live state.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistJob {
    AppendPair { previous: Outcome, current: Outcome },
    SaveModel(PersistedModel),
    ClearHistory,
    RemoveModel,
}

/// Spawn the task that applies persistence jobs in submission order.
///
/// Failures are logged and skipped. The task ends once every sender is
/// dropped and yields the number of jobs that succeeded.
pub fn spawn_persistence_writer(
    store: Arc<dyn StateStore>,
) -> (mpsc::UnboundedSender<PersistJob>, JoinHandle<usize>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<PersistJob>();

    let handle = tokio::spawn(async move {
        let mut written = 0;
        while let Some(job) = rx.recv().await {
            let result = match &job {
                PersistJob::AppendPair { previous, current } => store.append_pair(*previous, *current),
                PersistJob::SaveModel(model) => store.save_model(model),
                PersistJob::ClearHistory => store.clear_history(),
                PersistJob::RemoveModel => store.remove_model(),
            };
            match result {
                Ok(()) => {
                    written += 1;
                    debug!("Persisted {:?}", job);
                }
                Err(e) => warn!("Persistence job failed: {}", e),
            }
        }
        info!("Persistence writer stopped after {} jobs", written);
        written
    });

    (tx, handle)
}
