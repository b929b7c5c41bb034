pub mod features;
pub mod forest;
pub mod model;
pub mod persistence;
pub mod trigger;

pub use features::build_query_features;
pub use forest::ForestParams;
pub use model::{OutcomePredictor, PredictorState, TrainingReport};
pub use persistence::{FileStore, PersistedModel, StateStore};
pub use trigger::{FullRefit, RetrainPolicy};
