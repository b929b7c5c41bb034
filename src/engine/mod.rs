pub mod handle;
pub mod predictor_engine;
pub mod writer;

pub use handle::*;
pub use predictor_engine::*;
pub use writer::*;
