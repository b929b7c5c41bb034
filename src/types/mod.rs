pub mod outcome;
pub mod prediction;

pub use outcome::*;
pub use prediction::*;
