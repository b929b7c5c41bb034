pub mod server;
pub mod api;
pub mod pages;
pub mod state;

pub use server::*;
pub use state::*;
