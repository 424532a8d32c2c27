pub mod billing;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod snapshot;
pub mod state;
pub mod store;

pub use error::{AppError, AppResult};
pub use state::AppState;
