pub mod error;
pub mod handlers;
pub mod menu;
pub mod observability;
pub mod router;
pub mod state;
pub mod types;

pub use error::AppError;
pub use router::build_router;
pub use state::{AppState, build_state, build_state_with_stores};

#[cfg(test)]
pub(crate) mod test_support;
