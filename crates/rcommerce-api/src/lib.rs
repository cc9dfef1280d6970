pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{job_error_response, ApiError, ErrorBody};
pub use server::run;
pub use state::AppState;

// Re-export commonly used types
pub use rcommerce_core::*;
