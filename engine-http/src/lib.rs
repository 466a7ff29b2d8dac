//! Thin HTTP boundary over the flow engine (§6). Request routing and JSON
//! (un)marshalling only — every non-trivial decision (validation,
//! navigation, scoring) happens in `engine-core`; this crate's job ends at
//! mapping HTTP in and out of it.

pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
