//! HTTP API for the interpretation pipeline.
//!
//! Sessions are created, inspected, resolved and aborted over REST; stage
//! artifacts are served from the session workspace.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{CreateSessionRequest, OptionsRequest, ResolutionsRequest};
pub use response::{AmbiguitiesResponse, ApiError, ApiErrorResponse};
pub use state::AppState;
