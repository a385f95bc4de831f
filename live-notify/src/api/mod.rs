//! HTTP API.
//!
//! Optional inbound command surface: subscribe, unsubscribe and status
//! queries over JSON/plain text.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiHandle, ApiServer, AppState, build_router};
