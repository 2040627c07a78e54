//! coedit server - HTTP/JSON and WebSocket front end for coedit sessions
//!
//! Every route is a thin adapter over [`coedit_core::SessionRegistry`]:
//! extract the session id, look the session up, lock it, call one method,
//! and wrap the result in the `{"status": ...}` envelope.

pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
