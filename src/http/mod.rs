//! HTTP control surface for the metering subsystem
//!
//! Presentation and integration layers (navigation, voice input, AI response
//! glue) drive the controller through this REST API instead of holding it
//! directly:
//! - POST /conversations/start - Open a context and start a session
//! - POST /conversations/:user_id/stop - Stop the active session
//! - POST /conversations/:user_id/end - End the conversation
//! - GET /conversations/:user_id/status - Current countdown snapshot
//! - GET /conversations/:user_id/limits - Usage-limit check
//! - GET /conversations/:user_id/usage - Cached authority accounting row
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, StartConversationError};
