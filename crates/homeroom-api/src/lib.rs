//! HTTP API surface for the Homeroom gamification engine.
//!
//! This crate provides an Axum server exposing the engine's inbound
//! interface to the host application: the world snapshot read-model,
//! XP and achievement grants, the daily claim, cosmetic settings, and
//! a manual tick trigger. Idempotent no-ops are successful responses
//! with zero effect; validation failures map to 4xx, store failures to
//! 500.
//!
//! Authentication/authorization and all UI rendering are the host
//! application's concern.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use state::AppState;
