//! Shared state for the HTTP API.

use homeroom_engine::CadenceEngine;

/// State shared by every request handler.
///
/// The engine is stateless per-request, so one instance (behind
/// [`std::sync::Arc`]) serves all handlers and the tick driver.
pub struct AppState<S> {
    /// The cadence engine.
    pub engine: CadenceEngine<S>,
}

impl<S> AppState<S> {
    /// Wrap an engine for sharing across handlers.
    pub const fn new(engine: CadenceEngine<S>) -> Self {
        Self { engine }
    }
}
