//! Orchestration layer for the Homeroom gamification engine.
//!
//! [`CadenceEngine`] composes the pure logic of `homeroom-core` with
//! the stores of `homeroom-db` into the engine's inbound operations:
//! XP grants with idempotency guards, the daily care event lifecycle,
//! the weekly evaluation, and the cadence tick that advances every due
//! world.
//!
//! Concurrency rules are inherited from the data layer: unique
//! constraints absorb races, the XP counter moves only through atomic
//! increments, and no code path deduplicates in memory. Within one
//! call the ordering is fixed -- ledger insert, then increment, then
//! unlock diff -- so no caller can observe a level without its ledger
//! row.
//!
//! # Modules
//!
//! - [`signals`] -- The outbound attendance/assignment collaborator seam
//! - [`rewards`] -- `grant_xp` / `grant_achievements` (idempotency layer)
//! - [`daily`] -- Daily care spawn and claim lifecycle
//! - [`weekly`] -- Weekly evaluation engine
//! - [`tick`] -- The cadence scheduler entry point
//! - [`snapshot`] -- State access, snapshot read-model, cosmetics, logins
//! - [`error`] -- Engine error taxonomy

use std::sync::Arc;

use homeroom_core::{CadenceClock, EngineConfig};
use sqlx::PgPool;

pub mod daily;
pub mod error;
pub mod rewards;
pub mod signals;
pub mod snapshot;
pub mod tick;
pub mod weekly;

pub use error::EngineError;
pub use signals::{
    AssignmentSignal, AttendanceSignal, FixedSignalSource, NullSignalSource, PgSignalSource,
    SignalError, SignalSource,
};

/// The gamification cadence engine.
///
/// One instance serves every world state; it owns no per-world state
/// of its own, so request handlers and the periodic tick driver share
/// it freely (wrap in [`Arc`] for the HTTP layer).
pub struct CadenceEngine<S> {
    /// Connection pool for all stores.
    pub(crate) pool: PgPool,
    /// Immutable engine configuration.
    pub(crate) config: Arc<EngineConfig>,
    /// Cadence clock built from the schedule section.
    pub(crate) clock: CadenceClock,
    /// External signal collaborators.
    pub(crate) signals: S,
}

impl<S: SignalSource> CadenceEngine<S> {
    /// Build an engine from a pool, configuration, and signal source.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the schedule section is
    /// invalid.
    pub fn new(pool: PgPool, config: Arc<EngineConfig>, signals: S) -> Result<Self, EngineError> {
        let clock = config.cadence_clock()?;
        Ok(Self {
            pool,
            config,
            clock,
            signals,
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The cadence clock.
    pub const fn clock(&self) -> &CadenceClock {
        &self.clock
    }
}
