//! Data layer for the Homeroom gamification engine (`PostgreSQL`).
//!
//! A single `PostgreSQL` database holds all engine state. Idempotency
//! and concurrency safety live at this layer as unique constraints and
//! single-statement atomic updates; the engine above composes them but
//! never deduplicates in memory.
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool, configuration, and migrations
//! - [`state_store`] -- World states (race-safe create, atomic counters)
//! - [`xp_store`] -- Append-only XP ledger
//! - [`grant_store`] -- Reward grant idempotency records
//! - [`unlock_store`] -- Cosmetic unlocks
//! - [`daily_store`] -- Daily care events (conditional claim, expiry)
//! - [`weekly_store`] -- Weekly results (insert-once per week)
//! - [`error`] -- Shared error types

pub mod daily_store;
pub mod error;
pub mod grant_store;
pub mod postgres;
pub mod state_store;
pub mod unlock_store;
pub mod weekly_store;
pub mod xp_store;

// Re-export primary types for convenience.
pub use daily_store::{CareCounts, DailyEventRow, DailyEventStore, NewDailyEvent};
pub use error::DbError;
pub use grant_store::RewardGrantStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use state_store::{NewWorldState, WorldStateRow, WorldStateStore};
pub use unlock_store::UnlockStore;
pub use weekly_store::{NewWeeklyResult, WeeklyResultRow, WeeklyResultStore};
pub use xp_store::{NewXpEvent, XpEventRow, XpEventStore};
