//! Shared type definitions for the Homeroom gamification engine.
//!
//! This crate is the single source of truth for all types used across
//! the Homeroom workspace. Types defined here flow downstream to
//! `TypeScript` via `ts-rs` for the classroom web client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (XP sources, statuses, tiers, buckets)
//! - [`structs`] -- Core entity structs (world state, ledger, daily, weekly)
//! - [`outcomes`] -- Payloads returned by the engine's inbound operations

pub mod enums;
pub mod ids;
pub mod outcomes;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{DailyEventStatus, SignalBucket, WeeklyTier, XpSource};
pub use ids::{ClassroomId, DailyEventId, UserId, WeeklyResultId, WorldStateId, XpEventId};
pub use outcomes::{
    BatchGrantOutcome, ClaimOutcome, GrantOutcome, LoginOutcome, TickOutcome, WorldSnapshot,
};
pub use structs::{
    AchievementItem, BucketScores, DailyEvent, WeekWindow, WeeklyResult, WorldState, XpEvent,
};

#[cfg(test)]
mod tests {
    //! Integration tests for type exports and `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. Importing them here triggers generation.
        // The actual files are written to the `bindings/` directory
        // relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::WorldStateId::export_all();
        let _ = crate::ids::XpEventId::export_all();
        let _ = crate::ids::DailyEventId::export_all();
        let _ = crate::ids::WeeklyResultId::export_all();
        let _ = crate::ids::UserId::export_all();
        let _ = crate::ids::ClassroomId::export_all();

        // Enums
        let _ = crate::enums::XpSource::export_all();
        let _ = crate::enums::DailyEventStatus::export_all();
        let _ = crate::enums::WeeklyTier::export_all();
        let _ = crate::enums::SignalBucket::export_all();

        // Structs
        let _ = crate::structs::WorldState::export_all();
        let _ = crate::structs::XpEvent::export_all();
        let _ = crate::structs::DailyEvent::export_all();
        let _ = crate::structs::BucketScores::export_all();
        let _ = crate::structs::WeeklyResult::export_all();
        let _ = crate::structs::WeekWindow::export_all();
        let _ = crate::structs::AchievementItem::export_all();

        // Outcomes
        let _ = crate::outcomes::GrantOutcome::export_all();
        let _ = crate::outcomes::BatchGrantOutcome::export_all();
        let _ = crate::outcomes::ClaimOutcome::export_all();
        let _ = crate::outcomes::LoginOutcome::export_all();
        let _ = crate::outcomes::TickOutcome::export_all();
        let _ = crate::outcomes::WorldSnapshot::export_all();
    }
}
