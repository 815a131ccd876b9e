//! Error types for the engine layer.
//!
//! The taxonomy mirrors the engine contract: validation errors reject
//! the call with nothing mutated; races and idempotent no-ops are not
//! errors at all (they surface as `Ok` outcomes with zero effect); and
//! store failures propagate as internal errors.

use homeroom_core::schedule::ScheduleError;
use homeroom_core::ConfigError;
use homeroom_db::DbError;
use homeroom_types::XpSource;

use crate::signals::SignalError;

/// Errors that can occur in the engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An achievement kind is not in the catalog. Nothing was mutated.
    #[error("unknown achievement kind: {kind}")]
    UnknownAchievement {
        /// The unrecognized kind.
        kind: String,
    },

    /// A cosmetic index that is not unlocked was selected.
    #[error("image index {index} is not unlocked")]
    ImageLocked {
        /// The locked index.
        index: u32,
    },

    /// An XP source that is not directly grantable was passed to
    /// `grant_xp` (achievement and weekly-bonus XP flow through their
    /// own paths).
    #[error("source {xp_source:?} is not directly grantable")]
    SourceNotDirect {
        /// The rejected source.
        xp_source: XpSource,
    },

    /// A store operation failed.
    #[error("store error: {source}")]
    Db {
        /// The underlying data layer error.
        #[from]
        source: DbError,
    },

    /// A cadence computation failed.
    #[error("schedule error: {source}")]
    Schedule {
        /// The underlying schedule error.
        #[from]
        source: ScheduleError,
    },

    /// Configuration could not be loaded or validated.
    #[error("config error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// An external signal lookup failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying signal error.
        #[from]
        source: SignalError,
    },
}
