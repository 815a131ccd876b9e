//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the engine has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. All IDs use UUID v7
//! (time-ordered) for efficient database indexing.
//!
//! User and classroom IDs originate in the host application's roster
//! tables; the wrappers here only carry them through the engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a per-user, per-classroom world state.
    WorldStateId
}

define_id! {
    /// Unique identifier for an XP ledger event.
    XpEventId
}

define_id! {
    /// Unique identifier for a daily care event.
    DailyEventId
}

define_id! {
    /// Unique identifier for a weekly evaluation result.
    WeeklyResultId
}

define_id! {
    /// Identifier of a student user, owned by the host application.
    UserId
}

define_id! {
    /// Identifier of a classroom, owned by the host application.
    ClassroomId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let state = WorldStateId::new();
        let user = UserId::new();
        // These are different types -- the compiler enforces no mixing.
        assert_ne!(state.into_inner(), Uuid::nil());
        assert_ne!(user.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = DailyEventId::new();
        assert_eq!(format!("{id}"), format!("{}", id.into_inner()));
    }

    #[test]
    fn id_roundtrips_through_uuid() {
        let id = WeeklyResultId::new();
        let raw: Uuid = id.into();
        assert_eq!(WeeklyResultId::from(raw), id);
    }
}
