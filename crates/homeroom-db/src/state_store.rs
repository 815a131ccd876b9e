//! Operations on the `world_states` table.
//!
//! The world state is the only row with hot mutable fields. Two rules
//! keep it correct under concurrency:
//!
//! - Creation is race-safe: `INSERT ... ON CONFLICT DO NOTHING
//!   RETURNING` tells the caller whether it won the race, and the loser
//!   re-reads the winner's row.
//! - The `xp` counter and the track-point rollover are mutated only
//!   through single atomic UPDATE expressions computed from the old row
//!   values -- never read-modify-write in application code.

use chrono::{DateTime, Utc};
use homeroom_types::{ClassroomId, UserId, WorldState, WorldStateId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Column list shared by every query returning a full state row.
const STATE_COLUMNS: &str = "id, user_id, classroom_id, xp, selected_image, overlay_enabled, \
     streak_days, last_login_day, next_daily_spawn_at, next_weekly_eval_at, \
     weekly_track_level, weekly_track_points, created_at, updated_at";

/// Operations on the `world_states` table.
pub struct WorldStateStore<'a> {
    pool: &'a PgPool,
}

impl<'a> WorldStateStore<'a> {
    /// Create a new store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a state by its owning user and classroom.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
    ) -> Result<Option<WorldState>, DbError> {
        let row = sqlx::query_as::<_, WorldStateRow>(&format!(
            "SELECT {STATE_COLUMNS} FROM world_states WHERE user_id = $1 AND classroom_id = $2"
        ))
        .bind(user_id.into_inner())
        .bind(classroom_id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        row.map(WorldState::try_from).transpose()
    }

    /// Fetch a state by its row id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_by_id(&self, id: WorldStateId) -> Result<Option<WorldState>, DbError> {
        let row = sqlx::query_as::<_, WorldStateRow>(&format!(
            "SELECT {STATE_COLUMNS} FROM world_states WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        row.map(WorldState::try_from).transpose()
    }

    /// Attempt to create a fresh state.
    ///
    /// Returns `Ok(None)` when a concurrent caller created the row
    /// first (uniqueness on `(user_id, classroom_id)`); the caller
    /// should re-read and use the winner's row. Never surfaces a
    /// duplicate-key error.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails for any other
    /// reason.
    pub async fn create(&self, params: &NewWorldState) -> Result<Option<WorldState>, DbError> {
        let row = sqlx::query_as::<_, WorldStateRow>(&format!(
            "INSERT INTO world_states (id, user_id, classroom_id, next_daily_spawn_at, next_weekly_eval_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, classroom_id) DO NOTHING
             RETURNING {STATE_COLUMNS}"
        ))
        .bind(params.id.into_inner())
        .bind(params.user_id.into_inner())
        .bind(params.classroom_id.into_inner())
        .bind(params.next_daily_spawn_at)
        .bind(params.next_weekly_eval_at)
        .fetch_optional(self.pool)
        .await?;

        row.map(WorldState::try_from).transpose()
    }

    /// Atomically add XP to a state and return the new total.
    ///
    /// The increment is a single UPDATE expression, so concurrent
    /// grants for the same state serialize at the row and no increment
    /// is ever lost.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RowNotFound`] if the state does not exist,
    /// or [`DbError::Postgres`] on query failure.
    pub async fn add_xp(&self, id: WorldStateId, amount: u32) -> Result<u64, DbError> {
        let new_xp: Option<i64> = sqlx::query_scalar(
            "UPDATE world_states
             SET xp = xp + $2, updated_at = now()
             WHERE id = $1
             RETURNING xp",
        )
        .bind(id.into_inner())
        .bind(i64::from(amount))
        .fetch_optional(self.pool)
        .await?;

        let new_xp = new_xp.ok_or_else(|| DbError::RowNotFound(format!("world_states {id}")))?;
        Ok(u64::try_from(new_xp).unwrap_or(0))
    }

    /// Atomically add track points with rollover into the track level.
    ///
    /// The quotient/remainder are computed from the old row values in
    /// one UPDATE, so concurrent callers cannot double-count or lose a
    /// rollover. Returns `(track_level, track_points)` after the
    /// update. `points_per_level` must be at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RowNotFound`] if the state does not exist,
    /// or [`DbError::Postgres`] on query failure.
    pub async fn add_track_points(
        &self,
        id: WorldStateId,
        points: u32,
        points_per_level: u32,
    ) -> Result<(u32, u32), DbError> {
        let per_level = points_per_level.max(1);
        let row: Option<(i32, i32)> = sqlx::query_as(
            "UPDATE world_states
             SET weekly_track_level = weekly_track_level + (weekly_track_points + $2) / $3,
                 weekly_track_points = (weekly_track_points + $2) % $3,
                 updated_at = now()
             WHERE id = $1
             RETURNING weekly_track_level, weekly_track_points",
        )
        .bind(id.into_inner())
        .bind(i32::try_from(points).unwrap_or(i32::MAX))
        .bind(i32::try_from(per_level).unwrap_or(i32::MAX))
        .fetch_optional(self.pool)
        .await?;

        let (level, remainder) =
            row.ok_or_else(|| DbError::RowNotFound(format!("world_states {id}")))?;
        Ok((
            u32::try_from(level).unwrap_or(0),
            u32::try_from(remainder).unwrap_or(0),
        ))
    }

    /// Set the overlay visibility flag.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn set_overlay(&self, id: WorldStateId, enabled: bool) -> Result<(), DbError> {
        sqlx::query("UPDATE world_states SET overlay_enabled = $2, updated_at = now() WHERE id = $1")
            .bind(id.into_inner())
            .bind(enabled)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Set the selected cosmetic image index.
    ///
    /// The engine validates that the index is unlocked before calling.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn set_selected_image(&self, id: WorldStateId, index: u32) -> Result<(), DbError> {
        sqlx::query("UPDATE world_states SET selected_image = $2, updated_at = now() WHERE id = $1")
            .bind(id.into_inner())
            .bind(i32::try_from(index).unwrap_or(i32::MAX))
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Record a login day and the resulting streak length.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn set_login(
        &self,
        id: WorldStateId,
        day: &str,
        streak_days: u32,
    ) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE world_states
             SET last_login_day = $2, streak_days = $3, updated_at = now()
             WHERE id = $1",
        )
        .bind(id.into_inner())
        .bind(day)
        .bind(i32::try_from(streak_days).unwrap_or(i32::MAX))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Advance the next daily spawn instant. Rescheduling always moves
    /// forward regardless of whether an event row was created.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn reschedule_daily(
        &self,
        id: WorldStateId,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE world_states SET next_daily_spawn_at = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id.into_inner())
        .bind(at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Advance the next weekly evaluation instant.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn reschedule_weekly(
        &self,
        id: WorldStateId,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE world_states SET next_weekly_eval_at = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id.into_inner())
        .bind(at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// States whose daily spawn is due at `now` (or never computed),
    /// bounded batch.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn due_daily(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WorldState>, DbError> {
        self.due_batch("next_daily_spawn_at", now, limit).await
    }

    /// States whose weekly evaluation is due at `now` (or never
    /// computed), bounded batch.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn due_weekly(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WorldState>, DbError> {
        self.due_batch("next_weekly_eval_at", now, limit).await
    }

    /// Shared due-set query over one of the trigger columns.
    async fn due_batch(
        &self,
        column: &'static str,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WorldState>, DbError> {
        let rows = sqlx::query_as::<_, WorldStateRow>(&format!(
            "SELECT {STATE_COLUMNS} FROM world_states
             WHERE {column} IS NULL OR {column} <= $1
             ORDER BY {column} ASC NULLS FIRST
             LIMIT $2"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(WorldState::try_from).collect()
    }
}

/// Parameters for creating a fresh world state.
pub struct NewWorldState {
    /// Pre-generated row id.
    pub id: WorldStateId,
    /// Owning user.
    pub user_id: UserId,
    /// Owning classroom.
    pub classroom_id: ClassroomId,
    /// Initial daily spawn instant.
    pub next_daily_spawn_at: DateTime<Utc>,
    /// Initial weekly evaluation instant.
    pub next_weekly_eval_at: DateTime<Utc>,
}

/// A row from the `world_states` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorldStateRow {
    /// Row UUID.
    pub id: Uuid,
    /// Owning user UUID.
    pub user_id: Uuid,
    /// Owning classroom UUID.
    pub classroom_id: Uuid,
    /// Cumulative XP.
    pub xp: i64,
    /// Selected cosmetic index.
    pub selected_image: i32,
    /// Overlay visibility flag.
    pub overlay_enabled: bool,
    /// Consecutive login days.
    pub streak_days: i32,
    /// Last login date key.
    pub last_login_day: Option<String>,
    /// Next daily spawn instant.
    pub next_daily_spawn_at: Option<DateTime<Utc>>,
    /// Next weekly evaluation instant.
    pub next_weekly_eval_at: Option<DateTime<Utc>>,
    /// Weekly track level.
    pub weekly_track_level: i32,
    /// Weekly track points below the next level.
    pub weekly_track_points: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WorldStateRow> for WorldState {
    type Error = DbError;

    fn try_from(row: WorldStateRow) -> Result<Self, DbError> {
        Ok(Self {
            id: WorldStateId::from(row.id),
            user_id: UserId::from(row.user_id),
            classroom_id: ClassroomId::from(row.classroom_id),
            xp: u64::try_from(row.xp).unwrap_or(0),
            selected_image: u32::try_from(row.selected_image).unwrap_or(0),
            overlay_enabled: row.overlay_enabled,
            streak_days: u32::try_from(row.streak_days).unwrap_or(0),
            last_login_day: row.last_login_day,
            next_daily_spawn_at: row.next_daily_spawn_at,
            next_weekly_eval_at: row.next_weekly_eval_at,
            weekly_track_level: u32::try_from(row.weekly_track_level).unwrap_or(0),
            weekly_track_points: u32::try_from(row.weekly_track_points).unwrap_or(0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
