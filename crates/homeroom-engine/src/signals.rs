//! External signal sources for the weekly evaluation.
//!
//! Attendance and assignment data belong to the host application's
//! domain tables; the engine consumes them read-only through the
//! [`SignalSource`] seam, keyed by `(user, classroom, date-range)`.
//! The care bucket is the engine's own daily-event history and does
//! not go through this trait.

use homeroom_types::{ClassroomId, UserId, WeekWindow};
use sqlx::PgPool;

/// Raw attendance counts over a week window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceSignal {
    /// Class days scheduled for the classroom in the window.
    pub scheduled_days: u32,
    /// Days the student was marked present.
    pub attended_days: u32,
}

/// Raw assignment counts over a week window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentSignal {
    /// Assignments due in the window.
    pub due_count: u32,
    /// Assignments the student submitted by their deadline.
    pub on_time_count: u32,
}

/// An external signal lookup failed.
#[derive(Debug, thiserror::Error)]
#[error("signal source error: {message}")]
pub struct SignalError {
    /// What went wrong.
    pub message: String,
}

impl From<sqlx::Error> for SignalError {
    fn from(source: sqlx::Error) -> Self {
        Self {
            message: source.to_string(),
        }
    }
}

/// Read-only access to the attendance and assignment collaborators.
///
/// Implementations must be cheap to call repeatedly; the scheduler
/// invokes them once per due state per weekly evaluation.
pub trait SignalSource {
    /// Attendance counts for the student over the window.
    fn attendance(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
        window: &WeekWindow,
    ) -> impl Future<Output = Result<AttendanceSignal, SignalError>> + Send;

    /// Assignment counts for the student over the window.
    fn assignments(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
        window: &WeekWindow,
    ) -> impl Future<Output = Result<AssignmentSignal, SignalError>> + Send;
}

// ---------------------------------------------------------------------------
// Postgres-backed source
// ---------------------------------------------------------------------------

/// Signal source reading the host application's roster tables.
///
/// Expected (host-owned, read-only here) schema:
///
/// | Table | Columns used |
/// |-------|--------------|
/// | `class_days` | `classroom_id UUID`, `day TEXT` |
/// | `attendance_records` | `classroom_id`, `user_id`, `day TEXT`, `present BOOL` |
/// | `assignments` | `id UUID`, `classroom_id`, `due_day TEXT`, `due_at TIMESTAMPTZ` |
/// | `assignment_submissions` | `assignment_id`, `user_id`, `submitted_at TIMESTAMPTZ` |
#[derive(Clone)]
pub struct PgSignalSource {
    pool: PgPool,
}

impl PgSignalSource {
    /// Create a source over the host application's database pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SignalSource for PgSignalSource {
    async fn attendance(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
        window: &WeekWindow,
    ) -> Result<AttendanceSignal, SignalError> {
        let scheduled: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM class_days
             WHERE classroom_id = $1 AND day >= $2 AND day <= $3",
        )
        .bind(classroom_id.into_inner())
        .bind(&window.start)
        .bind(&window.end)
        .fetch_one(&self.pool)
        .await?;

        let attended: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance_records
             WHERE classroom_id = $1 AND user_id = $2
               AND day >= $3 AND day <= $4 AND present",
        )
        .bind(classroom_id.into_inner())
        .bind(user_id.into_inner())
        .bind(&window.start)
        .bind(&window.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(AttendanceSignal {
            scheduled_days: u32::try_from(scheduled).unwrap_or(0),
            attended_days: u32::try_from(attended).unwrap_or(0),
        })
    }

    async fn assignments(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
        window: &WeekWindow,
    ) -> Result<AssignmentSignal, SignalError> {
        let due: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM assignments
             WHERE classroom_id = $1 AND due_day >= $2 AND due_day <= $3",
        )
        .bind(classroom_id.into_inner())
        .bind(&window.start)
        .bind(&window.end)
        .fetch_one(&self.pool)
        .await?;

        let on_time: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM assignments a
             JOIN assignment_submissions s
               ON s.assignment_id = a.id AND s.user_id = $2
             WHERE a.classroom_id = $1
               AND a.due_day >= $3 AND a.due_day <= $4
               AND s.submitted_at <= a.due_at",
        )
        .bind(classroom_id.into_inner())
        .bind(user_id.into_inner())
        .bind(&window.start)
        .bind(&window.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(AssignmentSignal {
            due_count: u32::try_from(due).unwrap_or(0),
            on_time_count: u32::try_from(on_time).unwrap_or(0),
        })
    }
}

// ---------------------------------------------------------------------------
// Null source
// ---------------------------------------------------------------------------

/// A source reporting no scheduled days and no due assignments, so the
/// attendance and assignment buckets are always excluded. Useful in
/// tests and for deployments that only run the care loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSignalSource;

impl SignalSource for NullSignalSource {
    async fn attendance(
        &self,
        _user_id: UserId,
        _classroom_id: ClassroomId,
        _window: &WeekWindow,
    ) -> Result<AttendanceSignal, SignalError> {
        Ok(AttendanceSignal::default())
    }

    async fn assignments(
        &self,
        _user_id: UserId,
        _classroom_id: ClassroomId,
        _window: &WeekWindow,
    ) -> Result<AssignmentSignal, SignalError> {
        Ok(AssignmentSignal::default())
    }
}

/// A fixed-value source for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedSignalSource {
    /// Attendance counts returned for every window.
    pub attendance: AttendanceSignal,
    /// Assignment counts returned for every window.
    pub assignments: AssignmentSignal,
}

impl SignalSource for FixedSignalSource {
    async fn attendance(
        &self,
        _user_id: UserId,
        _classroom_id: ClassroomId,
        _window: &WeekWindow,
    ) -> Result<AttendanceSignal, SignalError> {
        Ok(self.attendance)
    }

    async fn assignments(
        &self,
        _user_id: UserId,
        _classroom_id: ClassroomId,
        _window: &WeekWindow,
    ) -> Result<AssignmentSignal, SignalError> {
        Ok(self.assignments)
    }
}
