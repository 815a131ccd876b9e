//! Cadence clock: timezone-correct date keys, trigger instants, and
//! week windows for the gamification engine.
//!
//! The clock is the single source of truth for all temporal state in
//! the engine. Every computation is deterministic given `(now,
//! timezone)` -- nothing here ever consults the host's local timezone.
//!
//! # Design Principles
//!
//! - Date keys are `YYYY-MM-DD` strings in the fixed configured zone.
//! - Trigger instants are wall-clock times resolved to UTC. DST gaps
//!   resolve to the earliest valid instant after the gap (bounded
//!   forward probe); DST folds resolve to the earlier occurrence.
//! - Forward scans are bounded (8 days) to guarantee termination.

use chrono::{DateTime, Datelike, Days, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use homeroom_types::WeekWindow;

use crate::config::ScheduleConfig;

/// Date key format for all calendar-day identifiers.
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Maximum days scanned forward when searching for a weekly trigger.
const WEEKLY_SCAN_DAYS: u64 = 8;

/// Quarter-hour steps probed forward across a DST gap.
const DST_PROBE_STEPS: u32 = 8;

/// Errors that can occur during cadence computations.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The configured timezone is not a known IANA identifier.
    #[error("unknown timezone: {name}")]
    UnknownTimezone {
        /// The identifier that failed to parse.
        name: String,
    },

    /// A configured weekday name is not a day of the week.
    #[error("unknown weekday: {name}")]
    UnknownWeekday {
        /// The name that failed to parse.
        name: String,
    },

    /// A configured trigger time is not a valid wall-clock time.
    #[error("invalid trigger time {hour:02}:{minute:02}")]
    InvalidTriggerTime {
        /// Configured hour.
        hour: u32,
        /// Configured minute.
        minute: u32,
    },

    /// A date key did not parse as `YYYY-MM-DD`.
    #[error("malformed date key: {key}")]
    BadDateKey {
        /// The offending key.
        key: String,
    },

    /// No valid local instant could be resolved (pathological zone data).
    #[error("no valid local instant for {date} in the configured zone")]
    NoValidLocalTime {
        /// The local date being resolved.
        date: NaiveDate,
    },
}

/// Timezone-correct cadence calculator.
///
/// Built from a validated [`ScheduleConfig`]; all methods are pure
/// functions of their inputs and the fixed configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceClock {
    /// The fixed IANA timezone.
    tz: Tz,
    /// Daily spawn wall-clock time.
    daily_spawn: NaiveTime,
    /// Weekday the weekly evaluation runs.
    weekly_weekday: Weekday,
    /// Weekly evaluation wall-clock time.
    weekly_time: NaiveTime,
    /// Weekday every trailing week window ends on.
    week_end: Weekday,
}

impl CadenceClock {
    /// Build a clock from the schedule configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] if the timezone, a weekday name, or a
    /// trigger time is invalid.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ScheduleError> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_err| ScheduleError::UnknownTimezone {
                name: config.timezone.clone(),
            })?;

        let daily_spawn = NaiveTime::from_hms_opt(config.daily_spawn.hour, config.daily_spawn.minute, 0)
            .ok_or(ScheduleError::InvalidTriggerTime {
                hour: config.daily_spawn.hour,
                minute: config.daily_spawn.minute,
            })?;

        let weekly_time = NaiveTime::from_hms_opt(config.weekly_time.hour, config.weekly_time.minute, 0)
            .ok_or(ScheduleError::InvalidTriggerTime {
                hour: config.weekly_time.hour,
                minute: config.weekly_time.minute,
            })?;

        Ok(Self {
            tz,
            daily_spawn,
            weekly_weekday: parse_weekday(&config.weekly_weekday)?,
            weekly_time,
            week_end: parse_weekday(&config.week_end_weekday)?,
        })
    }

    /// Return the configured timezone.
    pub const fn timezone(&self) -> Tz {
        self.tz
    }

    /// The calendar date at `now` in the fixed timezone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// Today's date key (`YYYY-MM-DD`) in the fixed timezone.
    pub fn today_key(&self, now: DateTime<Utc>) -> String {
        self.local_date(now).format(DATE_KEY_FORMAT).to_string()
    }

    /// The next instant of the daily spawn trigger, strictly after
    /// `now` -- today's occurrence if it has not yet passed, otherwise
    /// tomorrow's.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NoValidLocalTime`] if no candidate day
    /// yields a resolvable local instant.
    pub fn next_daily_trigger(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let today = self.local_date(now);
        // Two candidate days suffice; a third covers a DST probe that
        // lands exactly on `now`.
        for offset in 0..3u64 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                continue;
            };
            if let Some(instant) = self.resolve_local(date, self.daily_spawn) {
                if instant > now {
                    return Ok(instant);
                }
            }
        }
        Err(ScheduleError::NoValidLocalTime { date: today })
    }

    /// The next instant matching the weekly trigger weekday and time,
    /// strictly after `now`. The scan is bounded to 8 days.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NoValidLocalTime`] if the scan finds no
    /// resolvable instant.
    pub fn next_weekly_trigger(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let today = self.local_date(now);
        for offset in 0..WEEKLY_SCAN_DAYS {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                continue;
            };
            if date.weekday() != self.weekly_weekday {
                continue;
            }
            if let Some(instant) = self.resolve_local(date, self.weekly_time) {
                if instant > now {
                    return Ok(instant);
                }
            }
        }
        Err(ScheduleError::NoValidLocalTime { date: today })
    }

    /// The trailing 7-day window ending on the most recent occurrence
    /// of the configured week-end weekday (today, if today is that
    /// weekday). Both bounds are inclusive date keys.
    pub fn week_window(&self, now: DateTime<Utc>) -> WeekWindow {
        let today = self.local_date(now);
        let today_from_monday = today.weekday().num_days_from_monday();
        let end_from_monday = self.week_end.num_days_from_monday();
        let days_back = today_from_monday
            .checked_add(7)
            .and_then(|sum| sum.checked_sub(end_from_monday))
            .and_then(|diff| diff.checked_rem(7))
            .unwrap_or(0);

        let end = today
            .checked_sub_days(Days::new(u64::from(days_back)))
            .unwrap_or(today);
        let start = end.checked_sub_days(Days::new(6)).unwrap_or(end);

        WeekWindow {
            start: start.format(DATE_KEY_FORMAT).to_string(),
            end: end.format(DATE_KEY_FORMAT).to_string(),
        }
    }

    /// The UTC instant at which the local day containing `now` ends
    /// (start of the next local day). This is the claim deadline for a
    /// daily event spawned today.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NoValidLocalTime`] if midnight cannot
    /// be resolved (bounded probe exhausted).
    pub fn start_of_next_day(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let today = self.local_date(now);
        let tomorrow = today
            .checked_add_days(Days::new(1))
            .ok_or(ScheduleError::NoValidLocalTime { date: today })?;
        self.resolve_local(tomorrow, NaiveTime::MIN)
            .ok_or(ScheduleError::NoValidLocalTime { date: tomorrow })
    }

    /// The UTC bounds `[start, end)` of the local day containing `now`.
    /// Used to sum a source's ledger amounts for "today".
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NoValidLocalTime`] if either midnight
    /// cannot be resolved.
    pub fn utc_day_bounds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), ScheduleError> {
        let today = self.local_date(now);
        let start = self
            .resolve_local(today, NaiveTime::MIN)
            .ok_or(ScheduleError::NoValidLocalTime { date: today })?;
        let end = self.start_of_next_day(now)?;
        Ok((start, end))
    }

    /// Resolve a local wall-clock datetime to a UTC instant.
    ///
    /// A DST fold resolves to the earlier occurrence; a DST gap probes
    /// forward in quarter-hour steps (bounded) to the first valid
    /// instant after the gap.
    fn resolve_local(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        let mut naive = date.and_time(time);
        for _ in 0..DST_PROBE_STEPS {
            match self.tz.from_local_datetime(&naive) {
                LocalResult::Single(instant) => return Some(instant.with_timezone(&Utc)),
                LocalResult::Ambiguous(earlier, _later) => {
                    return Some(earlier.with_timezone(&Utc));
                }
                LocalResult::None => {
                    naive = naive.checked_add_signed(Duration::minutes(15))?;
                }
            }
        }
        None
    }
}

/// Parse a date key (`YYYY-MM-DD`) back into a [`NaiveDate`].
///
/// # Errors
///
/// Returns [`ScheduleError::BadDateKey`] if the key is malformed.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).map_err(|_err| ScheduleError::BadDateKey {
        key: key.to_owned(),
    })
}

/// Number of days between the Unix epoch date and the given date key.
/// Negative for dates before 1970-01-01.
///
/// # Errors
///
/// Returns [`ScheduleError::BadDateKey`] if the key is malformed.
pub fn day_index(key: &str) -> Result<i64, ScheduleError> {
    let date = parse_date_key(key)?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(date);
    Ok(date.signed_duration_since(epoch).num_days())
}

/// Whole weeks elapsed from `earlier` to `later` (both date keys).
///
/// # Errors
///
/// Returns [`ScheduleError::BadDateKey`] if either key is malformed.
pub fn weeks_between(earlier: &str, later: &str) -> Result<i64, ScheduleError> {
    let days = day_index(later)?.saturating_sub(day_index(earlier)?);
    Ok(days.checked_div(7).unwrap_or(0))
}

/// Parse a weekday name (case-insensitive English).
fn parse_weekday(name: &str) -> Result<Weekday, ScheduleError> {
    match name.to_lowercase().as_str() {
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        "sunday" => Ok(Weekday::Sun),
        other => Err(ScheduleError::UnknownWeekday {
            name: other.to_owned(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::TriggerTime;

    /// Clock over America/New_York with the default triggers:
    /// daily 06:00, weekly Saturday 07:30, week ends Friday.
    fn ny_clock() -> CadenceClock {
        CadenceClock::from_config(&ScheduleConfig::default()).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let config = ScheduleConfig {
            timezone: "Mars/Olympus_Mons".to_owned(),
            ..ScheduleConfig::default()
        };
        assert!(CadenceClock::from_config(&config).is_err());
    }

    #[test]
    fn unknown_weekday_is_rejected() {
        let config = ScheduleConfig {
            weekly_weekday: "caturday".to_owned(),
            ..ScheduleConfig::default()
        };
        assert!(CadenceClock::from_config(&config).is_err());
    }

    #[test]
    fn invalid_trigger_time_is_rejected() {
        let config = ScheduleConfig {
            daily_spawn: TriggerTime {
                hour: 24,
                minute: 0,
            },
            ..ScheduleConfig::default()
        };
        assert!(CadenceClock::from_config(&config).is_err());
    }

    #[test]
    fn today_key_uses_fixed_zone_not_utc() {
        let clock = ny_clock();
        // 03:00 UTC on March 1 is still Feb 28 in New York (UTC-5).
        let now = utc(2026, 3, 1, 3, 0);
        assert_eq!(clock.today_key(now), "2026-02-28");
    }

    #[test]
    fn daily_trigger_later_today_when_not_yet_passed() {
        let clock = ny_clock();
        // 09:00 UTC = 04:00 EST, before the 06:00 local spawn.
        let now = utc(2026, 1, 15, 9, 0);
        let next = clock.next_daily_trigger(now).unwrap();
        // 06:00 EST = 11:00 UTC same day.
        assert_eq!(next, utc(2026, 1, 15, 11, 0));
    }

    #[test]
    fn daily_trigger_tomorrow_when_already_passed() {
        let clock = ny_clock();
        // 13:00 UTC = 08:00 EST, after the 06:00 local spawn.
        let now = utc(2026, 1, 15, 13, 0);
        let next = clock.next_daily_trigger(now).unwrap();
        assert_eq!(next, utc(2026, 1, 16, 11, 0));
    }

    #[test]
    fn daily_trigger_is_strictly_after_now() {
        let clock = ny_clock();
        // Exactly at the trigger instant: the next one is tomorrow.
        let now = utc(2026, 1, 15, 11, 0);
        let next = clock.next_daily_trigger(now).unwrap();
        assert!(next > now);
        assert_eq!(next, utc(2026, 1, 16, 11, 0));
    }

    #[test]
    fn daily_trigger_crosses_a_dst_gap() {
        // US DST starts 2026-03-08; 02:30 local does not exist that day.
        let config = ScheduleConfig {
            daily_spawn: TriggerTime {
                hour: 2,
                minute: 30,
            },
            ..ScheduleConfig::default()
        };
        let clock = CadenceClock::from_config(&config).unwrap();
        // 06:00 UTC = 01:00 EST on the gap day.
        let now = utc(2026, 3, 8, 6, 0);
        let next = clock.next_daily_trigger(now).unwrap();
        assert!(next > now);
        // The probe lands at 03:00 EDT = 07:00 UTC.
        assert_eq!(next, utc(2026, 3, 8, 7, 0));
    }

    #[test]
    fn weekly_trigger_lands_on_configured_weekday() {
        let clock = ny_clock();
        // Thursday 2026-01-15.
        let now = utc(2026, 1, 15, 12, 0);
        let next = clock.next_weekly_trigger(now).unwrap();
        // Saturday 2026-01-17 at 07:30 EST = 12:30 UTC.
        assert_eq!(next, utc(2026, 1, 17, 12, 30));
    }

    #[test]
    fn weekly_trigger_skips_to_next_week_when_passed() {
        let clock = ny_clock();
        // Saturday 2026-01-17 at 14:00 UTC (= 09:00 EST, past 07:30).
        let now = utc(2026, 1, 17, 14, 0);
        let next = clock.next_weekly_trigger(now).unwrap();
        assert_eq!(next, utc(2026, 1, 24, 12, 30));
    }

    #[test]
    fn week_window_ends_on_most_recent_friday() {
        let clock = ny_clock();
        // Wednesday 2026-01-14 (local).
        let now = utc(2026, 1, 14, 18, 0);
        let window = clock.week_window(now);
        assert_eq!(window.end, "2026-01-09");
        assert_eq!(window.start, "2026-01-03");
    }

    #[test]
    fn week_window_on_the_week_end_day_ends_today() {
        let clock = ny_clock();
        // Friday 2026-01-16 (local).
        let now = utc(2026, 1, 16, 18, 0);
        let window = clock.week_window(now);
        assert_eq!(window.end, "2026-01-16");
        assert_eq!(window.start, "2026-01-10");
    }

    #[test]
    fn start_of_next_day_is_local_midnight() {
        let clock = ny_clock();
        let now = utc(2026, 1, 15, 13, 0);
        let deadline = clock.start_of_next_day(now).unwrap();
        // Midnight EST on Jan 16 = 05:00 UTC.
        assert_eq!(deadline, utc(2026, 1, 16, 5, 0));
    }

    #[test]
    fn utc_day_bounds_cover_the_local_day() {
        let clock = ny_clock();
        let now = utc(2026, 1, 15, 13, 0);
        let (start, end) = clock.utc_day_bounds(now).unwrap();
        assert_eq!(start, utc(2026, 1, 15, 5, 0));
        assert_eq!(end, utc(2026, 1, 16, 5, 0));
        assert!(start <= now && now < end);
    }

    #[test]
    fn day_index_counts_from_epoch() {
        assert_eq!(day_index("1970-01-01").unwrap(), 0);
        assert_eq!(day_index("1970-01-08").unwrap(), 7);
        assert!(day_index("1969-12-31").unwrap() < 0);
        assert!(day_index("not-a-date").is_err());
    }

    #[test]
    fn weeks_between_counts_whole_weeks() {
        assert_eq!(weeks_between("2026-01-03", "2026-01-10").unwrap(), 1);
        assert_eq!(weeks_between("2026-01-03", "2026-01-24").unwrap(), 3);
        assert_eq!(weeks_between("2026-01-03", "2026-01-08").unwrap(), 0);
    }
}
