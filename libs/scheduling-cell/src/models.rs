use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::{Result, SchedulingError};

// ==============================================================================
// RANGES
// ==============================================================================

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(SchedulingError::bad_input(format!(
                "Date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Rejects inverted ranges and ranges longer than `max_days`.
    pub fn ensure_valid(&self, max_days: i64) -> Result<()> {
        if self.start > self.end {
            return Err(SchedulingError::bad_input(format!(
                "Date range start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.num_days() > max_days {
            return Err(SchedulingError::bad_input(format!(
                "Date range {}..={} spans {} days, limit is {}",
                self.start,
                self.end,
                self.num_days(),
                max_days
            )));
        }
        Ok(())
    }

    /// `[start 00:00, end + 1 day 00:00)` in UTC.
    pub fn to_time_range(&self) -> TimeRange {
        TimeRange {
            start: start_of_day(self.start),
            end: start_of_day(self.end) + Duration::days(1),
        }
    }
}

/// Half-open range of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(SchedulingError::bad_input(format!(
                "Time range start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        intervals_overlap(self.start, self.end, start, end)
    }

    /// Smallest date range covering every instant of this range.
    pub fn covering_dates(&self) -> DateRange {
        let last_instant = self.end - Duration::nanoseconds(1);
        DateRange {
            start: self.start.date_naive(),
            end: last_instant.date_naive().max(self.start.date_naive()),
        }
    }
}

/// Half-open interval overlap: `a_start < b_end && a_end > b_start`.
pub fn intervals_overlap<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && a_end > b_start
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

pub fn at_time(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

/// A time-of-day span, e.g. working hours or a lunch break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSpan {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        let span = Self { start, end };
        span.validate()?;
        Ok(span)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(SchedulingError::bad_input(format!(
                "Start time {} must be before end time {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

// ==============================================================================
// AVAILABILITY WINDOWS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from.map_or(true, |from| from <= date)
            && self.effective_until.map_or(true, |until| date <= until)
    }

    /// Same weekday, intersecting effective ranges and overlapping hours.
    pub fn collides_with(&self, other: &AvailabilityWindow) -> bool {
        if self.day_of_week != other.day_of_week {
            return false;
        }

        let effective_overlap = match (self.effective_until, other.effective_from) {
            (Some(until), Some(from)) if until < from => false,
            _ => match (other.effective_until, self.effective_from) {
                (Some(until), Some(from)) if until < from => false,
                _ => true,
            },
        };

        effective_overlap
            && intervals_overlap(self.start_time, self.end_time, other.start_time, other.end_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWindowRequest {
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWindowRequest {
    pub day_of_week: Option<Weekday>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

// ==============================================================================
// RECURRENCE
// ==============================================================================

/// Rule kinds shared by recurrence patterns and recurring exceptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrenceRule {
    Daily {
        interval: u32,
    },
    Weekly {
        interval: u32,
        days_of_week: Vec<Weekday>,
    },
    Biweekly {
        days_of_week: Vec<Weekday>,
    },
    Monthly {
        interval: u32,
        days_of_month: Vec<u32>,
        #[serde(default)]
        months_of_year: Vec<u32>,
    },
    Custom {
        expression: Option<String>,
    },
}

impl RecurrenceRule {
    pub fn kind(&self) -> &'static str {
        match self {
            RecurrenceRule::Daily { .. } => "daily",
            RecurrenceRule::Weekly { .. } => "weekly",
            RecurrenceRule::Biweekly { .. } => "biweekly",
            RecurrenceRule::Monthly { .. } => "monthly",
            RecurrenceRule::Custom { .. } => "custom",
        }
    }
}

/// A rule anchored in time: what the shared expander consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub rule: RecurrenceRule,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub max_occurrences: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub id: Uuid,
    pub window_id: Uuid,
    pub rule: RecurrenceRule,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub max_occurrences: Option<u32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl RecurrencePattern {
    pub fn recurrence(&self) -> Recurrence {
        Recurrence {
            rule: self.rule.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            max_occurrences: self.max_occurrences,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatternRequest {
    pub rule: RecurrenceRule,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub max_occurrences: Option<u32>,
}

// ==============================================================================
// EXCEPTIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionType {
    Break,
    Holiday,
    TimeOff,
    Sick,
    Vacation,
    Personal,
    Other,
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExceptionType::Break => "break",
            ExceptionType::Holiday => "holiday",
            ExceptionType::TimeOff => "time_off",
            ExceptionType::Sick => "sick",
            ExceptionType::Vacation => "vacation",
            ExceptionType::Personal => "personal",
            ExceptionType::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// The simple rule an exception carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecurrence {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,
    pub until: Option<NaiveDate>,
    pub count: Option<u32>,
}

fn default_interval() -> u32 {
    1
}

impl ExceptionRecurrence {
    /// Converts into the shared rule, anchored at the exception's first day.
    pub fn to_recurrence(&self, anchor: NaiveDate) -> Recurrence {
        let rule = match self.frequency {
            Frequency::Daily => RecurrenceRule::Daily {
                interval: self.interval,
            },
            Frequency::Weekly => {
                let days_of_week = if self.days_of_week.is_empty() {
                    vec![anchor.weekday()]
                } else {
                    self.days_of_week.clone()
                };
                RecurrenceRule::Weekly {
                    interval: self.interval,
                    days_of_week,
                }
            }
            Frequency::Monthly => RecurrenceRule::Monthly {
                interval: self.interval,
                days_of_month: vec![anchor.day()],
                months_of_year: Vec::new(),
            },
        };

        Recurrence {
            rule,
            start_date: anchor,
            end_date: self.until,
            max_occurrences: self.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleException {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub exception_type: ExceptionType,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_recurring: bool,
    pub recurrence: Option<ExceptionRecurrence>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExceptionRequest {
    pub exception_type: ExceptionType,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence: Option<ExceptionRecurrence>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateExceptionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_recurring: Option<bool>,
    pub recurrence: Option<ExceptionRecurrence>,
    pub is_active: Option<bool>,
}

/// One concrete blocked interval produced by an exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInterval {
    pub exception_id: Uuid,
    pub exception_type: ExceptionType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    #[default]
    Available,
    Booked,
    Blocked,
    Break,
    Holiday,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotStatus::Available => "AVAILABLE",
            SlotStatus::Booked => "BOOKED",
            SlotStatus::Blocked => "BLOCKED",
            SlotStatus::Break => "BREAK",
            SlotStatus::Holiday => "HOLIDAY",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub window_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub booking_ref: Option<String>,
    pub metadata: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeSlot {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        intervals_overlap(self.start_time, self.end_time, start, end)
    }

    pub fn is_available(&self) -> bool {
        self.is_active && self.status == SlotStatus::Available
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub created: Vec<TimeSlot>,
    /// Candidates that already existed as identical active slots.
    pub reused: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedConflict {
    pub slot_id: Uuid,
    pub slot_status: SlotStatus,
    pub exception_id: Uuid,
    pub exception_type: ExceptionType,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub resolved_count: usize,
    pub unresolved: Vec<UnresolvedConflict>,
}

// ==============================================================================
// CONFIGURATION
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day_of_week: Weekday,
    /// `None` means closed.
    pub working_hours: Option<TimeSpan>,
    #[serde(default)]
    pub breaks: Vec<TimeSpan>,
}

impl DaySchedule {
    pub fn closed(day_of_week: Weekday) -> Self {
        Self {
            day_of_week,
            working_hours: None,
            breaks: Vec::new(),
        }
    }

    /// Working hours with the breaks cut out, in order.
    pub fn open_spans(&self) -> Vec<TimeSpan> {
        let Some(hours) = self.working_hours else {
            return Vec::new();
        };

        let mut breaks: Vec<TimeSpan> = self
            .breaks
            .iter()
            .filter(|b| intervals_overlap(b.start, b.end, hours.start, hours.end))
            .copied()
            .collect();
        breaks.sort_by_key(|b| b.start);

        let mut spans = Vec::new();
        let mut cursor = hours.start;
        for b in breaks {
            if b.start > cursor {
                spans.push(TimeSpan {
                    start: cursor,
                    end: b.start.min(hours.end),
                });
            }
            cursor = cursor.max(b.end);
        }
        if cursor < hours.end {
            spans.push(TimeSpan {
                start: cursor,
                end: hours.end,
            });
        }
        spans
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub id: Uuid,
    /// `None` is the global default.
    pub resource_id: Option<Uuid>,
    pub slot_duration_minutes: i64,
    pub buffer_minutes: i64,
    pub max_advance_days: i64,
    pub min_advance_hours: i64,
    pub cancellation_policy_hours: i64,
    pub allow_recurring: bool,
    pub allow_overlapping: bool,
    pub auto_confirm: bool,
    pub weekly_schedule: Vec<DaySchedule>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const MAX_DAY_MINUTES: i64 = 24 * 60;
const MAX_ADVANCE_DAYS: i64 = 3650;
const MAX_NOTICE_HOURS: i64 = MAX_ADVANCE_DAYS * 24;

fn check_bounds(field: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(SchedulingError::bad_input(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl SchedulingConfig {
    /// 30-minute slots, no buffer, 30-day window, 1h notice, 24h cancellation,
    /// Mon-Fri 09:00-17:00 with a 12:00-13:00 break, weekends closed.
    pub fn global_default() -> Self {
        let now = Utc::now();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default();
        let one = NaiveTime::from_hms_opt(13, 0, 0).unwrap_or_default();
        let five = NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default();

        let weekly_schedule = WEEK
            .iter()
            .map(|day| match day {
                Weekday::Sat | Weekday::Sun => DaySchedule::closed(*day),
                _ => DaySchedule {
                    day_of_week: *day,
                    working_hours: Some(TimeSpan { start: nine, end: five }),
                    breaks: vec![TimeSpan { start: noon, end: one }],
                },
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            resource_id: None,
            slot_duration_minutes: 30,
            buffer_minutes: 0,
            max_advance_days: 30,
            min_advance_hours: 1,
            cancellation_policy_hours: 24,
            allow_recurring: true,
            allow_overlapping: false,
            auto_confirm: false,
            weekly_schedule,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn day(&self, weekday: Weekday) -> Option<&DaySchedule> {
        self.weekly_schedule.iter().find(|d| d.day_of_week == weekday)
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(self.slot_duration_minutes)
    }

    pub fn buffer(&self) -> Duration {
        Duration::minutes(self.buffer_minutes)
    }

    /// Whether a slot starting at `slot_start` may still be released under
    /// the cancellation policy at `now`.
    pub fn within_cancellation_window(&self, slot_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        slot_start - now >= Duration::hours(self.cancellation_policy_hours)
    }

    pub fn validate(&self) -> Result<()> {
        check_bounds("Slot duration minutes", self.slot_duration_minutes, 1, MAX_DAY_MINUTES)?;
        check_bounds("Buffer minutes", self.buffer_minutes, 0, MAX_DAY_MINUTES)?;
        check_bounds("Max advance days", self.max_advance_days, 1, MAX_ADVANCE_DAYS)?;
        check_bounds("Min advance hours", self.min_advance_hours, 0, MAX_NOTICE_HOURS)?;
        check_bounds(
            "Cancellation policy hours",
            self.cancellation_policy_hours,
            0,
            MAX_NOTICE_HOURS,
        )?;
        for day in &self.weekly_schedule {
            if let Some(hours) = &day.working_hours {
                hours.validate()?;
            }
            for b in &day.breaks {
                b.validate()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSchedulingConfigRequest {
    pub slot_duration_minutes: Option<i64>,
    pub buffer_minutes: Option<i64>,
    pub max_advance_days: Option<i64>,
    pub min_advance_hours: Option<i64>,
    pub cancellation_policy_hours: Option<i64>,
    pub allow_recurring: Option<bool>,
    pub allow_overlapping: Option<bool>,
    pub auto_confirm: Option<bool>,
    /// Replaces only the weekdays listed.
    pub weekly_schedule: Option<Vec<DaySchedule>>,
}
