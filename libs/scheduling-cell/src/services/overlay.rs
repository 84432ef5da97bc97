use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::Result;
use crate::models::{at_time, DateRange, ExceptionInterval, ScheduleException, TimeRange};
use crate::services::recurrence;
use crate::store::SchedulingStore;

/// Turns a resource's active exceptions into concrete blocked intervals.
#[derive(Clone)]
pub struct ExceptionOverlay {
    store: Arc<dyn SchedulingStore>,
    max_range_days: i64,
}

impl ExceptionOverlay {
    pub fn new(store: Arc<dyn SchedulingStore>, config: &AppConfig) -> Self {
        Self {
            store,
            max_range_days: config.max_range_days,
        }
    }

    /// Every interval of an active exception that intersects `range`, by start.
    /// The dates `range` touches are subject to the usual range limit.
    pub async fn active_intervals(&self, resource_id: Uuid, range: &TimeRange) -> Result<Vec<ExceptionInterval>> {
        let range = &TimeRange::new(range.start, range.end)?;
        range.covering_dates().ensure_valid(self.max_range_days)?;

        let exceptions = self.store.list_exceptions(resource_id).await?;

        let mut intervals: Vec<ExceptionInterval> = exceptions
            .iter()
            .filter(|e| e.is_active)
            .flat_map(|e| expand_exception(e, range))
            .collect();
        intervals.sort_by_key(|i| (i.start, i.end));

        debug!(
            "Resource {} has {} exception intervals between {} and {}",
            resource_id,
            intervals.len(),
            range.start,
            range.end
        );
        Ok(intervals)
    }
}

/// Concrete intervals of one exception that intersect `range`.
///
/// A one-off exception yields its own `[start, end)`. A recurring one is
/// expanded through the shared recurrence rules, each occurrence keeping the
/// exception's start time-of-day and total span.
pub fn expand_exception(exception: &ScheduleException, range: &TimeRange) -> Vec<ExceptionInterval> {
    let interval = |start, end| ExceptionInterval {
        exception_id: exception.id,
        exception_type: exception.exception_type,
        start,
        end,
    };

    let recurrence = match (&exception.recurrence, exception.is_recurring) {
        (Some(rule), true) => rule.to_recurrence(exception.start_time.date_naive()),
        _ => {
            return if range.overlaps(exception.start_time, exception.end_time) {
                vec![interval(exception.start_time, exception.end_time)]
            } else {
                Vec::new()
            };
        }
    };

    let span = exception.end_time - exception.start_time;
    let time_of_day = exception.start_time.time();

    // Occurrences that begin before the range can still reach into it.
    let dates = DateRange {
        start: (range.start - span).date_naive(),
        end: range.covering_dates().end,
    };

    recurrence::expand(&recurrence, &dates)
        .into_iter()
        .map(|date| {
            let start = at_time(date, time_of_day);
            (start, start + span)
        })
        .filter(|(start, end)| range.overlaps(*start, *end))
        .map(|(start, end)| interval(start, end))
        .collect()
}
