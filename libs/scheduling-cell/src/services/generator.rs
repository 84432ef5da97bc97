// libs/scheduling-cell/src/services/generator.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::{Result, SchedulingError};
use crate::models::{
    at_time, AvailabilityWindow, DateRange, ExceptionInterval, GenerationOutcome, SchedulingConfig,
    SlotStatus, TimeSlot,
};
use crate::services::config::SchedulingConfigService;
use crate::services::overlay::ExceptionOverlay;
use crate::services::recurrence;
use crate::store::SchedulingStore;

pub struct SlotGenerator {
    store: Arc<dyn SchedulingStore>,
    config_service: SchedulingConfigService,
    overlay: ExceptionOverlay,
    max_range_days: i64,
}

impl SlotGenerator {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        config_service: SchedulingConfigService,
        overlay: ExceptionOverlay,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            config_service,
            overlay,
            max_range_days: config.max_range_days,
        }
    }

    /// Generate the resource's slots for every day of `range` and persist
    /// them as one batch. Slots that already exist with the same bounds are
    /// reused; any other overlap aborts the whole batch.
    pub async fn generate(&self, resource_id: Uuid, range: DateRange) -> Result<GenerationOutcome> {
        range.ensure_valid(self.max_range_days)?;
        debug!(
            "Generating slots for resource {} from {} to {}",
            resource_id, range.start, range.end
        );

        let config = self.config_service.effective_config(resource_id).await?;
        let windows = self.applicable_windows(resource_id, &range).await?;
        let exceptions = self
            .overlay
            .active_intervals(resource_id, &range.to_time_range())
            .await?;

        let candidates = build_candidates(resource_id, &range, &windows, &config, &exceptions);

        let existing = self
            .store
            .list_slots(resource_id, range.to_time_range(), true)
            .await?;
        let existing_bounds: HashSet<_> = existing
            .iter()
            .map(|s| (s.start_time, s.end_time))
            .collect();

        let (reused, fresh): (Vec<TimeSlot>, Vec<TimeSlot>) = candidates
            .into_iter()
            .partition(|c| existing_bounds.contains(&(c.start_time, c.end_time)));

        if let Some((candidate, clash)) = fresh.iter().find_map(|c| {
            existing
                .iter()
                .find(|e| e.overlaps(c.start_time, c.end_time))
                .map(|e| (c, e))
        }) {
            return Err(SchedulingError::conflict(format!(
                "Candidate slot {} - {} overlaps existing slot {} ({} - {}); nothing was generated",
                candidate.start_time, candidate.end_time, clash.id, clash.start_time, clash.end_time
            )));
        }

        let created = if fresh.is_empty() {
            Vec::new()
        } else {
            self.store.insert_slots(resource_id, fresh).await?
        };

        info!(
            "Generated {} new slots for resource {} ({} already present)",
            created.len(),
            resource_id,
            reused.len()
        );

        Ok(GenerationOutcome {
            created,
            reused: reused.len(),
        })
    }

    /// Active windows paired with the dates their patterns allow (`None`
    /// when the window has no active pattern and applies every week).
    async fn applicable_windows(
        &self,
        resource_id: Uuid,
        range: &DateRange,
    ) -> Result<Vec<(AvailabilityWindow, Option<HashSet<NaiveDate>>)>> {
        let windows = self.store.list_windows(resource_id).await?;
        let mut result = Vec::new();

        for window in windows.into_iter().filter(|w| w.is_active) {
            let patterns: Vec<_> = self
                .store
                .list_patterns(window.id)
                .await?
                .into_iter()
                .filter(|p| p.is_active)
                .collect();

            let allowed: Option<HashSet<NaiveDate>> = if patterns.is_empty() {
                None
            } else {
                Some(
                    patterns
                        .iter()
                        .flat_map(|p| recurrence::expand(&p.recurrence(), range))
                        .collect(),
                )
            };
            result.push((window, allowed));
        }

        Ok(result)
    }
}

/// Walks every applicable window of every day, marking candidates that touch
/// an exception as BLOCKED.
fn build_candidates(
    resource_id: Uuid,
    range: &DateRange,
    windows: &[(AvailabilityWindow, Option<HashSet<NaiveDate>>)],
    config: &SchedulingConfig,
    exceptions: &[ExceptionInterval],
) -> Vec<TimeSlot> {
    let duration = config.slot_duration();
    let step = duration + config.buffer();
    let now = Utc::now();

    let mut by_weekday: HashMap<chrono::Weekday, Vec<&(AvailabilityWindow, Option<HashSet<NaiveDate>>)>> =
        HashMap::new();
    for entry in windows {
        by_weekday.entry(entry.0.day_of_week).or_default().push(entry);
    }

    let mut candidates = Vec::new();

    for day in range.days() {
        let Some(day_windows) = by_weekday.get(&day.weekday()) else {
            continue;
        };

        for (window, allowed) in day_windows.iter().map(|e| (&e.0, &e.1)) {
            if !window.is_effective_on(day) {
                continue;
            }
            if let Some(dates) = allowed {
                if !dates.contains(&day) {
                    continue;
                }
            }

            let window_end = at_time(day, window.end_time);
            let mut cursor = at_time(day, window.start_time);

            while cursor + duration <= window_end {
                let slot_end = cursor + duration;
                let blocking = exceptions
                    .iter()
                    .find(|e| cursor < e.end && slot_end > e.start);

                let (status, metadata) = match blocking {
                    Some(e) => (SlotStatus::Blocked, json!({ "exception_id": e.exception_id })),
                    None => (SlotStatus::Available, json!({})),
                };

                candidates.push(TimeSlot {
                    id: Uuid::new_v4(),
                    resource_id,
                    window_id: window.id,
                    start_time: cursor,
                    end_time: slot_end,
                    status,
                    booking_ref: None,
                    metadata,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                });

                cursor = cursor + step;
            }
        }
    }

    candidates.sort_by_key(|c| c.start_time);
    candidates
}
