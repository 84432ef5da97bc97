// libs/scheduling-cell/src/services/availability.rs

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::{Result, SchedulingError};
use crate::models::{
    AvailabilityWindow, CreatePatternRequest, CreateWindowRequest, DateRange, RecurrencePattern,
    UpdateWindowRequest,
};
use crate::services::config::SchedulingConfigService;
use crate::services::locks::KeyedLocks;
use crate::services::recurrence;
use crate::store::SchedulingStore;

pub struct AvailabilityService {
    store: Arc<dyn SchedulingStore>,
    config_service: SchedulingConfigService,
    max_range_days: i64,
    write_locks: KeyedLocks<Uuid>,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        config_service: SchedulingConfigService,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            config_service,
            max_range_days: config.max_range_days,
            write_locks: KeyedLocks::new(),
        }
    }

    /// Create a weekly availability window for a resource
    pub async fn create_window(
        &self,
        resource_id: Uuid,
        request: CreateWindowRequest,
    ) -> Result<AvailabilityWindow> {
        debug!("Creating availability window for resource: {}", resource_id);

        validate_times(request.start_time, request.end_time)?;
        validate_effective_range(request.effective_from, request.effective_until)?;

        let now = Utc::now();
        let window = AvailabilityWindow {
            id: Uuid::new_v4(),
            resource_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            is_active: true,
            effective_from: request.effective_from,
            effective_until: request.effective_until,
            created_at: now,
            updated_at: now,
        };

        let _guard = self.write_locks.lock(resource_id).await;
        self.check_window_conflicts(&window).await?;

        let created = self.store.insert_window(window).await?;
        debug!("Availability window created with ID: {}", created.id);
        Ok(created)
    }

    /// Update a window, merging only the supplied fields
    pub async fn update_window(
        &self,
        window_id: Uuid,
        request: UpdateWindowRequest,
    ) -> Result<AvailabilityWindow> {
        debug!("Updating availability window: {}", window_id);

        let resource_id = self.get_window(window_id).await?.resource_id;
        let _guard = self.write_locks.lock(resource_id).await;
        let mut window = self.get_window(window_id).await?;

        if let Some(day) = request.day_of_week {
            window.day_of_week = day;
        }
        if let Some(start) = request.start_time {
            window.start_time = start;
        }
        if let Some(end) = request.end_time {
            window.end_time = end;
        }
        if let Some(from) = request.effective_from {
            window.effective_from = Some(from);
        }
        if let Some(until) = request.effective_until {
            window.effective_until = Some(until);
        }
        if let Some(active) = request.is_active {
            window.is_active = active;
        }
        window.updated_at = Utc::now();

        validate_times(window.start_time, window.end_time)?;
        validate_effective_range(window.effective_from, window.effective_until)?;
        if window.is_active {
            self.check_window_conflicts(&window).await?;
        }

        self.store.update_window(window).await
    }

    pub async fn deactivate_window(&self, window_id: Uuid) -> Result<AvailabilityWindow> {
        self.update_window(
            window_id,
            UpdateWindowRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn get_window(&self, window_id: Uuid) -> Result<AvailabilityWindow> {
        self.store
            .get_window(window_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Availability window", window_id))
    }

    /// Windows of a resource ordered by weekday, then start time
    pub async fn list_windows(&self, resource_id: Uuid) -> Result<Vec<AvailabilityWindow>> {
        self.store.list_windows(resource_id).await
    }

    /// Seed weekly windows from the effective config's working hours, split
    /// around its breaks.
    pub async fn create_default_windows(&self, resource_id: Uuid) -> Result<Vec<AvailabilityWindow>> {
        let config = self.config_service.effective_config(resource_id).await?;
        let mut created = Vec::new();

        for day in &config.weekly_schedule {
            for span in day.open_spans() {
                let window = self
                    .create_window(
                        resource_id,
                        CreateWindowRequest {
                            day_of_week: day.day_of_week,
                            start_time: span.start,
                            end_time: span.end,
                            effective_from: None,
                            effective_until: None,
                        },
                    )
                    .await?;
                created.push(window);
            }
        }

        info!(
            "Created {} default windows for resource {}",
            created.len(),
            resource_id
        );
        Ok(created)
    }

    /// Attach a recurrence pattern to a window
    pub async fn create_pattern(
        &self,
        window_id: Uuid,
        request: CreatePatternRequest,
    ) -> Result<RecurrencePattern> {
        debug!("Creating {} pattern for window {}", request.rule.kind(), window_id);

        let window = self.get_window(window_id).await?;
        let config = self.config_service.effective_config(window.resource_id).await?;
        if !config.allow_recurring {
            return Err(SchedulingError::bad_input(format!(
                "Recurring patterns are disabled for resource {}",
                window.resource_id
            )));
        }

        if let Some(end) = request.end_date {
            if end < request.start_date {
                return Err(SchedulingError::bad_input(format!(
                    "Pattern end date {} is before start date {}",
                    end, request.start_date
                )));
            }
        }
        if request.max_occurrences == Some(0) {
            return Err(SchedulingError::bad_input("Max occurrences must be at least 1"));
        }
        // Custom rules are an extension point: accepted, but they expand to nothing.
        if let Err(reason) = recurrence::validate_rule(&request.rule) {
            if request.rule.kind() == "custom" {
                warn!("Custom pattern on window {} will not produce dates: {}", window_id, reason);
            } else {
                return Err(SchedulingError::BadInput(reason));
            }
        }

        let pattern = RecurrencePattern {
            id: Uuid::new_v4(),
            window_id,
            rule: request.rule,
            start_date: request.start_date,
            end_date: request.end_date,
            max_occurrences: request.max_occurrences,
            is_active: true,
            created_at: Utc::now(),
        };

        self.store.insert_pattern(pattern).await
    }

    pub async fn deactivate_pattern(&self, pattern_id: Uuid) -> Result<RecurrencePattern> {
        let mut pattern = self.get_pattern(pattern_id).await?;
        pattern.is_active = false;
        self.store.update_pattern(pattern).await
    }

    pub async fn get_pattern(&self, pattern_id: Uuid) -> Result<RecurrencePattern> {
        self.store
            .get_pattern(pattern_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Recurrence pattern", pattern_id))
    }

    pub async fn list_patterns(&self, window_id: Uuid) -> Result<Vec<RecurrencePattern>> {
        self.get_window(window_id).await?;
        self.store.list_patterns(window_id).await
    }

    /// Dates the pattern produces inside `range`
    pub async fn preview_pattern(&self, pattern_id: Uuid, range: DateRange) -> Result<Vec<NaiveDate>> {
        range.ensure_valid(self.max_range_days)?;
        let pattern = self.get_pattern(pattern_id).await?;
        Ok(recurrence::expand(&pattern.recurrence(), &range))
    }

    async fn check_window_conflicts(&self, window: &AvailabilityWindow) -> Result<()> {
        let existing = self.store.list_windows(window.resource_id).await?;

        if let Some(clash) = existing
            .iter()
            .filter(|w| w.is_active && w.id != window.id)
            .find(|w| w.collides_with(window))
        {
            return Err(SchedulingError::conflict(format!(
                "Window {:?} {} - {} overlaps existing window {} ({} - {})",
                window.day_of_week,
                window.start_time,
                window.end_time,
                clash.id,
                clash.start_time,
                clash.end_time
            )));
        }

        Ok(())
    }
}

fn validate_times(start: NaiveTime, end: NaiveTime) -> Result<()> {
    if start >= end {
        return Err(SchedulingError::bad_input("Start time must be before end time"));
    }
    Ok(())
}

fn validate_effective_range(from: Option<NaiveDate>, until: Option<NaiveDate>) -> Result<()> {
    if let (Some(from), Some(until)) = (from, until) {
        if from > until {
            return Err(SchedulingError::bad_input(format!(
                "Effective range starts {} after it ends {}",
                from, until
            )));
        }
    }
    Ok(())
}
