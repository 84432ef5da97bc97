use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::{Result, SchedulingError};
use crate::models::{
    intervals_overlap, CreateExceptionRequest, ScheduleException, TimeRange, UpdateExceptionRequest,
};
use crate::services::locks::KeyedLocks;
use crate::services::overlay::expand_exception;
use crate::services::recurrence;
use crate::store::SchedulingStore;

pub struct ExceptionService {
    store: Arc<dyn SchedulingStore>,
    horizon_days: i64,
    // Serializes check-then-insert per resource so two same-type exceptions cannot race in.
    write_locks: KeyedLocks<Uuid>,
}

impl ExceptionService {
    pub fn new(store: Arc<dyn SchedulingStore>, config: &AppConfig) -> Self {
        Self {
            store,
            horizon_days: config.exception_horizon_days,
            write_locks: KeyedLocks::new(),
        }
    }

    /// Create a break, holiday or leave entry for a resource
    pub async fn create_exception(
        &self,
        resource_id: Uuid,
        request: CreateExceptionRequest,
    ) -> Result<ScheduleException> {
        debug!(
            "Creating {} exception for resource {}",
            request.exception_type, resource_id
        );

        let now = Utc::now();
        let exception = ScheduleException {
            id: Uuid::new_v4(),
            resource_id,
            exception_type: request.exception_type,
            title: request.title,
            description: request.description,
            start_time: request.start_time,
            end_time: request.end_time,
            is_recurring: request.is_recurring,
            recurrence: request.recurrence,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        validate_exception(&exception)?;

        let _guard = self.write_locks.lock(resource_id).await;
        self.check_same_type_overlap(&exception).await?;

        let created = self.store.insert_exception(exception).await?;
        info!(
            "Exception {} ({}) created for resource {}",
            created.id, created.exception_type, resource_id
        );
        Ok(created)
    }

    /// Update an exception, merging only the supplied fields
    pub async fn update_exception(
        &self,
        exception_id: Uuid,
        request: UpdateExceptionRequest,
    ) -> Result<ScheduleException> {
        debug!("Updating exception: {}", exception_id);

        let resource_id = self.get_exception(exception_id).await?.resource_id;
        let _guard = self.write_locks.lock(resource_id).await;
        let mut exception = self.get_exception(exception_id).await?;

        if let Some(title) = request.title {
            exception.title = title;
        }
        if let Some(description) = request.description {
            exception.description = Some(description);
        }
        if let Some(start) = request.start_time {
            exception.start_time = start;
        }
        if let Some(end) = request.end_time {
            exception.end_time = end;
        }
        if let Some(is_recurring) = request.is_recurring {
            exception.is_recurring = is_recurring;
        }
        if let Some(recurrence) = request.recurrence {
            exception.recurrence = Some(recurrence);
        }
        if let Some(is_active) = request.is_active {
            exception.is_active = is_active;
        }
        exception.updated_at = Utc::now();

        validate_exception(&exception)?;
        if exception.is_active {
            self.check_same_type_overlap(&exception).await?;
        }

        self.store.update_exception(exception).await
    }

    pub async fn deactivate_exception(&self, exception_id: Uuid) -> Result<ScheduleException> {
        let resource_id = self.get_exception(exception_id).await?.resource_id;
        let _guard = self.write_locks.lock(resource_id).await;
        let mut exception = self.get_exception(exception_id).await?;
        exception.is_active = false;
        exception.updated_at = Utc::now();

        info!("Exception {} deactivated", exception_id);
        self.store.update_exception(exception).await
    }

    pub async fn get_exception(&self, exception_id: Uuid) -> Result<ScheduleException> {
        self.store
            .get_exception(exception_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Schedule exception", exception_id))
    }

    pub async fn list_exceptions(&self, resource_id: Uuid, active_only: bool) -> Result<Vec<ScheduleException>> {
        let exceptions = self.store.list_exceptions(resource_id).await?;
        Ok(exceptions
            .into_iter()
            .filter(|e| !active_only || e.is_active)
            .collect())
    }

    /// Same resource, same type, active: the expanded intervals must not
    /// touch within the horizon starting at the candidate's start.
    async fn check_same_type_overlap(&self, candidate: &ScheduleException) -> Result<()> {
        let horizon_end = (candidate.start_time + Duration::days(self.horizon_days)).max(candidate.end_time);
        let horizon = TimeRange::new(candidate.start_time, horizon_end)?;
        let candidate_intervals = expand_exception(candidate, &horizon);

        let existing = self.store.list_exceptions(candidate.resource_id).await?;
        for other in existing.iter().filter(|e| {
            e.is_active && e.id != candidate.id && e.exception_type == candidate.exception_type
        }) {
            let other_intervals = expand_exception(other, &horizon);
            let clash = candidate_intervals.iter().find_map(|c| {
                other_intervals
                    .iter()
                    .find(|o| intervals_overlap(c.start, c.end, o.start, o.end))
                    .map(|o| (c, o))
            });

            if let Some((mine, theirs)) = clash {
                warn!(
                    "Exception for resource {} overlaps {} exception {}",
                    candidate.resource_id, other.exception_type, other.id
                );
                return Err(SchedulingError::conflict(format!(
                    "{} exception {} - {} overlaps existing {} exception {} ('{}', {} - {})",
                    candidate.exception_type,
                    mine.start,
                    mine.end,
                    other.exception_type,
                    other.id,
                    other.title,
                    theirs.start,
                    theirs.end
                )));
            }
        }

        Ok(())
    }
}

fn validate_exception(exception: &ScheduleException) -> Result<()> {
    if exception.start_time >= exception.end_time {
        return Err(SchedulingError::bad_input(format!(
            "Exception start {} must be before end {}",
            exception.start_time, exception.end_time
        )));
    }

    if exception.title.trim().is_empty() {
        return Err(SchedulingError::bad_input("Exception title is required"));
    }

    if exception.is_recurring {
        let rule = exception.recurrence.as_ref().ok_or_else(|| {
            SchedulingError::bad_input("Recurring exception requires a recurrence rule")
        })?;

        if rule.count == Some(0) {
            return Err(SchedulingError::bad_input("Recurrence count must be at least 1"));
        }
        if let Some(until) = rule.until {
            if until < exception.start_time.date_naive() {
                return Err(SchedulingError::bad_input(format!(
                    "Recurrence ends {} before the exception starts",
                    until
                )));
            }
        }

        let recurrence = rule.to_recurrence(exception.start_time.date_naive());
        recurrence::validate_rule(&recurrence.rule).map_err(SchedulingError::BadInput)?;
    }

    Ok(())
}
