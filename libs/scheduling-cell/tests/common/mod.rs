#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use uuid::Uuid;

use scheduling_cell::*;
use shared_utils::test_utils::{init_test_tracing, time, TestConfig};

/// 2025-03-03, a Monday.
pub fn monday() -> NaiveDate {
    shared_utils::test_utils::date(2025, 3, 3)
}

pub async fn scheduler() -> SchedulerService {
    scheduler_with(TestConfig::default()).await
}

pub async fn scheduler_with(config: TestConfig) -> SchedulerService {
    init_test_tracing();
    let store: Arc<dyn SchedulingStore> = Arc::new(InMemorySchedulingStore::new());
    SchedulerService::initialize(store, config.to_app_config())
        .await
        .expect("scheduler initializes")
}

pub async fn window(
    scheduler: &SchedulerService,
    resource_id: Uuid,
    day: Weekday,
    start: (u32, u32),
    end: (u32, u32),
) -> AvailabilityWindow {
    scheduler
        .availability()
        .create_window(
            resource_id,
            CreateWindowRequest {
                day_of_week: day,
                start_time: time(start.0, start.1),
                end_time: time(end.0, end.1),
                effective_from: None,
                effective_until: None,
            },
        )
        .await
        .expect("window is created")
}

pub async fn set_slot_shape(scheduler: &SchedulerService, resource_id: Uuid, duration: i64, buffer: i64) {
    scheduler
        .config()
        .update_config(
            Some(resource_id),
            UpdateSchedulingConfigRequest {
                slot_duration_minutes: Some(duration),
                buffer_minutes: Some(buffer),
                ..Default::default()
            },
        )
        .await
        .expect("config update succeeds");
}

pub fn one_off(
    exception_type: ExceptionType,
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
) -> CreateExceptionRequest {
    CreateExceptionRequest {
        exception_type,
        title: format!("{} block", exception_type),
        description: None,
        start_time: start,
        end_time: end,
        is_recurring: false,
        recurrence: None,
    }
}
