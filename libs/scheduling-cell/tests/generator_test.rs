mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Weekday};
use uuid::Uuid;

use scheduling_cell::*;
use shared_utils::test_utils::{at, TestConfig};

use common::*;

#[tokio::test]
async fn test_full_day_of_thirty_minute_slots() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    window(&scheduler, vet, Weekday::Mon, (9, 0), (17, 0)).await;

    let outcome = scheduler
        .generate_slots(vet, DateRange::single(monday()))
        .await
        .unwrap();

    assert_eq!(outcome.created.len(), 16);
    assert_eq!(outcome.reused, 0);
    assert!(outcome.created.iter().all(|s| s.status == SlotStatus::Available));
    assert!(outcome.created.iter().all(|s| s.duration_minutes() == 30));
    assert_eq!(outcome.created[0].start_time, at(monday(), 9, 0));
    assert_eq!(outcome.created[15].end_time, at(monday(), 17, 0));
}

#[tokio::test]
async fn test_existing_break_blocks_candidates() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let day = monday();
    window(&scheduler, vet, Weekday::Mon, (9, 0), (17, 0)).await;

    let lunch = scheduler
        .exceptions()
        .create_exception(vet, one_off(ExceptionType::Break, at(day, 12, 0), at(day, 13, 0)))
        .await
        .unwrap();

    let outcome = scheduler.generate_slots(vet, DateRange::single(day)).await.unwrap();
    let blocked: Vec<_> = outcome
        .created
        .iter()
        .filter(|s| s.status == SlotStatus::Blocked)
        .collect();

    assert_eq!(outcome.created.len(), 16);
    assert_eq!(blocked.len(), 2);
    assert_eq!(blocked[0].start_time, at(day, 12, 0));
    assert_eq!(blocked[1].start_time, at(day, 12, 30));
    assert_eq!(blocked[0].metadata["exception_id"], serde_json::json!(lunch.id));
}

#[tokio::test]
async fn test_regeneration_is_idempotent() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    window(&scheduler, vet, Weekday::Mon, (9, 0), (17, 0)).await;
    let range = DateRange::new(monday(), monday() + Duration::days(6)).unwrap();

    scheduler.generate_slots(vet, range).await.unwrap();
    let rerun = scheduler.generate_slots(vet, range).await.unwrap();

    assert!(rerun.created.is_empty());
    assert_eq!(rerun.reused, 16);
    assert_eq!(scheduler.list_slots(vet, range).await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_overlapping_regeneration_changes_nothing() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    window(&scheduler, vet, Weekday::Mon, (9, 0), (12, 0)).await;
    let range = DateRange::single(monday());

    scheduler.generate_slots(vet, range).await.unwrap();
    let before = scheduler.list_slots(vet, range).await.unwrap();

    set_slot_shape(&scheduler, vet, 45, 0).await;
    let result = scheduler.generate_slots(vet, range).await;
    assert_matches!(result, Err(SchedulingError::Conflict(_)));

    let after = scheduler.list_slots(vet, range).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_buffer_spaces_slots_apart() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    window(&scheduler, vet, Weekday::Mon, (9, 0), (12, 0)).await;
    set_slot_shape(&scheduler, vet, 30, 15).await;

    let outcome = scheduler
        .generate_slots(vet, DateRange::single(monday()))
        .await
        .unwrap();

    let starts: Vec<_> = outcome.created.iter().map(|s| s.start_time).collect();
    assert_eq!(
        starts,
        vec![
            at(monday(), 9, 0),
            at(monday(), 9, 45),
            at(monday(), 10, 30),
            at(monday(), 11, 15),
        ]
    );
}

#[tokio::test]
async fn test_range_longer_than_limit_is_rejected() {
    let scheduler = scheduler_with(TestConfig::with_max_range(7)).await;
    let vet = Uuid::new_v4();
    window(&scheduler, vet, Weekday::Mon, (9, 0), (12, 0)).await;

    let range = DateRange::new(monday(), monday() + Duration::days(7)).unwrap();
    let result = scheduler.generate_slots(vet, range).await;
    assert_matches!(result, Err(SchedulingError::BadInput(_)));

    let week = DateRange::new(monday(), monday() + Duration::days(6)).unwrap();
    assert!(scheduler.generate_slots(vet, week).await.is_ok());
}

#[tokio::test]
async fn test_generated_slots_never_overlap() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    scheduler.availability().create_default_windows(vet).await.unwrap();
    set_slot_shape(&scheduler, vet, 25, 5).await;

    let range = DateRange::new(monday(), monday() + Duration::days(20)).unwrap();
    scheduler.generate_slots(vet, range).await.unwrap();

    let slots = scheduler.list_slots(vet, range).await.unwrap();
    assert!(!slots.is_empty());
    assert!(slots.windows(2).all(|pair| pair[0].end_time <= pair[1].start_time));
}

#[tokio::test]
async fn test_window_effective_dates_limit_generation() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let next_monday = monday() + Duration::days(7);

    scheduler
        .availability()
        .create_window(
            vet,
            CreateWindowRequest {
                day_of_week: Weekday::Mon,
                start_time: shared_utils::test_utils::time(9, 0),
                end_time: shared_utils::test_utils::time(10, 0),
                effective_from: Some(next_monday),
                effective_until: None,
            },
        )
        .await
        .unwrap();

    let range = DateRange::new(monday(), monday() + Duration::days(13)).unwrap();
    let outcome = scheduler.generate_slots(vet, range).await.unwrap();

    assert_eq!(outcome.created.len(), 2);
    assert!(outcome.created.iter().all(|s| s.start_time >= at(next_monday, 0, 0)));
}

#[tokio::test]
async fn test_pattern_restricts_window_to_its_dates() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let w = window(&scheduler, vet, Weekday::Mon, (9, 0), (10, 0)).await;

    scheduler
        .availability()
        .create_pattern(
            w.id,
            CreatePatternRequest {
                rule: RecurrenceRule::Biweekly {
                    days_of_week: vec![Weekday::Mon],
                },
                start_date: monday(),
                end_date: None,
                max_occurrences: None,
            },
        )
        .await
        .unwrap();

    let range = DateRange::new(monday(), monday() + Duration::days(27)).unwrap();
    let outcome = scheduler.generate_slots(vet, range).await.unwrap();

    // two 30-minute slots on each of two Mondays
    assert_eq!(outcome.created.len(), 4);
    assert!(outcome
        .created
        .iter()
        .all(|s| s.start_time.date_naive() == monday()
            || s.start_time.date_naive() == monday() + Duration::days(14)));
}
