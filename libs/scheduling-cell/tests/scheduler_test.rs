mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Weekday};
use uuid::Uuid;

use scheduling_cell::*;
use shared_utils::test_utils::at;

use common::*;

async fn morning_slots(scheduler: &SchedulerService, vet: Uuid) -> Vec<TimeSlot> {
    window(scheduler, vet, Weekday::Mon, (9, 0), (12, 0)).await;
    scheduler
        .generate_slots(vet, DateRange::single(monday()))
        .await
        .unwrap()
        .created
}

#[tokio::test]
async fn test_book_slot_is_visible_on_reread() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let slots = morning_slots(&scheduler, vet).await;

    let booked = scheduler.book_slot(slots[0].id, "appointment-42").await.unwrap();
    assert_eq!(booked.status, SlotStatus::Booked);

    let reread = scheduler.get_slot(slots[0].id).await.unwrap();
    assert_eq!(reread.status, SlotStatus::Booked);
    assert_eq!(reread.booking_ref.as_deref(), Some("appointment-42"));
}

#[tokio::test]
async fn test_booking_an_unavailable_slot_is_a_conflict() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let slots = morning_slots(&scheduler, vet).await;

    scheduler.book_slot(slots[0].id, "first").await.unwrap();
    let double = scheduler.book_slot(slots[0].id, "second").await;
    assert_matches!(double, Err(SchedulingError::Conflict(msg)) if msg.contains("BOOKED"));

    scheduler.block_slot(slots[1].id, "surgery prep").await.unwrap();
    let blocked = scheduler.book_slot(slots[1].id, "third").await;
    assert_matches!(blocked, Err(SchedulingError::Conflict(msg)) if msg.contains("BLOCKED"));

    let untouched = scheduler.get_slot(slots[0].id).await.unwrap();
    assert_eq!(untouched.booking_ref.as_deref(), Some("first"));
}

#[tokio::test]
async fn test_booking_requires_a_reference() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let slots = morning_slots(&scheduler, vet).await;

    let result = scheduler.book_slot(slots[0].id, "").await;
    assert_matches!(result, Err(SchedulingError::BadInput(_)));
}

#[tokio::test]
async fn test_release_returns_slot_to_available() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let slots = morning_slots(&scheduler, vet).await;

    scheduler.book_slot(slots[2].id, "appointment-7").await.unwrap();
    let released = scheduler.release_slot(slots[2].id).await.unwrap();

    assert_eq!(released.status, SlotStatus::Available);
    assert_eq!(released.booking_ref, None);

    let again = scheduler.release_slot(slots[2].id).await;
    assert_matches!(again, Err(SchedulingError::Conflict(_)));
}

#[tokio::test]
async fn test_unknown_slot_is_not_found() {
    let scheduler = scheduler().await;

    assert_matches!(
        scheduler.book_slot(Uuid::new_v4(), "x").await,
        Err(SchedulingError::NotFound { entity: "Slot", .. })
    );
    assert_matches!(
        scheduler.get_slot(Uuid::new_v4()).await,
        Err(SchedulingError::NotFound { .. })
    );
}

#[tokio::test]
async fn test_break_added_after_generation_is_resolved() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let day = monday();
    window(&scheduler, vet, Weekday::Mon, (9, 0), (12, 0)).await;
    set_slot_shape(&scheduler, vet, 60, 0).await;

    let outcome = scheduler.generate_slots(vet, DateRange::single(day)).await.unwrap();
    assert_eq!(outcome.created.len(), 3);
    assert!(outcome.created.iter().all(|s| s.status == SlotStatus::Available));

    let coffee = scheduler
        .exceptions()
        .create_exception(vet, one_off(ExceptionType::Break, at(day, 10, 30), at(day, 10, 45)))
        .await
        .unwrap();

    let report = scheduler.resolve_conflicts(vet, DateRange::single(day)).await.unwrap();
    assert_eq!(report.resolved_count, 1);
    assert!(report.unresolved.is_empty());

    let slots = scheduler.list_slots(vet, DateRange::single(day)).await.unwrap();
    let statuses: Vec<_> = slots.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![SlotStatus::Available, SlotStatus::Break, SlotStatus::Available]
    );
    assert_eq!(slots[1].start_time, at(day, 10, 0));
    assert_eq!(slots[1].metadata["exception_id"], serde_json::json!(coffee.id));

    // a second pass finds nothing new to do
    let rerun = scheduler.resolve_conflicts(vet, DateRange::single(day)).await.unwrap();
    assert_eq!(rerun.resolved_count, 0);
}

#[tokio::test]
async fn test_holiday_over_booked_slot_is_reported() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let day = monday();
    let slots = morning_slots(&scheduler, vet).await;

    scheduler.book_slot(slots[0].id, "appointment-99").await.unwrap();
    scheduler
        .exceptions()
        .create_exception(vet, one_off(ExceptionType::Holiday, at(day, 0, 0), at(day + Duration::days(1), 0, 0)))
        .await
        .unwrap();

    let report = scheduler.resolve_conflicts(vet, DateRange::single(day)).await.unwrap();

    assert_eq!(report.resolved_count, slots.len() - 1);
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].slot_id, slots[0].id);
    assert_eq!(report.unresolved[0].exception_type, ExceptionType::Holiday);

    let kept = scheduler.get_slot(slots[0].id).await.unwrap();
    assert_eq!(kept.status, SlotStatus::Booked);
    let closed = scheduler.get_slot(slots[1].id).await.unwrap();
    assert_eq!(closed.status, SlotStatus::Holiday);
}

#[tokio::test]
async fn test_check_availability_respects_advance_window() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let day = monday();
    let slots = morning_slots(&scheduler, vet).await;
    scheduler.book_slot(slots[3].id, "appointment-1").await.unwrap();

    let range = DateRange::single(day).to_time_range();

    // one hour of notice pushes out the 09:00 slot
    let open = scheduler
        .check_availability_at(vet, range, at(day, 8, 30))
        .await
        .unwrap();
    let starts: Vec<_> = open.iter().map(|s| s.start_time).collect();
    assert_eq!(
        starts,
        vec![at(day, 9, 30), at(day, 10, 0), at(day, 11, 0), at(day, 11, 30)]
    );

    // beyond the 30-day booking horizon
    let too_early = scheduler
        .check_availability_at(vet, range, at(day - Duration::days(40), 9, 0))
        .await
        .unwrap();
    assert!(too_early.is_empty());
}

#[tokio::test]
async fn test_check_availability_rejects_inverted_range() {
    let scheduler = scheduler().await;
    let range = TimeRange {
        start: at(monday(), 12, 0),
        end: at(monday(), 9, 0),
    };

    let result = scheduler.check_availability(Uuid::new_v4(), range).await;
    assert_matches!(result, Err(SchedulingError::BadInput(_)));
}

#[tokio::test]
async fn test_retire_slots_keeps_booked_history() {
    let scheduler = scheduler().await;
    let vet = Uuid::new_v4();
    let range = DateRange::single(monday());
    let slots = morning_slots(&scheduler, vet).await;
    scheduler.book_slot(slots[1].id, "appointment-5").await.unwrap();

    let retired = scheduler.retire_slots(vet, range).await.unwrap();
    assert_eq!(retired, slots.len() - 1);

    let remaining = scheduler.list_slots(vet, range).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, slots[1].id);

    let gone = scheduler.get_slot(slots[0].id).await.unwrap();
    assert!(!gone.is_active);
    assert_matches!(
        scheduler.book_slot(slots[0].id, "late").await,
        Err(SchedulingError::Conflict(_))
    );
}

#[tokio::test]
async fn test_concurrent_bookings_have_one_winner() {
    let scheduler = std::sync::Arc::new(scheduler().await);
    let vet = Uuid::new_v4();
    let slots = morning_slots(&scheduler, vet).await;
    let slot_id = slots[0].id;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.book_slot(slot_id, &format!("apt-{}", i)).await })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => assert_matches!(e, SchedulingError::Conflict(_)),
        }
    }
    assert_eq!(wins, 1);
}
