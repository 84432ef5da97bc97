// libs/scheduling-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::models::{SlotStatus, TimeSlot};
use crate::store::SchedulingStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEvent {
    Book { booking_ref: String },
    Block { reason: String },
    MarkBreak,
    MarkHoliday,
    Release,
}

impl SlotEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SlotEvent::Book { .. } => "book",
            SlotEvent::Block { .. } => "block",
            SlotEvent::MarkBreak => "mark_break",
            SlotEvent::MarkHoliday => "mark_holiday",
            SlotEvent::Release => "release",
        }
    }
}

impl SlotStatus {
    /// The transition table. `None` means the event is illegal in this state.
    pub fn next(self, event: &SlotEvent) -> Option<SlotStatus> {
        use SlotStatus::*;
        match (self, event) {
            (Available, SlotEvent::Book { .. }) => Some(Booked),
            (Available, SlotEvent::Block { .. }) => Some(Blocked),
            (Available, SlotEvent::MarkBreak) => Some(Break),
            (Available, SlotEvent::MarkHoliday) => Some(Holiday),
            (Available, SlotEvent::Release) => None,
            (Booked | Blocked | Break | Holiday, SlotEvent::Release) => Some(Available),
            (
                Booked | Blocked | Break | Holiday,
                SlotEvent::Book { .. } | SlotEvent::Block { .. } | SlotEvent::MarkBreak | SlotEvent::MarkHoliday,
            ) => None,
        }
    }
}

/// Pure state machine over a single slot.
pub struct SlotLifecycle;

impl SlotLifecycle {
    /// Returns the slot as it looks after `event`, or Conflict naming the
    /// current state when the event is illegal.
    pub fn apply(slot: &TimeSlot, event: &SlotEvent, at: DateTime<Utc>) -> Result<TimeSlot> {
        if !slot.is_active {
            return Err(SchedulingError::conflict(format!(
                "Slot {} is retired and cannot {}",
                slot.id,
                event.name()
            )));
        }

        if let SlotEvent::Book { booking_ref } = event {
            if booking_ref.trim().is_empty() {
                return Err(SchedulingError::bad_input("Booking reference is required"));
            }
        }

        let next = slot.status.next(event).ok_or_else(|| {
            SchedulingError::conflict(format!(
                "Cannot {} slot {}: slot is {}",
                event.name(),
                slot.id,
                slot.status
            ))
        })?;

        let mut updated = slot.clone();
        updated.status = next;
        updated.updated_at = at;

        let mut metadata = match slot.metadata.as_object() {
            Some(map) => map.clone(),
            None => serde_json::Map::new(),
        };

        match event {
            SlotEvent::Book { booking_ref } => {
                updated.booking_ref = Some(booking_ref.clone());
            }
            SlotEvent::Block { reason } => {
                metadata.insert("block_reason".to_string(), json!(reason));
            }
            SlotEvent::MarkBreak | SlotEvent::MarkHoliday => {}
            SlotEvent::Release => {
                updated.booking_ref = None;
                metadata.remove("block_reason");
                metadata.remove("exception_id");
            }
        }
        updated.metadata = Value::Object(metadata);

        Ok(updated)
    }

    /// Events accepted from `status`
    pub fn valid_events(status: SlotStatus) -> Vec<&'static str> {
        let probes = [
            SlotEvent::Book {
                booking_ref: String::new(),
            },
            SlotEvent::Block {
                reason: String::new(),
            },
            SlotEvent::MarkBreak,
            SlotEvent::MarkHoliday,
            SlotEvent::Release,
        ];
        probes
            .iter()
            .filter(|e| status.next(e).is_some())
            .map(SlotEvent::name)
            .collect()
    }
}

/// Applies lifecycle events to stored slots with a check-and-set on status.
#[derive(Clone)]
pub struct SlotLifecycleService {
    store: Arc<dyn SchedulingStore>,
}

impl SlotLifecycleService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<TimeSlot> {
        self.store
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Slot", slot_id))
    }

    pub async fn book(&self, slot_id: Uuid, booking_ref: &str) -> Result<TimeSlot> {
        self.transition(
            slot_id,
            SlotEvent::Book {
                booking_ref: booking_ref.to_string(),
            },
        )
        .await
    }

    pub async fn block(&self, slot_id: Uuid, reason: &str) -> Result<TimeSlot> {
        self.transition(
            slot_id,
            SlotEvent::Block {
                reason: reason.to_string(),
            },
        )
        .await
    }

    pub async fn mark_break(&self, slot_id: Uuid) -> Result<TimeSlot> {
        self.transition(slot_id, SlotEvent::MarkBreak).await
    }

    pub async fn mark_holiday(&self, slot_id: Uuid) -> Result<TimeSlot> {
        self.transition(slot_id, SlotEvent::MarkHoliday).await
    }

    pub async fn release(&self, slot_id: Uuid) -> Result<TimeSlot> {
        self.transition(slot_id, SlotEvent::Release).await
    }

    pub async fn transition(&self, slot_id: Uuid, event: SlotEvent) -> Result<TimeSlot> {
        let current = self.get_slot(slot_id).await?;
        self.transition_from(&current, event, None).await
    }

    /// Applies `event` to `current` and stores the result only if the stored
    /// slot is still in `current.status`. `triggered_by` records the
    /// exception behind an automatic transition.
    pub async fn transition_from(
        &self,
        current: &TimeSlot,
        event: SlotEvent,
        triggered_by: Option<Uuid>,
    ) -> Result<TimeSlot> {
        debug!("Slot {}: {} from {}", current.id, event.name(), current.status);

        let mut updated = SlotLifecycle::apply(current, &event, Utc::now()).map_err(|e| {
            warn!("Rejected slot transition: {}", e);
            e
        })?;

        if let (Some(exception_id), Some(map)) = (triggered_by, updated.metadata.as_object_mut()) {
            map.insert("exception_id".to_string(), json!(exception_id));
        }

        let stored = self.store.compare_and_swap_slot(current.status, updated).await?;
        info!("Slot {} transitioned {} -> {}", stored.id, current.status, stored.status);
        Ok(stored)
    }

    /// Marks an AVAILABLE slot inactive. Anything else is kept for history.
    pub async fn retire(&self, current: &TimeSlot) -> Result<TimeSlot> {
        if current.status != SlotStatus::Available {
            return Err(SchedulingError::conflict(format!(
                "Cannot retire slot {}: slot is {}",
                current.id, current.status
            )));
        }

        let mut retired = current.clone();
        retired.is_active = false;
        retired.updated_at = Utc::now();
        self.store.compare_and_swap_slot(SlotStatus::Available, retired).await
    }
}
