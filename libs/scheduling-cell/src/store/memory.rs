use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::models::{
    AvailabilityWindow, RecurrencePattern, ScheduleException, SchedulingConfig, SlotStatus,
    TimeRange, TimeSlot,
};
use crate::store::SchedulingStore;

#[derive(Default)]
struct SlotTable {
    slots: HashMap<Uuid, TimeSlot>,
    by_resource: HashMap<Uuid, Vec<Uuid>>,
}

impl SlotTable {
    fn for_resource(&self, resource_id: Uuid) -> impl Iterator<Item = &TimeSlot> {
        self.by_resource
            .get(&resource_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.slots.get(id))
    }
}

/// In-process store. Each table sits behind its own lock so reads of
/// windows, patterns and exceptions never wait on slot generation.
#[derive(Default)]
pub struct InMemorySchedulingStore {
    windows: RwLock<HashMap<Uuid, AvailabilityWindow>>,
    patterns: RwLock<HashMap<Uuid, RecurrencePattern>>,
    exceptions: RwLock<HashMap<Uuid, ScheduleException>>,
    slots: RwLock<SlotTable>,
    configs: RwLock<HashMap<Option<Uuid>, SchedulingConfig>>,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchedulingStore for InMemorySchedulingStore {
    async fn insert_window(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow> {
        let mut windows = self.windows.write().await;
        if windows.contains_key(&window.id) {
            return Err(SchedulingError::conflict(format!("Window {} already exists", window.id)));
        }
        windows.insert(window.id, window.clone());
        Ok(window)
    }

    async fn update_window(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow> {
        let mut windows = self.windows.write().await;
        match windows.get_mut(&window.id) {
            Some(stored) => {
                *stored = window.clone();
                Ok(window)
            }
            None => Err(SchedulingError::not_found("Availability window", window.id)),
        }
    }

    async fn get_window(&self, window_id: Uuid) -> Result<Option<AvailabilityWindow>> {
        Ok(self.windows.read().await.get(&window_id).cloned())
    }

    async fn list_windows(&self, resource_id: Uuid) -> Result<Vec<AvailabilityWindow>> {
        let windows = self.windows.read().await;
        let mut result: Vec<AvailabilityWindow> = windows
            .values()
            .filter(|w| w.resource_id == resource_id)
            .cloned()
            .collect();
        result.sort_by_key(|w| (w.day_of_week.num_days_from_monday(), w.start_time));
        Ok(result)
    }

    async fn insert_pattern(&self, pattern: RecurrencePattern) -> Result<RecurrencePattern> {
        let mut patterns = self.patterns.write().await;
        if patterns.contains_key(&pattern.id) {
            return Err(SchedulingError::conflict(format!("Pattern {} already exists", pattern.id)));
        }
        patterns.insert(pattern.id, pattern.clone());
        Ok(pattern)
    }

    async fn update_pattern(&self, pattern: RecurrencePattern) -> Result<RecurrencePattern> {
        let mut patterns = self.patterns.write().await;
        match patterns.get_mut(&pattern.id) {
            Some(stored) => {
                *stored = pattern.clone();
                Ok(pattern)
            }
            None => Err(SchedulingError::not_found("Recurrence pattern", pattern.id)),
        }
    }

    async fn get_pattern(&self, pattern_id: Uuid) -> Result<Option<RecurrencePattern>> {
        Ok(self.patterns.read().await.get(&pattern_id).cloned())
    }

    async fn list_patterns(&self, window_id: Uuid) -> Result<Vec<RecurrencePattern>> {
        let patterns = self.patterns.read().await;
        let mut result: Vec<RecurrencePattern> = patterns
            .values()
            .filter(|p| p.window_id == window_id)
            .cloned()
            .collect();
        result.sort_by_key(|p| (p.start_date, p.created_at));
        Ok(result)
    }

    async fn insert_exception(&self, exception: ScheduleException) -> Result<ScheduleException> {
        let mut exceptions = self.exceptions.write().await;
        if exceptions.contains_key(&exception.id) {
            return Err(SchedulingError::conflict(format!(
                "Exception {} already exists",
                exception.id
            )));
        }
        exceptions.insert(exception.id, exception.clone());
        Ok(exception)
    }

    async fn update_exception(&self, exception: ScheduleException) -> Result<ScheduleException> {
        let mut exceptions = self.exceptions.write().await;
        match exceptions.get_mut(&exception.id) {
            Some(stored) => {
                *stored = exception.clone();
                Ok(exception)
            }
            None => Err(SchedulingError::not_found("Schedule exception", exception.id)),
        }
    }

    async fn get_exception(&self, exception_id: Uuid) -> Result<Option<ScheduleException>> {
        Ok(self.exceptions.read().await.get(&exception_id).cloned())
    }

    async fn list_exceptions(&self, resource_id: Uuid) -> Result<Vec<ScheduleException>> {
        let exceptions = self.exceptions.read().await;
        let mut result: Vec<ScheduleException> = exceptions
            .values()
            .filter(|e| e.resource_id == resource_id)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.start_time);
        Ok(result)
    }

    async fn insert_slots(&self, resource_id: Uuid, slots: Vec<TimeSlot>) -> Result<Vec<TimeSlot>> {
        let mut table = self.slots.write().await;

        // Validate the whole batch before touching the table.
        {
            let existing: Vec<&TimeSlot> = table.for_resource(resource_id).filter(|s| s.is_active).collect();

            for (index, slot) in slots.iter().enumerate() {
                if slot.resource_id != resource_id {
                    return Err(SchedulingError::bad_input(format!(
                        "Slot {} belongs to resource {}, not {}",
                        slot.id, slot.resource_id, resource_id
                    )));
                }
                if slot.start_time >= slot.end_time {
                    return Err(SchedulingError::bad_input(format!(
                        "Slot {} starts at {} but ends at {}",
                        slot.id, slot.start_time, slot.end_time
                    )));
                }
                if table.slots.contains_key(&slot.id) {
                    return Err(SchedulingError::conflict(format!("Slot {} already exists", slot.id)));
                }

                if let Some(clash) = existing.iter().find(|e| e.overlaps(slot.start_time, slot.end_time)) {
                    return Err(SchedulingError::conflict(format!(
                        "Slot {} - {} overlaps existing slot {} ({} - {})",
                        slot.start_time, slot.end_time, clash.id, clash.start_time, clash.end_time
                    )));
                }

                if let Some(clash) = slots[..index]
                    .iter()
                    .filter(|other| other.is_active)
                    .find(|other| other.overlaps(slot.start_time, slot.end_time))
                {
                    return Err(SchedulingError::conflict(format!(
                        "Slot {} - {} overlaps slot {} - {} in the same batch",
                        slot.start_time, slot.end_time, clash.start_time, clash.end_time
                    )));
                }
            }
        }

        let ids = table.by_resource.entry(resource_id).or_default();
        ids.extend(slots.iter().map(|s| s.id));
        for slot in &slots {
            table.slots.insert(slot.id, slot.clone());
        }

        debug!("Stored {} slots for resource {}", slots.len(), resource_id);
        Ok(slots)
    }

    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<TimeSlot>> {
        Ok(self.slots.read().await.slots.get(&slot_id).cloned())
    }

    async fn list_slots(&self, resource_id: Uuid, range: TimeRange, active_only: bool) -> Result<Vec<TimeSlot>> {
        let table = self.slots.read().await;
        let mut result: Vec<TimeSlot> = table
            .for_resource(resource_id)
            .filter(|s| !active_only || s.is_active)
            .filter(|s| range.overlaps(s.start_time, s.end_time))
            .cloned()
            .collect();
        result.sort_by_key(|s| s.start_time);
        Ok(result)
    }

    async fn compare_and_swap_slot(&self, expected: SlotStatus, slot: TimeSlot) -> Result<TimeSlot> {
        let mut table = self.slots.write().await;
        let current = table
            .slots
            .get_mut(&slot.id)
            .ok_or_else(|| SchedulingError::not_found("Slot", slot.id))?;

        if !current.is_active {
            return Err(SchedulingError::conflict(format!("Slot {} is retired", slot.id)));
        }
        if current.status != expected {
            return Err(SchedulingError::conflict(format!(
                "Slot {} is {}, expected {}",
                slot.id, current.status, expected
            )));
        }

        // Only the fields a transition owns; identity and bounds stay as stored.
        current.status = slot.status;
        current.booking_ref = slot.booking_ref;
        current.metadata = slot.metadata;
        current.is_active = slot.is_active;
        current.updated_at = slot.updated_at;
        Ok(current.clone())
    }

    async fn get_config(&self, resource_id: Option<Uuid>) -> Result<Option<SchedulingConfig>> {
        Ok(self
            .configs
            .read()
            .await
            .get(&resource_id)
            .filter(|c| c.is_active)
            .cloned())
    }

    async fn upsert_config(&self, config: SchedulingConfig) -> Result<SchedulingConfig> {
        self.configs
            .write()
            .await
            .insert(config.resource_id, config.clone());
        Ok(config)
    }

    async fn insert_config_if_absent(&self, config: SchedulingConfig) -> Result<SchedulingConfig> {
        let mut configs = self.configs.write().await;
        let stored = configs.entry(config.resource_id).or_insert(config);
        Ok(stored.clone())
    }
}
