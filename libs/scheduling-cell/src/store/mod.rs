pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AvailabilityWindow, RecurrencePattern, ScheduleException, SchedulingConfig, SlotStatus,
    TimeRange, TimeSlot,
};

pub use memory::InMemorySchedulingStore;

/// Arena-style persistence for the scheduling engine.
///
/// Entities reference each other by id only. Implementations must make
/// `insert_slots` all-or-nothing and `compare_and_swap_slot` a conditional
/// update keyed by slot id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn insert_window(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow>;
    async fn update_window(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow>;
    async fn get_window(&self, window_id: Uuid) -> Result<Option<AvailabilityWindow>>;
    async fn list_windows(&self, resource_id: Uuid) -> Result<Vec<AvailabilityWindow>>;

    async fn insert_pattern(&self, pattern: RecurrencePattern) -> Result<RecurrencePattern>;
    async fn update_pattern(&self, pattern: RecurrencePattern) -> Result<RecurrencePattern>;
    async fn get_pattern(&self, pattern_id: Uuid) -> Result<Option<RecurrencePattern>>;
    async fn list_patterns(&self, window_id: Uuid) -> Result<Vec<RecurrencePattern>>;

    async fn insert_exception(&self, exception: ScheduleException) -> Result<ScheduleException>;
    async fn update_exception(&self, exception: ScheduleException) -> Result<ScheduleException>;
    async fn get_exception(&self, exception_id: Uuid) -> Result<Option<ScheduleException>>;
    async fn list_exceptions(&self, resource_id: Uuid) -> Result<Vec<ScheduleException>>;

    /// Persists every slot or none. Fails with Conflict when a slot overlaps
    /// an active slot of the resource or another slot of the batch.
    async fn insert_slots(&self, resource_id: Uuid, slots: Vec<TimeSlot>) -> Result<Vec<TimeSlot>>;
    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<TimeSlot>>;
    /// Slots of the resource overlapping `range`, ordered by start time.
    async fn list_slots(&self, resource_id: Uuid, range: TimeRange, active_only: bool) -> Result<Vec<TimeSlot>>;
    /// Applies the transition fields of `slot` (status, booking reference,
    /// metadata, active flag, update time) to the stored slot, only if that
    /// slot is still active and in `expected`. Returns the stored result.
    async fn compare_and_swap_slot(&self, expected: SlotStatus, slot: TimeSlot) -> Result<TimeSlot>;

    /// Active config for a resource, or the global one for `None`.
    async fn get_config(&self, resource_id: Option<Uuid>) -> Result<Option<SchedulingConfig>>;
    async fn upsert_config(&self, config: SchedulingConfig) -> Result<SchedulingConfig>;
    /// Stores `config` unless one already exists for its resource key; returns
    /// whichever config is stored afterwards.
    async fn insert_config_if_absent(&self, config: SchedulingConfig) -> Result<SchedulingConfig>;
}
