// libs/scheduling-cell/src/services/conflict.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::Result;
use crate::models::{
    DateRange, ExceptionInterval, ExceptionType, ResolutionReport, SlotStatus, UnresolvedConflict,
};
use crate::services::lifecycle::{SlotEvent, SlotLifecycleService};
use crate::services::overlay::ExceptionOverlay;
use crate::store::SchedulingStore;

/// Applies exceptions added after generation to the slots they cover.
pub struct ConflictResolver {
    store: Arc<dyn SchedulingStore>,
    overlay: ExceptionOverlay,
    lifecycle: SlotLifecycleService,
    max_range_days: i64,
}

impl ConflictResolver {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        overlay: ExceptionOverlay,
        lifecycle: SlotLifecycleService,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            overlay,
            lifecycle,
            max_range_days: config.max_range_days,
        }
    }

    /// Best-effort: every slot is handled independently and failures are
    /// collected in the report instead of aborting the run. Booked slots are
    /// never cancelled; they are reported for manual handling.
    pub async fn resolve(&self, resource_id: Uuid, range: DateRange) -> Result<ResolutionReport> {
        range.ensure_valid(self.max_range_days)?;
        let time_range = range.to_time_range();

        let slots = self.store.list_slots(resource_id, time_range, true).await?;
        let intervals = self.overlay.active_intervals(resource_id, &time_range).await?;
        debug!(
            "Resolving {} slots against {} exception intervals for resource {}",
            slots.len(),
            intervals.len(),
            resource_id
        );

        let mut report = ResolutionReport::default();
        if intervals.is_empty() {
            return Ok(report);
        }

        for slot in &slots {
            let Some(winner) = dominant_interval(
                intervals
                    .iter()
                    .filter(|i| slot.overlaps(i.start, i.end)),
            ) else {
                continue;
            };

            match slot.status {
                SlotStatus::Available => {
                    let event = event_for(winner.exception_type);
                    match self
                        .lifecycle
                        .transition_from(slot, event, Some(winner.exception_id))
                        .await
                    {
                        Ok(_) => report.resolved_count += 1,
                        Err(e) => {
                            warn!("Could not apply exception {} to slot {}: {}", winner.exception_id, slot.id, e);
                            report.unresolved.push(UnresolvedConflict {
                                slot_id: slot.id,
                                slot_status: slot.status,
                                exception_id: winner.exception_id,
                                exception_type: winner.exception_type,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                SlotStatus::Booked => {
                    report.unresolved.push(UnresolvedConflict {
                        slot_id: slot.id,
                        slot_status: slot.status,
                        exception_id: winner.exception_id,
                        exception_type: winner.exception_type,
                        reason: format!(
                            "Booked slot ({}) overlaps {} exception",
                            slot.booking_ref.as_deref().unwrap_or("no reference"),
                            winner.exception_type
                        ),
                    });
                }
                SlotStatus::Blocked | SlotStatus::Break | SlotStatus::Holiday => {
                    debug!("Slot {} already {}, leaving it", slot.id, slot.status);
                }
            }
        }

        info!(
            "Conflict resolution for resource {}: {} resolved, {} unresolved",
            resource_id,
            report.resolved_count,
            report.unresolved.len()
        );
        Ok(report)
    }
}

fn event_for(exception_type: ExceptionType) -> SlotEvent {
    match exception_type {
        ExceptionType::Holiday => SlotEvent::MarkHoliday,
        ExceptionType::Break => SlotEvent::MarkBreak,
        other => SlotEvent::Block {
            reason: other.to_string(),
        },
    }
}

fn precedence(exception_type: ExceptionType) -> u8 {
    match exception_type {
        ExceptionType::Holiday => 2,
        ExceptionType::Break => 1,
        _ => 0,
    }
}

/// Highest-precedence interval; the earliest one wins a tie.
fn dominant_interval<'a>(
    intervals: impl Iterator<Item = &'a ExceptionInterval>,
) -> Option<&'a ExceptionInterval> {
    intervals.fold(None, |best: Option<&ExceptionInterval>, candidate| match best {
        Some(current) if precedence(current.exception_type) >= precedence(candidate.exception_type) => {
            Some(current)
        }
        _ => Some(candidate),
    })
}
