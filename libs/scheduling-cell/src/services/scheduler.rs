// libs/scheduling-cell/src/services/scheduler.rs
//
// Entry point for the booking flow: availability checks, booking and release,
// plus slot generation and exception reconciliation for a resource.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::{Result, SchedulingError};
use crate::models::{DateRange, GenerationOutcome, ResolutionReport, SlotStatus, TimeRange, TimeSlot};
use crate::services::availability::AvailabilityService;
use crate::services::config::SchedulingConfigService;
use crate::services::conflict::ConflictResolver;
use crate::services::exceptions::ExceptionService;
use crate::services::generator::SlotGenerator;
use crate::services::lifecycle::SlotLifecycleService;
use crate::services::overlay::ExceptionOverlay;
use crate::store::SchedulingStore;

pub struct SchedulerService {
    store: Arc<dyn SchedulingStore>,
    app_config: AppConfig,
    config_service: SchedulingConfigService,
    availability_service: AvailabilityService,
    exception_service: ExceptionService,
    overlay: ExceptionOverlay,
    generator: SlotGenerator,
    lifecycle: SlotLifecycleService,
    resolver: ConflictResolver,
}

impl SchedulerService {
    /// Wires the services over `store` and makes sure the global default
    /// config exists before anything reads it.
    pub async fn initialize(store: Arc<dyn SchedulingStore>, app_config: AppConfig) -> Result<Self> {
        let config_service = SchedulingConfigService::new(Arc::clone(&store));
        config_service.initialize().await?;

        let overlay = ExceptionOverlay::new(Arc::clone(&store), &app_config);
        let lifecycle = SlotLifecycleService::new(Arc::clone(&store));

        let availability_service =
            AvailabilityService::new(Arc::clone(&store), config_service.clone(), &app_config);
        let exception_service = ExceptionService::new(Arc::clone(&store), &app_config);
        let generator = SlotGenerator::new(
            Arc::clone(&store),
            config_service.clone(),
            overlay.clone(),
            &app_config,
        );
        let resolver = ConflictResolver::new(
            Arc::clone(&store),
            overlay.clone(),
            lifecycle.clone(),
            &app_config,
        );

        info!(
            "Scheduler initialized (max range {} days)",
            app_config.max_range_days
        );

        Ok(Self {
            store,
            app_config,
            config_service,
            availability_service,
            exception_service,
            overlay,
            generator,
            lifecycle,
            resolver,
        })
    }

    pub fn config(&self) -> &SchedulingConfigService {
        &self.config_service
    }

    pub fn availability(&self) -> &AvailabilityService {
        &self.availability_service
    }

    pub fn exceptions(&self) -> &ExceptionService {
        &self.exception_service
    }

    pub fn overlay(&self) -> &ExceptionOverlay {
        &self.overlay
    }

    /// Bookable slots in `range` as of now.
    pub async fn check_availability(&self, resource_id: Uuid, range: TimeRange) -> Result<Vec<TimeSlot>> {
        self.check_availability_at(resource_id, range, Utc::now()).await
    }

    /// AVAILABLE slots whose start lies inside the resource's booking window
    /// `[now + min advance, now + max advance]`.
    #[instrument(skip(self))]
    pub async fn check_availability_at(
        &self,
        resource_id: Uuid,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>> {
        let range = TimeRange::new(range.start, range.end)?;
        range.covering_dates().ensure_valid(self.app_config.max_range_days)?;

        let config = self.config_service.effective_config(resource_id).await?;
        let earliest = now + Duration::hours(config.min_advance_hours);
        let latest = now + Duration::days(config.max_advance_days);

        let slots = self.store.list_slots(resource_id, range, true).await?;
        Ok(slots
            .into_iter()
            .filter(|s| s.status == SlotStatus::Available)
            .filter(|s| s.start_time >= earliest && s.start_time <= latest)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn book_slot(&self, slot_id: Uuid, booking_ref: &str) -> Result<TimeSlot> {
        self.lifecycle.book(slot_id, booking_ref).await
    }

    #[instrument(skip(self))]
    pub async fn release_slot(&self, slot_id: Uuid) -> Result<TimeSlot> {
        self.lifecycle.release(slot_id).await
    }

    #[instrument(skip(self))]
    pub async fn block_slot(&self, slot_id: Uuid, reason: &str) -> Result<TimeSlot> {
        self.lifecycle.block(slot_id, reason).await
    }

    pub async fn mark_break(&self, slot_id: Uuid) -> Result<TimeSlot> {
        self.lifecycle.mark_break(slot_id).await
    }

    pub async fn mark_holiday(&self, slot_id: Uuid) -> Result<TimeSlot> {
        self.lifecycle.mark_holiday(slot_id).await
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<TimeSlot> {
        self.lifecycle.get_slot(slot_id).await
    }

    /// Active slots of the resource in `range`, by start time
    pub async fn list_slots(&self, resource_id: Uuid, range: DateRange) -> Result<Vec<TimeSlot>> {
        range.ensure_valid(self.app_config.max_range_days)?;
        self.store.list_slots(resource_id, range.to_time_range(), true).await
    }

    #[instrument(skip(self))]
    pub async fn generate_slots(&self, resource_id: Uuid, range: DateRange) -> Result<GenerationOutcome> {
        self.generator.generate(resource_id, range).await
    }

    #[instrument(skip(self))]
    pub async fn resolve_conflicts(&self, resource_id: Uuid, range: DateRange) -> Result<ResolutionReport> {
        self.resolver.resolve(resource_id, range).await
    }

    /// Retires the AVAILABLE slots in `range`; returns how many were retired.
    /// Slots in any other state stay active, including ones that changed
    /// state after the listing. Any other failure stops the run.
    #[instrument(skip(self))]
    pub async fn retire_slots(&self, resource_id: Uuid, range: DateRange) -> Result<usize> {
        let slots = self.list_slots(resource_id, range).await?;
        let mut retired = 0;

        for slot in slots.iter().filter(|s| s.status == SlotStatus::Available) {
            match self.lifecycle.retire(slot).await {
                Ok(_) => retired += 1,
                Err(SchedulingError::Conflict(reason)) => {
                    warn!("Slot {} left active: {}", slot.id, reason);
                }
                Err(e) => return Err(e),
            }
        }

        info!("Retired {} slots for resource {}", retired, resource_id);
        Ok(retired)
    }
}
