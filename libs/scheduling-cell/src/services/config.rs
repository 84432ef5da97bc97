use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::models::{SchedulingConfig, UpdateSchedulingConfigRequest};
use crate::services::locks::KeyedLocks;
use crate::store::SchedulingStore;

/// Resolves the tunables that apply to a resource.
#[derive(Clone)]
pub struct SchedulingConfigService {
    store: Arc<dyn SchedulingStore>,
    // Keyed by resource (`None` = global); shared by every clone.
    update_locks: Arc<KeyedLocks<Option<Uuid>>>,
}

impl SchedulingConfigService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self {
            store,
            update_locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Creates the global default config if none exists. Safe to call more
    /// than once; the first stored config wins.
    pub async fn initialize(&self) -> Result<SchedulingConfig> {
        let global = self
            .store
            .insert_config_if_absent(SchedulingConfig::global_default())
            .await?;
        info!("Global scheduling config ready: {}", global.id);
        Ok(global)
    }

    pub async fn global_config(&self) -> Result<SchedulingConfig> {
        self.store.get_config(None).await?.ok_or_else(|| {
            SchedulingError::NotInitialized(
                "global scheduling config missing; call initialize() at startup".to_string(),
            )
        })
    }

    /// The resource's own active config, else the global one.
    pub async fn effective_config(&self, resource_id: Uuid) -> Result<SchedulingConfig> {
        if let Some(config) = self.store.get_config(Some(resource_id)).await? {
            debug!("Using resource-specific config for {}", resource_id);
            return Ok(config);
        }
        self.global_config().await
    }

    /// Merges the supplied fields into the config for `resource_id`
    /// (`None` = global). A resource without its own config starts from a
    /// copy of the global one.
    pub async fn update_config(
        &self,
        resource_id: Option<Uuid>,
        request: UpdateSchedulingConfigRequest,
    ) -> Result<SchedulingConfig> {
        debug!("Updating scheduling config for {:?}", resource_id);

        let _guard = self.update_locks.lock(resource_id).await;

        let mut config = match self.store.get_config(resource_id).await? {
            Some(existing) => existing,
            None => match resource_id {
                Some(id) => {
                    let mut copy = self.global_config().await?;
                    copy.id = Uuid::new_v4();
                    copy.resource_id = Some(id);
                    copy.created_at = Utc::now();
                    copy
                }
                None => self.global_config().await?,
            },
        };

        if let Some(v) = request.slot_duration_minutes {
            config.slot_duration_minutes = v;
        }
        if let Some(v) = request.buffer_minutes {
            config.buffer_minutes = v;
        }
        if let Some(v) = request.max_advance_days {
            config.max_advance_days = v;
        }
        if let Some(v) = request.min_advance_hours {
            config.min_advance_hours = v;
        }
        if let Some(v) = request.cancellation_policy_hours {
            config.cancellation_policy_hours = v;
        }
        if let Some(v) = request.allow_recurring {
            config.allow_recurring = v;
        }
        if let Some(v) = request.allow_overlapping {
            config.allow_overlapping = v;
        }
        if let Some(v) = request.auto_confirm {
            config.auto_confirm = v;
        }
        if let Some(days) = request.weekly_schedule {
            for day in days {
                match config
                    .weekly_schedule
                    .iter_mut()
                    .find(|d| d.day_of_week == day.day_of_week)
                {
                    Some(existing) => *existing = day,
                    None => config.weekly_schedule.push(day),
                }
            }
        }

        config.validate()?;
        config.updated_at = Utc::now();

        let saved = self.store.upsert_config(config).await?;
        info!("Scheduling config {} updated", saved.id);
        Ok(saved)
    }
}
