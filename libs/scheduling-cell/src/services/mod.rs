pub mod availability;
pub mod config;
pub mod conflict;
pub mod exceptions;
pub mod generator;
pub mod lifecycle;
mod locks;
pub mod overlay;
pub mod recurrence;
pub mod scheduler;

pub use availability::AvailabilityService;
pub use config::SchedulingConfigService;
pub use conflict::ConflictResolver;
pub use exceptions::ExceptionService;
pub use generator::SlotGenerator;
pub use lifecycle::{SlotEvent, SlotLifecycle, SlotLifecycleService};
pub use overlay::{expand_exception, ExceptionOverlay};
pub use scheduler::SchedulerService;
