//! Service layer wiring

pub mod activity;
pub mod availability;
pub mod borrows;
pub mod equipment;
pub mod stats;

use crate::config::AppConfig;
use crate::lifecycle::LifecyclePolicy;
use crate::repository::Repository;

pub use activity::ActivityService;
pub use availability::AvailabilityService;
pub use borrows::BorrowsService;
pub use equipment::EquipmentService;
pub use stats::StatsService;

/// Container for all application services
#[derive(Clone)]
pub struct Services {
    pub equipment: EquipmentService,
    pub borrows: BorrowsService,
    pub availability: AvailabilityService,
    pub activity: ActivityService,
    pub stats: StatsService,
}

impl Services {
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let policy = LifecyclePolicy::from_config(&config.lifecycle);
        Self {
            equipment: EquipmentService::new(repository.clone()),
            borrows: BorrowsService::new(repository.clone(), policy),
            availability: AvailabilityService::new(repository.clone()),
            activity: ActivityService::new(repository.clone()),
            stats: StatsService::new(repository),
        }
    }
}
