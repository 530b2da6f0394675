//! Refresh orchestration for remote device data.
//!
//! Each [`RefreshSource`] pulls one remote API through a resilient session
//! and writes what it gets into the shared [`DashboardCache`]. The
//! [`RefreshOrchestrator`] runs sources one at a time or all together,
//! registers periodic jobs with a [`TaskScheduler`](petdash_scheduler::TaskScheduler),
//! and reports cache status.
//!
//! Cache keys:
//!
//! | Key | Written by |
//! |---|---|
//! | `<source>_devices` | [`DeviceHubSource`] |
//! | `<source>_stats_<id>` | [`DeviceHubSource`] |
//! | `<source>_servings` | [`FeederSource`] |
//! | `<source>_plans` | [`FeederSource`] |
//! | `dashboard_combined_data` | [`RefreshOrchestrator::refresh_combined`] |
//! | `dashboard_last_refresh` | [`RefreshOrchestrator::refresh_combined`] |

pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod source;
pub mod sources;

pub use config::RefreshConfig;
pub use error::{RefreshError, Result};
pub use model::{Device, DeviceKind, LitterBoxModel, Snapshot, parse_devices};
pub use orchestrator::{CacheStatus, RefreshOrchestrator};
pub use report::{RefreshReport, SourceOutcome};
pub use source::{
    COMBINED_KEY, DashboardCache, LAST_REFRESH_KEY, RefreshSource, devices_key, plans_key,
    servings_key, stats_key,
};
pub use sources::{DeviceHubConfig, DeviceHubSource, FeederConfig, FeederSource};
