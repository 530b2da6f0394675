//! Named periodic jobs.
//!
//! A [`TaskScheduler`] runs each registered job in its own tokio task on a
//! fixed interval. Jobs are isolated: an error or panic in one run is logged
//! and counted, and neither the job's own loop nor any other loop stops.
//!
//! ```rust,ignore
//! let scheduler = TaskScheduler::new();
//! scheduler.add_task("cache_sweep", move || sweep(cache.clone()), Duration::from_secs(60), false)?;
//! scheduler.start();
//! // ...
//! scheduler.stop().await;
//! ```

mod error;
mod scheduler;

pub use error::{Result, SchedulerError};
pub use scheduler::{JobStats, TaskScheduler};
