//! Interval scheduler with one cancellable loop per job.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SchedulerError};

type JobOperation = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Run counters for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Completed runs, successful or not.
    pub runs: u64,

    /// Runs that returned an error or panicked.
    pub failures: u64,

    /// Wall-clock end of the most recent completed run.
    pub last_run_at: Option<DateTime<Utc>>,

    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

/// A live loop for one job.
struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// What a run needs, shared by the job's loop and [`TaskScheduler::run_now`].
#[derive(Clone)]
struct JobRunner {
    operation: JobOperation,
    stats: Arc<Mutex<JobStats>>,
    /// Held for the whole run so runs of one job never overlap.
    gate: Arc<tokio::sync::Mutex<()>>,
}

struct JobEntry {
    runner: JobRunner,
    interval: Duration,
    run_immediately: bool,
    running: Option<RunningLoop>,
}

#[derive(Default)]
struct SchedulerState {
    jobs: HashMap<String, JobEntry>,
    running: bool,
}

/// Outcome of a single run, after panics have been caught.
enum RunOutcome {
    Ok,
    Failed(String),
    Panicked(String),
}

/// Named periodic jobs, each on its own fixed interval.
///
/// The scheduler is an ordinary value: construct one, share it by `Arc`, and
/// call [`stop`](Self::stop) before dropping it. Loops left running when the
/// scheduler is dropped keep going until the runtime shuts down.
#[derive(Default)]
pub struct TaskScheduler {
    state: Mutex<SchedulerState>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job, replacing any job with the same name.
    ///
    /// The replaced job's loop is cancelled. If the scheduler is running the
    /// new loop starts right away, otherwise on [`start`](Self::start).
    pub fn add_task<F, Fut>(
        &self,
        name: impl Into<String>,
        operation: F,
        interval: Duration,
        run_immediately: bool,
    ) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(name));
        }

        let operation: JobOperation = Arc::new(move || operation().boxed());
        let mut entry = JobEntry {
            runner: JobRunner {
                operation,
                stats: Arc::new(Mutex::new(JobStats::default())),
                gate: Arc::new(tokio::sync::Mutex::new(())),
            },
            interval,
            run_immediately,
            running: None,
        };

        let mut state = self.state.lock();
        if let Some(previous) = state.jobs.remove(&name) {
            if let Some(running) = previous.running {
                running.cancel.cancel();
            }
            debug!(job = %name, "Replacing scheduled job");
        }

        if state.running {
            entry.running = Some(spawn_loop(&name, &entry));
        }

        info!(job = %name, interval_secs = interval.as_secs_f64(), run_immediately, "Job registered");
        state.jobs.insert(name, entry);
        Ok(())
    }

    /// Cancel and forget a job. Returns whether a job was removed.
    pub fn remove_task(&self, name: &str) -> bool {
        let removed = self.state.lock().jobs.remove(name);
        match removed {
            Some(entry) => {
                if let Some(running) = entry.running {
                    running.cancel.cancel();
                }
                info!(job = %name, "Job removed");
                true
            }
            None => false,
        }
    }

    /// Launch a loop for every registered job. Does nothing if already running.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if state.running {
            return;
        }
        state.running = true;

        for (name, entry) in state.jobs.iter_mut() {
            if entry.running.is_none() {
                entry.running = Some(spawn_loop(name, entry));
            }
        }

        info!(jobs = state.jobs.len(), "Scheduler started");
    }

    /// Cancel every loop and wait for each to finish.
    ///
    /// Jobs stay registered; a later [`start`](Self::start) resumes them.
    pub async fn stop(&self) {
        let loops: Vec<(String, RunningLoop)> = {
            let mut state = self.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
            state
                .jobs
                .iter_mut()
                .filter_map(|(name, entry)| entry.running.take().map(|r| (name.clone(), r)))
                .collect()
        };

        for (_, running) in &loops {
            running.cancel.cancel();
        }

        for (name, running) in loops {
            if let Err(e) = running.handle.await {
                // Runs catch their own panics, so this only fires on abort
                warn!(job = %name, error = %e, "Job loop ended abnormally");
            }
        }

        info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Names of all registered jobs, sorted.
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().jobs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a job's operation once, inline, and report its outcome.
    ///
    /// The run is counted in the job's stats like a scheduled one. It does
    /// not shift the job's interval. If a scheduled run of the same job is in
    /// flight, this waits for it to finish first; a tick that comes due
    /// meanwhile waits for this run in turn.
    pub async fn run_now(&self, name: &str) -> Result<()> {
        let runner = {
            let state = self.state.lock();
            let entry = state
                .jobs
                .get(name)
                .ok_or_else(|| SchedulerError::NotFound(name.to_string()))?;
            entry.runner.clone()
        };

        match execute(name, &runner).await {
            RunOutcome::Ok => Ok(()),
            RunOutcome::Failed(message) => Err(SchedulerError::JobFailed {
                name: name.to_string(),
                message,
            }),
            RunOutcome::Panicked(message) => Err(SchedulerError::JobPanicked {
                name: name.to_string(),
                message,
            }),
        }
    }

    pub fn job_stats(&self, name: &str) -> Option<JobStats> {
        self.state
            .lock()
            .jobs
            .get(name)
            .map(|entry| entry.runner.stats.lock().clone())
    }

    /// Stats for every registered job, sorted by name.
    pub fn all_job_stats(&self) -> Vec<(String, JobStats)> {
        let state = self.state.lock();
        let mut all: Vec<(String, JobStats)> = state
            .jobs
            .iter()
            .map(|(name, entry)| (name.clone(), entry.runner.stats.lock().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

fn spawn_loop(name: &str, entry: &JobEntry) -> RunningLoop {
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(job_loop(
        name.to_string(),
        entry.runner.clone(),
        entry.interval,
        entry.run_immediately,
        cancel.clone(),
    ));
    RunningLoop { cancel, handle }
}

async fn job_loop(
    name: String,
    runner: JobRunner,
    interval: Duration,
    run_immediately: bool,
    cancel: CancellationToken,
) {
    debug!(job = %name, "Job loop started");

    if run_immediately {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(job = %name, "Job loop cancelled");
                return;
            }
            _ = execute(&name, &runner) => {}
        }
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = execute(&name, &runner) => {}
        }
    }

    debug!(job = %name, "Job loop cancelled");
}

/// Run the operation once, catching errors and panics, and record the result.
///
/// Waits for any other run of the same job to finish before starting.
async fn execute(name: &str, runner: &JobRunner) -> RunOutcome {
    let _gate = runner.gate.lock().await;
    let result = AssertUnwindSafe(async { (runner.operation)().await })
        .catch_unwind()
        .await;

    let outcome = match result {
        Ok(Ok(())) => {
            debug!(job = %name, "Job run succeeded");
            RunOutcome::Ok
        }
        Ok(Err(e)) => {
            let message = format!("{:#}", e);
            warn!(job = %name, error = %message, "Job run failed");
            RunOutcome::Failed(message)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(job = %name, panic = %message, "Job run panicked");
            RunOutcome::Panicked(message)
        }
    };

    let mut stats = runner.stats.lock();
    stats.runs += 1;
    stats.last_run_at = Some(Utc::now());
    match &outcome {
        RunOutcome::Ok => {}
        RunOutcome::Failed(message) | RunOutcome::Panicked(message) => {
            stats.failures += 1;
            stats.last_error = Some(message.clone());
        }
    }

    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
