//! Job executor with retry and backoff logic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::store::{JobStore, JobStoreError};
use crate::types::{Job, JobResult, JobStatus};

/// Job handler function type.
pub type JobHandler = Box<dyn Fn(&Job) -> JobResult + Send + Sync>;

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// How often to poll for new jobs
    pub poll_interval: Duration,
    /// Name for logging
    pub name: String,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "job-executor".to_string(),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Handle to control a running executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutorHandle {
    /// Request graceful shutdown.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    /// Get current executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_dead_lettered: u64,
}

/// Background job executor.
///
/// Polls a job store for pending jobs, executes them with registered handlers,
/// and handles retries and dead-lettering.
pub struct JobExecutor<S: JobStore> {
    store: S,
    handlers: HashMap<String, JobHandler>,
}

impl<S: JobStore + 'static> JobExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a job kind (`JobKind::type_name`). `"*"`
    /// registers a catch-all.
    pub fn register_handler<F>(&mut self, kind: impl Into<String>, handler: F)
    where
        F: Fn(&Job) -> JobResult + Send + Sync + 'static,
    {
        self.handlers.insert(kind.into(), Box::new(handler));
    }

    fn get_handler(&self, job: &Job) -> Option<&JobHandler> {
        let type_name = job.kind.type_name();
        if let Some(h) = self.handlers.get(type_name) {
            return Some(h);
        }

        // Category match: "email.*" matches "email.invoice_issued".
        for (pattern, handler) in &self.handlers {
            if let Some(prefix) = pattern.strip_suffix(".*") {
                if type_name.starts_with(prefix) {
                    return Some(handler);
                }
            }
        }

        self.handlers.get("*")
    }

    /// Spawn the executor in a background thread.
    pub fn spawn(self, config: JobExecutorConfig) -> JobExecutorHandle
    where
        S: Send,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));
        let stats_clone = stats.clone();

        let name = config.name.clone();
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || {
                executor_loop(self, config, shutdown_rx, stats_clone);
            })
            .expect("failed to spawn job executor thread");

        JobExecutorHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }

    /// Execute a single already-claimed job (synchronous/test use).
    pub fn execute_one(&self, job: &mut Job) -> Result<(), String> {
        let handler = self
            .get_handler(job)
            .ok_or_else(|| format!("no handler for job kind: {:?}", job.kind))?;

        let started = Utc::now();

        match handler(job) {
            JobResult::Success => {
                job.mark_completed(started);
                self.store.update(job).map_err(stringify)?;
                Ok(())
            }
            JobResult::Failure(error) => {
                job.mark_failed(error.clone(), started);
                self.store.update(job).map_err(stringify)?;

                if matches!(job.status, JobStatus::DeadLettered { .. }) {
                    self.store
                        .dead_letter(job.clone(), error.clone())
                        .map_err(stringify)?;
                }

                Err(error)
            }
            JobResult::RetryAfter(delay) => {
                let error = "retry after delay".to_string();
                job.mark_failed(error.clone(), started);

                if matches!(job.status, JobStatus::DeadLettered { .. }) {
                    // Attempts are exhausted: the explicit delay no longer
                    // applies, the job goes to the DLQ like any other failure.
                    self.store.update(job).map_err(stringify)?;
                    self.store
                        .dead_letter(job.clone(), error.clone())
                        .map_err(stringify)?;
                } else {
                    job.scheduled_at =
                        Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default());
                    self.store.update(job).map_err(stringify)?;
                }

                Err(error)
            }
        }
    }

    /// Claim and execute ready jobs until the queue is drained (test use).
    pub fn drain(&self) -> usize {
        let mut processed = 0;
        while let Ok(Some(mut job)) = self.store.claim_next() {
            let _ = self.execute_one(&mut job);
            processed += 1;
        }
        processed
    }
}

fn stringify(err: JobStoreError) -> String {
    err.to_string()
}

fn executor_loop<S: JobStore + 'static>(
    executor: JobExecutor<S>,
    config: JobExecutorConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<ExecutorStats>>,
) {
    info!(executor = %config.name, "job executor started");

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match executor.store.claim_next() {
            Ok(Some(mut job)) => {
                debug!(
                    executor = %config.name,
                    job_id = %job.id,
                    kind = ?job.kind,
                    "claimed job"
                );

                let result = executor.execute_one(&mut job);

                {
                    let mut s = stats.lock().unwrap();
                    s.jobs_processed += 1;
                    match &result {
                        Ok(()) => s.jobs_succeeded += 1,
                        Err(_) => {
                            s.jobs_failed += 1;
                            if matches!(job.status, JobStatus::DeadLettered { .. }) {
                                s.jobs_dead_lettered += 1;
                            }
                        }
                    }
                }

                if let Err(e) = result {
                    if matches!(job.status, JobStatus::DeadLettered { .. }) {
                        warn!(job_id = %job.id, error = %e, "job dead-lettered");
                    } else {
                        debug!(job_id = %job.id, error = %e, "job execution failed");
                    }
                }
            }
            Ok(None) => {
                thread::sleep(config.poll_interval);
            }
            Err(e) => {
                error!(executor = %config.name, error = ?e, "failed to claim job");
                thread::sleep(config.poll_interval);
            }
        }
    }

    info!(executor = %config.name, "job executor stopped");
}
