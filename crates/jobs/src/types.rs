//! Core job types and retry policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job kind for routing to the appropriate handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Pull ERP order details back into local state.
    ErpOrderDetailSync,
    /// Push/refresh a customer record in the ERP.
    CustomerSync,
    /// Deferred side effect of a webhook/state transition (email, ERP status
    /// push). `effect` routes to the registered handler.
    SideEffect { effect: String },
    /// Generic/custom job.
    Custom { kind: String },
}

impl JobKind {
    pub fn side_effect(effect: impl Into<String>) -> Self {
        Self::SideEffect {
            effect: effect.into(),
        }
    }

    pub fn custom(kind: impl Into<String>) -> Self {
        Self::Custom { kind: kind.into() }
    }

    pub fn type_name(&self) -> &str {
        match self {
            JobKind::ErpOrderDetailSync => "sync.erp_order_detail",
            JobKind::CustomerSync => "sync.customer",
            JobKind::SideEffect { effect } => effect,
            JobKind::Custom { kind } => kind,
        }
    }
}

/// Job execution status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, waiting to be picked up
    Pending,
    /// Currently being executed
    Running,
    /// Completed successfully
    Completed,
    /// Failed, will be retried
    Failed { error: String, attempt: u32 },
    /// Exhausted retries, moved to DLQ
    DeadLettered { error: String, attempts: u32 },
    /// Cancelled by an operator
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::DeadLettered { .. } | JobStatus::Cancelled
        )
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, JobStatus::Failed { .. })
    }
}

/// Delay sequence between retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// Per-attempt schedule; the last step repeats if attempts outnumber steps.
    Stepped(Vec<Duration>),
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (0 = execute never, 1 = no retries).
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// ERP detail sync jobs: 3 attempts at 10s/30s/60s.
    pub fn erp_detail_sync() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Stepped(vec![
                Duration::from_secs(10),
                Duration::from_secs(30),
                Duration::from_secs(60),
            ]),
        }
    }

    /// Customer sync jobs: 3 attempts, 60s apart.
    pub fn customer_sync() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(60)),
        }
    }

    /// Webhook side effects share the ERP detail schedule.
    pub fn side_effect() -> Self {
        Self::erp_detail_sync()
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::ZERO),
        }
    }

    /// Delay to wait after the given (1-indexed) failed attempt.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed(delay) => *delay,
            Backoff::Stepped(steps) => {
                if steps.is_empty() {
                    return Duration::ZERO;
                }
                let index = (attempt.max(1) as usize - 1).min(steps.len() - 1);
                steps[index]
            }
        }
    }

    /// Whether another attempt is allowed after `attempt` attempts ran.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::erp_detail_sync()
    }
}

/// A background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    /// JSON payload (handler-defined shape)
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub retry_policy: RetryPolicy,
    /// Attempts started so far (0 before first execution)
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the job should next run (set by backoff after a failure)
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Errors from previous attempts
    pub history: Vec<JobAttemptRecord>,
}

/// Record of a job execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

impl Job {
    pub fn new(kind: JobKind, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            payload,
            status: JobStatus::Pending,
            retry_policy: RetryPolicy::default(),
            attempt: 0,
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            history: Vec::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Whether the job is ready to execute now.
    pub fn is_ready(&self) -> bool {
        match self.scheduled_at {
            Some(at) => Utc::now() >= at,
            None => true,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.attempt += 1;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: true,
            error: None,
        });
    }

    pub fn mark_failed(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: false,
            error: Some(error.clone()),
        });

        if self.retry_policy.should_retry(self.attempt) {
            let delay = self.retry_policy.delay_after_attempt(self.attempt);
            self.scheduled_at = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
            self.status = JobStatus::Failed {
                error,
                attempt: self.attempt,
            };
        } else {
            self.status = JobStatus::DeadLettered {
                error,
                attempts: self.attempt,
            };
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        self.updated_at = Utc::now();
    }
}

/// Result of a handler run.
#[derive(Debug)]
pub enum JobResult {
    Success,
    /// Failed; retried per the job's policy.
    Failure(String),
    /// Failed; retry after an explicit delay (overrides the policy's backoff).
    RetryAfter(Duration),
}

/// Entry in the dead-letter queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job: Job,
    pub dead_lettered_at: DateTime<Utc>,
    pub reason: String,
}

impl DeadLetterEntry {
    pub fn new(job: Job, reason: String) -> Self {
        Self {
            job,
            dead_lettered_at: Utc::now(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepped_backoff_follows_the_schedule() {
        let policy = RetryPolicy::erp_detail_sync();

        assert_eq!(policy.delay_after_attempt(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_secs(30));
        assert_eq!(policy.delay_after_attempt(3), Duration::from_secs(60));
        // Past the schedule the last step repeats.
        assert_eq!(policy.delay_after_attempt(7), Duration::from_secs(60));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::customer_sync();
        assert_eq!(policy.delay_after_attempt(1), Duration::from_secs(60));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_secs(60));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy::erp_detail_sync();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn job_lifecycle() {
        let mut job = Job::new(
            JobKind::ErpOrderDetailSync,
            serde_json::json!({"order_number": "PED-20240101-0001"}),
        );

        assert!(matches!(job.status, JobStatus::Pending));
        assert_eq!(job.attempt, 0);

        job.mark_running();
        assert!(matches!(job.status, JobStatus::Running));
        assert_eq!(job.attempt, 1);

        let started = Utc::now();
        job.mark_completed(started);
        assert!(matches!(job.status, JobStatus::Completed));
        assert_eq!(job.history.len(), 1);
        assert!(job.history[0].success);
    }

    #[test]
    fn failure_schedules_retry_then_dead_letters() {
        let mut job = Job::new(JobKind::CustomerSync, serde_json::json!({}))
            .with_retry_policy(RetryPolicy {
                max_attempts: 2,
                backoff: Backoff::Fixed(Duration::from_secs(60)),
            });

        job.mark_running();
        job.mark_failed("erp timeout".to_string(), Utc::now());
        assert!(matches!(job.status, JobStatus::Failed { .. }));
        assert!(job.scheduled_at.is_some());
        assert!(!job.is_ready());

        job.mark_running();
        job.mark_failed("erp timeout".to_string(), Utc::now());
        assert!(matches!(job.status, JobStatus::DeadLettered { .. }));
    }

    #[test]
    fn side_effect_kind_routes_by_effect_name() {
        let kind = JobKind::side_effect("email.invoice_issued");
        assert_eq!(kind.type_name(), "email.invoice_issued");
        assert_eq!(JobKind::ErpOrderDetailSync.type_name(), "sync.erp_order_detail");
    }
}
