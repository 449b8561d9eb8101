//! In-process durable queue backing one `QueueName`, standing in for the
//! NATS-distribution + Redis-bookkeeping split this substrate
//! describes — the same "swap the backend later, keep
//! the narrow surface" approach `wireline_core::store` takes for the
//! relational store, and `wireline_cache::LocalCache` takes for Redis.

use crate::types::{Job, JobId, JobPolicy, QueueName};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Default)]
pub struct JobQueue {
    name_str: &'static str,
    pending: Arc<DashMap<JobId, Job>>,
    order: Arc<Mutex<VecDeque<JobId>>>,
    dead_letter: Arc<DashMap<JobId, Job>>,
}

impl JobQueue {
    pub fn new(name: QueueName) -> Self {
        Self {
            name_str: name.as_str(),
            pending: Arc::new(DashMap::new()),
            order: Arc::new(Mutex::new(VecDeque::new())),
            dead_letter: Arc::new(DashMap::new()),
        }
    }

    pub fn enqueue(&self, job: Job) -> JobId {
        let id = job.id;
        metrics::counter!("jobs.enqueued", "queue" => self.name_str).increment(1);
        self.order.lock().push_back(id);
        self.pending.insert(id, job);
        id
    }

    /// Pops the first job in FIFO order whose `available_at <= now`,
    /// leaving later-arriving-but-not-yet-due jobs in place.
    pub fn try_dequeue(&self) -> Option<Job> {
        let now = Utc::now();
        let mut order = self.order.lock();
        let ready_pos = order
        .iter()
        .position(|id| self.pending.get(id).map(|j| j.available_at <= now).unwrap_or(false))?;
        let id = order.remove(ready_pos)?;
        self.pending.remove(&id).map(|(_, job)| job)
    }

    /// Requeues a failed job with exponential backoff, or moves it to the
    /// dead-letter surface once `max_attempts` is exhausted.
    pub fn fail(&self, mut job: Job, error: impl Into<String>, policy: &JobPolicy) {
        job.attempts += 1;
        job.last_error = Some(error.into());

        if job.is_exhausted() {
            warn!(
                queue = self.name_str,
                job_id = %job.id,
                attempts = job.attempts,
                error = ?job.last_error,
                "Job exhausted retries, moving to dead letter"
            );
            metrics::counter!("jobs.dead_lettered", "queue" => self.name_str).increment(1);
            self.dead_letter.insert(job.id, job);
            self.trim_dead_letter(policy.remove_on_fail);
            return;
        }

        let backoff = policy.backoff_for_attempt(job.attempts);
        job.available_at = Utc::now() + backoff;
        info!(
            queue = self.name_str,
            job_id = %job.id,
            attempt = job.attempts,
            backoff_ms = backoff.num_milliseconds(),
            "Job failed, scheduled for retry"
        );
        metrics::counter!("jobs.retried", "queue" => self.name_str).increment(1);
        let id = job.id;
        self.order.lock().push_back(id);
        self.pending.insert(id, job);
    }

    pub fn complete(&self, job: &Job) {
        metrics::counter!("jobs.completed", "queue" => self.name_str).increment(1);
        info!(queue = self.name_str, job_id = %job.id, "Job completed");
    }

    fn trim_dead_letter(&self, keep: usize) {
        if self.dead_letter.len() <= keep {
            return;
        }
        let mut ids: Vec<_> = self
        .dead_letter
        .iter()
        .map(|r| (r.value().created_at, *r.key()))
        .collect();
        ids.sort_by_key(|(created_at, _)| *created_at);
        for (_, id) in ids.into_iter().take(self.dead_letter.len() - keep) {
            self.dead_letter.remove(&id);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn dead_letter_len(&self) -> usize {
        self.dead_letter.len()
    }

    pub fn dead_letters(&self) -> Vec<Job> {
        self.dead_letter.iter().map(|r| r.value().clone()).collect()
    }
}
