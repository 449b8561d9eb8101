//! Job substrate: the registry of named queues plus the poller loop
//! pollers/consumers build on. Consumers must be idempotent (keyed by a
//! stable identifier on `data`); the substrate's job here is retry +
//! backoff + dead-letter, not deduplication.

use crate::queue::JobQueue;
use crate::types::{Job, JobOutcome, JobPolicy, QueueName};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use wireline_cache::{AdvisoryLock, RedisCache};

pub struct JobSubstrate {
    queues: DashMap<QueueName, Arc<JobQueue>>,
    policy: JobPolicy,
}

impl JobSubstrate {
    pub fn new(policy: JobPolicy) -> Self {
        let queues = DashMap::new();
        for name in QueueName::ALL {
            queues.insert(name, Arc::new(JobQueue::new(name)));
        }
        Self { queues, policy }
    }

    pub fn queue(&self, name: QueueName) -> Arc<JobQueue> {
        self.queues
        .get(&name)
        .map(|r| r.value().clone())
        .expect("all QueueName variants are registered at construction")
    }

    pub fn policy(&self) -> &JobPolicy {
        &self.policy
    }

    /// Enqueues `data` onto `name` with the substrate's default policy.
    pub fn enqueue(&self, name: QueueName, data: serde_json::Value) -> crate::types::JobId {
        let job = Job::new(name, data, &self.policy);
        self.queue(name).enqueue(job)
    }

    /// Pulls and handles at most one ready job from `name`. Returns
    /// `false` if there was nothing ready to dequeue.
    pub async fn run_one<F, Fut>(&self, name: QueueName, handler: F) -> bool
    where
    F: FnOnce(Job) -> Fut,
    Fut: Future<Output = Result<(), String>>,
    {
        let queue = self.queue(name);
        let Some(job) = queue.try_dequeue() else {
            return false;
        };

        match handler(job.clone()).await {
            Ok(()) => queue.complete(&job),
            Err(error) => queue.fail(job, error, &self.policy),
        }
        true
    }

    /// Spawns a periodic poller for `name` under a named advisory lock,
    /// satisfying the single-writer requirement for
    /// horizontally-scaled deployments — the same `SETNX`-backed
    /// exclusivity `wireline_cache::AdvisoryLock` gives the campaign
    /// scheduler and journey sweep.
    pub fn spawn_poller<F, Fut>(
        self: Arc<Self>,
        name: QueueName,
        cache: Arc<RedisCache>,
        interval: Duration,
        concurrency: usize,
        handler: F,
    ) -> tokio::task::JoinHandle<()>
    where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send,
    {
        let handler = Arc::new(handler);
        let concurrency = concurrency.max(1);
        tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    let lock_key = format!("job_poller:{}", name.as_str());
                    let lock = match AdvisoryLock::try_acquire(cache.clone(), lock_key, interval.as_millis() as u64 * 2).await {
                        Ok(Some(lock)) => lock,
                        Ok(None) => continue,
                        Err(e) => {
                            error!(queue = name.as_str(), error = %e, "Failed to acquire poller advisory lock");
                            continue;
                        }
                    };

                    let mut handled_any = true;
                    while handled_any {
                        let mut workers = tokio::task::JoinSet::new();
                        for _ in 0..concurrency {
                            let this = self.clone();
                            let handler = handler.clone();
                            workers.spawn(async move { this.run_one(name, move |job| handler(job)).await });
                        }
                        handled_any = false;
                        while let Some(result) = workers.join_next().await {
                            if result.unwrap_or(false) {
                                handled_any = true;
                            }
                        }
                    }

                    if let Err(e) = lock.release().await {
                        error!(queue = name.as_str(), error = %e, "Failed to release poller advisory lock");
                    }
                }
            })
    }
}

pub fn outcome_to_result(outcome: JobOutcome) -> Result<(), String> {
    match outcome {
        JobOutcome::Completed => Ok(()),
        JobOutcome::Failed(e) => Err(e),
    }
}
