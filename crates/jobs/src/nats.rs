//! Cross-instance distribution side-channel: publishes a job's id onto
//! `jobs.<name>` so other instances' `queue_subscribe`-style consumers
//! can wake up, the same shape as a worker subscribing to a
//! per-queue subject with a queue group. Durability
//! and retry bookkeeping stay in `JobQueue`/Redis (`wireline_cache`); NATS
//! here is purely a wakeup signal, never the source of truth.
use crate::types::{JobId, QueueName};
use tracing::warn;

pub struct NatsDistributor {
    client: async_nats::Client,
}

impl NatsDistributor {
    pub async fn connect(urls: &[String]) -> anyhow::Result<Self> {
        let url = urls.first().cloned().unwrap_or_else(|| "nats://localhost:4222".to_string());
        let client = async_nats::connect(&url).await?;
        Ok(Self { client })
    }

    pub async fn notify(&self, name: QueueName, job_id: JobId) {
        if let Err(e) = self.client.publish(name.subject(), job_id.to_string().into()).await {
            warn!(queue = name.as_str(), job_id = %job_id, error = %e, "Failed to publish job wakeup to NATS");
        }
    }
}
