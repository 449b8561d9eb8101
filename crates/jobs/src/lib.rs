#![warn(clippy::unwrap_used)]
//! Job substrate: named durable queues, retry/backoff,
//! a dead-letter surface, and scheduler-poller plumbing shared by the
//! campaign scheduler, journey sweep, and outbound/reconciliation
//! workers.

pub mod nats;
pub mod queue;
pub mod substrate;
pub mod types;

pub use nats::NatsDistributor;
pub use queue::JobQueue;
pub use substrate::JobSubstrate;
pub use types::{Job, JobId, JobOutcome, JobPolicy, QueueName};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_policy() -> JobPolicy {
        JobPolicy {
            max_attempts: 2,
            initial_backoff_ms: 0,
            remove_on_complete: 1000,
            remove_on_fail: 5000,
        }
    }

    #[tokio::test]
    async fn completes_on_success() {
        let substrate = JobSubstrate::new(test_policy());
        substrate.enqueue(QueueName::OutboundMessages, json!({"to": "+1"}));

        let handled = substrate
        .run_one(QueueName::OutboundMessages, |_job| async { Ok(()) })
        .await;
        assert!(handled);
        assert_eq!(substrate.queue(QueueName::OutboundMessages).pending_len(), 0);
    }

    #[tokio::test]
    async fn dead_letters_after_exhausting_retries() {
        let substrate = JobSubstrate::new(test_policy());
        substrate.enqueue(QueueName::OutboundMessages, json!({"to": "+1"}));

        for _ in 0..2 {
            substrate
            .run_one(QueueName::OutboundMessages, |_job| async {
                    Err("boom".to_string())
                })
            .await;
        }

        let queue = substrate.queue(QueueName::OutboundMessages);
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.dead_letter_len(), 1);
    }

    #[tokio::test]
    async fn empty_queue_reports_nothing_drained() {
        let substrate = JobSubstrate::new(test_policy());
        let handled = substrate
        .run_one(QueueName::CampaignSends, |_job| async { Ok(()) })
        .await;
        assert!(!handled);
    }
}
