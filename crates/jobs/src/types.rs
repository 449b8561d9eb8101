//! Job contract and named queues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The ten named durable queues. A closed set —
/// unlike free-form NATS subject strings, job dispatch here
/// is always through one of these, so typos surface at compile time
/// instead of silently creating an unconsumed subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    InboundEvents,
    OutboundMessages,
    WhatsappStatus,
    CampaignSends,
    JourneyRuns,
    KnowledgeSync,
    AiInsights,
    CrmWebhooks,
    AnalyticsMetrics,
    AgentReplies,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::InboundEvents => "inbound.events",
            QueueName::OutboundMessages => "outbound.messages",
            QueueName::WhatsappStatus => "whatsapp.status",
            QueueName::CampaignSends => "campaign.sends",
            QueueName::JourneyRuns => "journey.runs",
            QueueName::KnowledgeSync => "knowledge.sync",
            QueueName::AiInsights => "ai.insights",
            QueueName::CrmWebhooks => "crm.webhooks",
            QueueName::AnalyticsMetrics => "analytics.metrics",
            QueueName::AgentReplies => "agent.replies",
        }
    }

    /// The NATS subject this queue publishes/subscribes on for
    /// cross-instance distribution (`jobs.<name>`), mirroring a
    /// `{stream_name}.<kind>` subject convention.
    pub fn subject(&self) -> String {
        format!("jobs.{}", self.as_str())
    }

    pub const ALL: [QueueName; 10] = [
        QueueName::InboundEvents,
        QueueName::OutboundMessages,
        QueueName::WhatsappStatus,
        QueueName::CampaignSends,
        QueueName::JourneyRuns,
        QueueName::KnowledgeSync,
        QueueName::AiInsights,
        QueueName::CrmWebhooks,
        QueueName::AnalyticsMetrics,
        QueueName::AgentReplies,
    ];
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `{id, name, data, attempts, max_attempts, delay, priority?, created_at}`
/// per the job contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: QueueName,
    pub data: serde_json::Value,
    pub attempts: u32,
    pub max_attempts: u32,
    /// Earliest instant this job is eligible to run. Set ahead of `now`
    /// by the retry backoff schedule after a failed attempt.
    pub available_at: DateTime<Utc>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl Job {
    pub fn new(name: QueueName, data: serde_json::Value, policy: &JobPolicy) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            name,
            data,
            attempts: 0,
            max_attempts: policy.max_attempts,
            available_at: now,
            priority: 0,
            created_at: now,
            last_error: None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Default retry policy: `attempts=3`, exponential backoff
/// starting at 1s, retention counts for completed/failed jobs.
#[derive(Debug, Clone)]
pub struct JobPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub remove_on_complete: usize,
    pub remove_on_fail: usize,
}

impl JobPolicy {
    /// Exponential backoff for the attempt number about to be made
    /// (1-indexed): `initial_backoff_ms * 2^(attempt-1)`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> chrono::Duration {
        let millis = self.initial_backoff_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(20));
        chrono::Duration::milliseconds(millis as i64)
    }
}

impl From<&wireline_core::config::JobsConfig> for JobPolicy {
    fn from(cfg: &wireline_core::config::JobsConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            initial_backoff_ms: cfg.initial_backoff_ms,
            remove_on_complete: cfg.remove_on_complete,
            remove_on_fail: cfg.remove_on_fail,
        }
    }
}

/// Outcome of a single dequeue-and-handle cycle, used by pollers to decide
/// whether to requeue, dead-letter, or drop a job.
#[derive(Debug)]
pub enum JobOutcome {
    Completed,
    Failed(String),
}
