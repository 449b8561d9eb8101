//! Shared durable entities — the parts of the data model every component
//! touches (Channel, Contact, Conversation, Message, Lead). Domain-specific
//! entities (Campaign, Journey, Attribution, ...) live in their owning
//! crate, the same split a layered workspace uses between shared
//! entity types and per-subsystem types.

use crate::ids::{ChannelId, ContactId, ConversationId, LeadId, MessageId, OrgId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A configured inbound/outbound channel bound to one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub org_id: OrgId,
    pub provider: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub org_id: OrgId,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    /// The identity a provider adapter's `sender_external_id` resolves
    /// against, scoped per channel identity space (phone for SMS/WhatsApp,
    /// email for email channels).
    pub fn matches_external_id(&self, external_id: &str) -> bool {
        self.phone.as_deref() == Some(external_id) || self.email.as_deref() == Some(external_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub org_id: OrgId,
    pub contact_id: ContactId,
    pub channel_id: ChannelId,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    In,
    Out,
}

/// Message delivery status. Monotone in the partial order
/// `pending <= sent <= delivered <= read`; `failed` is terminal and
/// mutually exclusive with `delivered`/`read` (invariant I1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Rank in the monotone chain `pending < sent < delivered < read`.
    /// `failed` has no rank in the chain — it is compared structurally.
    fn rank(self) -> Option<u8> {
        match self {
            MessageStatus::Pending => Some(0),
            MessageStatus::Sent => Some(1),
            MessageStatus::Delivered => Some(2),
            MessageStatus::Read => Some(3),
            MessageStatus::Failed => None,
        }
    }

    /// Whether transitioning `self -> next` is a legal status update
    /// (invariant I1: no message transitions out of `failed`, and the
    /// chain never runs backward).
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        if self == MessageStatus::Failed {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(a), Some(b)) => b >= a,
            (Some(_), None) => next == MessageStatus::Failed,
            _ => false,
        }
    }
}

/// Where a message is linked from, so outbound sends can propagate their
/// terminal status back to the thing that requested them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MessageLinkage {
    CampaignSend { campaign_send_id: crate::ids::CampaignSendId },
    JourneyRunStep { step_id: crate::ids::JourneyRunStepId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub org_id: OrgId,
    pub conversation_id: ConversationId,
    pub direction: MessageDirection,
    pub text: Option<String>,
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
    pub external_id: Option<String>,
    pub linkage: Option<MessageLinkage>,
    pub received_at: DateTime<Utc>,
    pub error: Option<String>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub org_id: OrgId,
    pub contact_id: ContactId,
    pub stage: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub score: f64,
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
}

/// Sentinel stage name a Lead transitions into on conversion (invariant
/// I3: `converted_at` set <=> `stage == CONVERTED_STAGE`).
pub const CONVERTED_STAGE: &str = "converted";

impl Lead {
    /// A read-only snapshot handed to the pure rule engine — no
    /// contact_id/org_id, since rule evaluation never needs to look those
    /// up or mutate them.
    pub fn snapshot(&self) -> LeadSnapshot {
        LeadSnapshot {
            tags: self.tags.clone(),
            stage: self.stage.clone(),
            score: self.score,
            source: self.source.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Marks the lead converted, enforcing I3 and the "set once, monotone"
    /// rule on `converted_at` (P2).
    pub fn mark_converted(&mut self, at: DateTime<Utc>) {
        if self.converted_at.is_some() {
            return;
        }
        self.converted_at = Some(at);
        self.stage = CONVERTED_STAGE.to_string();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadSnapshot {
    pub tags: Vec<String>,
    pub stage: String,
    pub score: f64,
    pub source: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Analytics event envelope — the common shape every component emits into
/// the analytics pipeline, generalizing a common `AnalyticsEvent` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_id: uuid::Uuid,
    pub org_id: OrgId,
    pub event_type: EventType,
    pub channel_id: Option<ChannelId>,
    pub campaign_id: Option<crate::ids::CampaignId>,
    pub lead_id: Option<LeadId>,
    pub revenue: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    InboundReceived,
    OutboundSent,
    OutboundDelivered,
    OutboundFailed,
    LeadCreated,
    LeadRuleMatched,
    LeadConverted,
    CampaignScheduled,
    CampaignSendQueued,
    CampaignSendTerminal,
    JourneyEntered,
    JourneyStepCompleted,
    JourneyCompleted,
    JourneyFailed,
    AttributionComputed,
    RevenueRecorded,
}
