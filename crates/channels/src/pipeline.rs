//! Message pipeline: `ingest_inbound`, `send_outbound`,
//! `reconcile_status` over the shared `wireline_core::store` repositories.
//! Stores are injected (not owned) so `wireline-campaigns` and
//! `wireline-journey` can observe terminal `Message` status directly
//! instead of this crate depending on theirs — the cyclic-reference
//! avoidance this pipeline needs, resolved at the store layer rather
//! than through an event bus for anything ownership-sensitive.

use crate::adapter::ProviderRegistry;
use crate::signature::WebhookVerifier;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wireline_core::error::{WireError, WireResult};
use wireline_core::event_bus::{make_event, EventSink};
use wireline_core::ids::{ChannelId, ContactId, ConversationId, LeadId, MessageId, OrgId};
use wireline_core::model::{
    Channel, Contact, EventType, Message, MessageDirection, MessageLinkage, MessageStatus,
};
use wireline_core::store::{ContactStore, ConversationStore, LeadStore, MessageStore};
use wireline_jobs::{Job, JobSubstrate, QueueName};

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct IngestResult {
    pub message_id: MessageId,
    pub contact_id: ContactId,
    pub conversation_id: ConversationId,
    pub lead_id: LeadId,
}

#[derive(Debug, Clone)]
pub struct ReconcileResult {
    pub message_id: Option<MessageId>,
    pub new_status: Option<MessageStatus>,
}

pub struct MessagePipeline {
    pub registry: ProviderRegistry,
    pub contacts: Arc<ContactStore>,
    pub conversations: Arc<ConversationStore>,
    pub messages: Arc<MessageStore>,
    pub leads: Arc<LeadStore>,
    pub jobs: Arc<JobSubstrate>,
    pub events: Arc<dyn EventSink>,
    pub verifier: Option<Arc<WebhookVerifier>>,
    pub send_timeout: Duration,
}

impl MessagePipeline {
    pub fn new(
        registry: ProviderRegistry,
        contacts: Arc<ContactStore>,
        conversations: Arc<ConversationStore>,
        messages: Arc<MessageStore>,
        leads: Arc<LeadStore>,
        jobs: Arc<JobSubstrate>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            contacts,
            conversations,
            messages,
            leads,
            jobs,
            events,
            verifier: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<WebhookVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// `IngestInbound(channel, provider, raw_payload)`.
    pub async fn ingest_inbound(
        &self,
        channel: &Channel,
        provider_name: &str,
        raw_payload: serde_json::Value,
    ) -> WireResult<IngestResult> {
        if channel.provider != provider_name {
            return Err(WireError::Conflict(format!(
                        "channel {} is bound to provider {}, not {}",
                        channel.id, channel.provider, provider_name
                    )));
        }

        let adapter = self.registry.get(provider_name)?;
        let parsed = adapter.parse_inbound(&raw_payload)?;

        let now = chrono::Utc::now();
        let contact = self
        .contacts
        .find_by_external_id(channel.org_id, &parsed.sender_external_id)
        .unwrap_or_else(|| {
                let contact = new_contact(channel.org_id, provider_name, &parsed.sender_external_id, parsed.sender_name.clone(), now);
                self.contacts.insert(contact.clone());
                contact
            });

        let conversation = self
        .conversations
        .get_or_create(channel.org_id, contact.id, channel.id, now);

        if let Some(external_id) = &parsed.external_id {
            if let Some(existing) = self.messages.find_by_external_id(conversation.id, external_id) {
                let lead = self.leads.get_or_create(channel.org_id, contact.id, now);
                return Ok(IngestResult {
                        message_id: existing.id,
                        contact_id: contact.id,
                        conversation_id: conversation.id,
                        lead_id: lead.id,
                    });
            }
        }

        let message = Message {
            id: MessageId::new(),
            org_id: channel.org_id,
            conversation_id: conversation.id,
            direction: MessageDirection::In,
            text: parsed.text.clone(),
            // Inbound messages are, by construction, already delivered to
            // us; there is no further provider-side delivery to track.
            status: MessageStatus::Delivered,
            provider_message_id: None,
            external_id: parsed.external_id.clone(),
            linkage: None,
            received_at: parsed.timestamp,
            error: None,
            attempts: 0,
        };
        self.messages.insert(message.clone());
        self.conversations.touch(&conversation.id, now);
        let lead = self.leads.get_or_create(channel.org_id, contact.id, now);
        self.leads.update(&lead.id, |l| l.last_activity_at = now);

        let mut event = make_event(channel.org_id, EventType::InboundReceived);
        event.channel_id = Some(channel.id);
        event.lead_id = Some(lead.id);
        self.events.emit(event);

        info!(
            org_id = %channel.org_id,
            channel_id = %channel.id,
            message_id = %message.id,
            contact_id = %contact.id,
            "Inbound message ingested"
        );

        Ok(IngestResult {
                message_id: message.id,
                contact_id: contact.id,
                conversation_id: conversation.id,
                lead_id: lead.id,
            })
    }

    /// `SendOutbound(channel, to, text, linkage?)`. Creates
    /// the `pending` Message and enqueues the actual provider call onto
    /// `outbound.messages`.
    pub async fn send_outbound(
        &self,
        channel: &Channel,
        to: &str,
        text: &str,
        linkage: Option<MessageLinkage>,
    ) -> WireResult<MessageId> {
        let now = chrono::Utc::now();
        let contact = self
        .contacts
        .find_by_external_id(channel.org_id, to)
        .unwrap_or_else(|| {
                let contact = new_contact(channel.org_id, &channel.provider, to, None, now);
                self.contacts.insert(contact.clone());
                contact
            });
        let conversation = self
        .conversations
        .get_or_create(channel.org_id, contact.id, channel.id, now);

        let message = Message {
            id: MessageId::new(),
            org_id: channel.org_id,
            conversation_id: conversation.id,
            direction: MessageDirection::Out,
            text: Some(text.to_string()),
            status: MessageStatus::Pending,
            provider_message_id: None,
            external_id: None,
            linkage,
            received_at: now,
            error: None,
            attempts: 0,
        };
        self.messages.insert(message.clone());

        self.jobs.enqueue(
            QueueName::OutboundMessages,
            serde_json::json!({
                    "message_id": message.id,
                    "channel_id": channel.id,
                    "provider": channel.provider,
                    "to": to,
                    "text": text,
                }),
        );

        Ok(message.id)
    }

    /// Worker handler for one `outbound.messages` job: performs the
    /// actual provider call under a per-call timeout and advances the Message's status. `max_attempts` lets this
    /// handler know whether this is the last try, so it can mark the
    /// Message terminally `failed` in lockstep with the job substrate's
    /// own dead-letter decision (I2: a CampaignSend/Step only reaches
    /// `sent`/`failed` after its Message does).
    pub async fn handle_outbound_job(&self, job: &Job, max_attempts: u32) -> Result<(), String> {
        let message_id: MessageId = serde_json::from_value(job.data["message_id"].clone())
        .map_err(|e| format!("malformed job data: {e}"))?;
        let provider: String = serde_json::from_value(job.data["provider"].clone())
        .map_err(|e| format!("malformed job data: {e}"))?;
        let to: String = serde_json::from_value(job.data["to"].clone())
        .map_err(|e| format!("malformed job data: {e}"))?;
        let text: String = serde_json::from_value(job.data["text"].clone())
        .map_err(|e| format!("malformed job data: {e}"))?;

        let adapter = self
        .registry
        .get(&provider)
        .map_err(|e| e.to_string())?;

        let attempt_number = job.attempts + 1;
        let result = tokio::time::timeout(self.send_timeout, adapter.send_text(&to, &text)).await;

        match result {
            Ok(Ok(provider_message_id)) => {
                self.messages.update(&message_id, |m| {
                        m.status = MessageStatus::Sent;
                        m.provider_message_id = Some(provider_message_id);
                    });
                metrics::counter!("outbound.send.success", "provider" => provider.clone()).increment(1);
                Ok(())
            }
            Ok(Err(e)) => {
                metrics::counter!("outbound.send.failures", "provider" => provider.clone()).increment(1);
                if attempt_number >= max_attempts {
                    self.messages.update(&message_id, |m| {
                            m.status = MessageStatus::Failed;
                            m.error = Some(e.to_string());
                            m.attempts = attempt_number;
                        });
                } else {
                    self.messages.update(&message_id, |m| m.attempts = attempt_number);
                }
                Err(e.to_string())
            }
            Err(_elapsed) => {
                metrics::counter!("outbound.send.timeouts", "provider" => provider.clone()).increment(1);
                if attempt_number >= max_attempts {
                    self.messages.update(&message_id, |m| {
                            m.status = MessageStatus::Failed;
                            m.error = Some("send timed out".to_string());
                            m.attempts = attempt_number;
                        });
                }
                Err("send timed out".to_string())
            }
        }
    }

    /// `ReconcileStatus(channel, provider_payload)`.
    /// Unknown `provider_message_id`s return success without mutation;
    /// status updates are applied only when `can_transition_to` allows it
    /// (I1), so a repeated identical callback is a no-op (P7).
    pub async fn reconcile_status(
        &self,
        channel: &Channel,
        provider_name: &str,
        raw_payload: &serde_json::Value,
    ) -> WireResult<ReconcileResult> {
        if channel.provider != provider_name {
            return Err(WireError::Conflict(format!(
                        "channel {} is bound to provider {}, not {}",
                        channel.id, channel.provider, provider_name
                    )));
        }

        let adapter = self.registry.get(provider_name)?;
        let status_update = adapter.parse_status(raw_payload)?;

        let Some(new_status) = status_update.status else {
            warn!(provider = provider_name, "Ignoring unrecognized provider status string");
            return Ok(ReconcileResult { message_id: None, new_status: None });
        };

        let Some(message) = self.messages.find_by_provider_message_id(&status_update.provider_message_id) else {
            return Ok(ReconcileResult { message_id: None, new_status: None });
        };

        if message.status == new_status {
            return Ok(ReconcileResult {
                    message_id: Some(message.id),
                    new_status: Some(message.status),
                });
        }

        if !message.status.can_transition_to(new_status) {
            return Ok(ReconcileResult {
                    message_id: Some(message.id),
                    new_status: Some(message.status),
                });
        }

        let updated = self
        .messages
        .update(&message.id, |m| m.status = new_status)
        .ok_or_else(|| WireError::NotFound(format!("message {}", message.id)))?;

        let event_type = match new_status {
            MessageStatus::Delivered => Some(EventType::OutboundDelivered),
            MessageStatus::Failed => Some(EventType::OutboundFailed),
            _ => None,
        };
        if let Some(event_type) = event_type {
            let mut event = make_event(channel.org_id, event_type);
            event.channel_id = Some(channel.id);
            self.events.emit(event);
        }

        Ok(ReconcileResult {
                message_id: Some(updated.id),
                new_status: Some(updated.status),
            })
    }
}

fn new_contact(
    org_id: OrgId,
    provider: &str,
    external_id: &str,
    name: Option<String>,
    now: chrono::DateTime<chrono::Utc>,
) -> Contact {
    let (phone, email) = if provider == "sendgrid" {
        (None, Some(external_id.to_string()))
    } else {
        (Some(external_id.to_string()), None)
    };
    Contact {
        id: ContactId::new(),
        org_id,
        phone,
        email,
        name,
        tags: Vec::new(),
        metadata: Default::default(),
        created_at: now,
    }
}
