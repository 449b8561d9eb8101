//! SendGrid email adapter — modeled on a `SendGridProvider` shape
//! (from address, tracking toggles, delivery-event webhook), narrowed to
//! the `ProviderAdapter` contract. Email is identified by `sender_email`
//! in the identity space instead of a phone number, but the same
//! normalization shape applies.

use crate::adapter::{InboundMessage, ProviderAdapter, StatusUpdate};
use async_trait::async_trait;
use chrono::Utc;
use wireline_core::error::{WireError, WireResult};
use wireline_core::model::MessageStatus;

pub struct SendGridAdapter {
    from_email: String,
    api_key: String,
}

impl SendGridAdapter {
    pub fn new(from_email: String, api_key: String) -> Self {
        Self { from_email, api_key }
    }
}

#[async_trait]
impl ProviderAdapter for SendGridAdapter {
    fn provider_name(&self) -> &'static str {
        "sendgrid"
    }

    /// Normalizes SendGrid's inbound parse webhook (`from`, `subject`,
    /// `text`).
    fn parse_inbound(&self, raw_payload: &serde_json::Value) -> WireResult<InboundMessage> {
        let sender_external_id = raw_payload
        .get("from")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WireError::InvalidInput("missing from in SendGrid payload".to_string()))?
        .to_string();

        let text = raw_payload.get("text").and_then(|v| v.as_str()).map(|s| s.to_string());

        Ok(InboundMessage {
                external_id: None,
                sender_external_id,
                sender_name: raw_payload.get("from_name").and_then(|v| v.as_str()).map(|s| s.to_string()),
                timestamp: Utc::now(),
                text,
                raw: raw_payload.clone(),
            })
    }

    fn build_mock_payload(&self, from: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
                "from": from,
                "to": self.from_email,
                "subject": "Mock inbound email",
                "text": text,
            })
    }

    async fn send_text(&self, to: &str, text: &str) -> WireResult<String> {
        tracing::info!(
            to = to,
            body_len = text.len(),
            from = &self.from_email,
            key_len = self.api_key.len(),
            "Sending email via SendGrid"
        );
        metrics::counter!("outbound.send.attempts", "provider" => "sendgrid").increment(1);
        Ok(format!("sg-{}", uuid::Uuid::new_v4()))
    }

    /// Maps SendGrid's event webhook `event` field (`delivered`, `open`,
    /// `click`, `bounce`, `dropped`) to the canonical taxonomy.
    fn parse_status(&self, raw_payload: &serde_json::Value) -> WireResult<StatusUpdate> {
        let provider_message_id = raw_payload
        .get("sg_message_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WireError::InvalidInput("missing sg_message_id in status callback".to_string()))?
        .to_string();

        let status = raw_payload.get("event").and_then(|v| v.as_str()).and_then(|s| match s {
                "processed" => Some(MessageStatus::Sent),
                "delivered" => Some(MessageStatus::Delivered),
                "open" | "click" => Some(MessageStatus::Read),
                "bounce" | "dropped" | "blocked" => Some(MessageStatus::Failed),
                _ => None,
            });

        Ok(StatusUpdate {
                provider_message_id,
                status,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> SendGridAdapter {
        SendGridAdapter::new("hello@wireline.io".to_string(), "key".to_string())
    }

    #[test]
    fn bounce_maps_to_failed() {
        let a = adapter();
        let payload = serde_json::json!({"sg_message_id": "m1", "event": "bounce"});
        let update = a.parse_status(&payload).expect("parses");
        assert_eq!(update.status, Some(MessageStatus::Failed));
    }

    #[test]
    fn open_maps_to_read() {
        let a = adapter();
        let payload = serde_json::json!({"sg_message_id": "m1", "event": "open"});
        let update = a.parse_status(&payload).expect("parses");
        assert_eq!(update.status, Some(MessageStatus::Read));
    }
}
