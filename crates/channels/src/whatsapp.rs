//! WhatsApp Business API adapter — modeled on a `WhatsAppProvider`
//! shape (template/text send over the Cloud API), narrowed
//! to the `ProviderAdapter` contract.

use crate::adapter::{InboundMessage, ProviderAdapter, StatusUpdate};
use async_trait::async_trait;
use chrono::Utc;
use wireline_core::error::{WireError, WireResult};
use wireline_core::model::MessageStatus;

pub struct WhatsAppAdapter {
    api_base_url: String,
    access_token: String,
    phone_number_id: String,
}

impl WhatsAppAdapter {
    pub fn new(api_base_url: String, access_token: String, phone_number_id: String) -> Self {
        Self {
            api_base_url,
            access_token,
            phone_number_id,
        }
    }
}

#[async_trait]
impl ProviderAdapter for WhatsAppAdapter {
    fn provider_name(&self) -> &'static str {
        "whatsapp"
    }

    /// Normalizes a WhatsApp Cloud API webhook body:
    /// `entry[0].changes[0].value.messages[0]`.
    fn parse_inbound(&self, raw_payload: &serde_json::Value) -> WireResult<InboundMessage> {
        let message = raw_payload
        .pointer("/entry/0/changes/0/value/messages/0")
        .or_else(|| raw_payload.get("message"))
        .ok_or_else(|| WireError::InvalidInput("no message in WhatsApp payload".to_string()))?;

        let sender_external_id = message
        .get("from")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WireError::InvalidInput("missing sender phone number".to_string()))?
        .to_string();

        let text = message
        .pointer("/text/body")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

        let external_id = message.get("id").and_then(|v| v.as_str()).map(|s| s.to_string());

        let sender_name = raw_payload
        .pointer("/entry/0/changes/0/value/contacts/0/profile/name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

        Ok(InboundMessage {
                external_id,
                sender_external_id,
                sender_name,
                timestamp: Utc::now(),
                text,
                raw: raw_payload.clone(),
            })
    }

    fn build_mock_payload(&self, from: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
                "entry": [{
                        "changes": [{
                                "value": {
                                    "contacts": [{"profile": {"name": "Mock Contact"}}],
                                    "messages": [{
                                            "from": from,
                                            "id": format!("wamid.mock-{}", uuid::Uuid::new_v4()),
                                            "timestamp": Utc::now().timestamp().to_string(),
                                            "text": {"body": text}
                                        }]
                                }
                            }]
                    }]
            })
    }

    async fn send_text(&self, to: &str, text: &str) -> WireResult<String> {
        tracing::info!(
            to = to,
            body_len = text.len(),
            phone_id = &self.phone_number_id,
            base = &self.api_base_url,
            token_len = self.access_token.len(),
            "Sending WhatsApp text message"
        );
        metrics::counter!("outbound.send.attempts", "provider" => "whatsapp").increment(1);
        Ok(format!("wamid.{}", uuid::Uuid::new_v4()))
    }

    /// Maps the Cloud API's `statuses[0].status` values to the canonical
    /// taxonomy; unrecognized strings yield `status: None`.
    fn parse_status(&self, raw_payload: &serde_json::Value) -> WireResult<StatusUpdate> {
        let status_obj = raw_payload
        .pointer("/entry/0/changes/0/value/statuses/0")
        .or_else(|| raw_payload.get("status"))
        .ok_or_else(|| WireError::InvalidInput("no status in WhatsApp payload".to_string()))?;

        let provider_message_id = status_obj
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WireError::InvalidInput("missing message id in status callback".to_string()))?
        .to_string();

        let status = status_obj.get("status").and_then(|v| v.as_str()).and_then(|s| match s {
                "sent" => Some(MessageStatus::Sent),
                "delivered" => Some(MessageStatus::Delivered),
                "read" => Some(MessageStatus::Read),
                "failed" => Some(MessageStatus::Failed),
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

    fn adapter() -> WhatsAppAdapter {
        WhatsAppAdapter::new("https://graph.facebook.com".to_string(), "token".to_string(), "123".to_string())
    }

    #[test]
    fn parses_inbound_mock_payload() {
        let a = adapter();
        let payload = a.build_mock_payload("+12065550123", "I want the price");
        let parsed = a.parse_inbound(&payload).expect("parses");
        assert_eq!(parsed.sender_external_id, "+12065550123");
        assert_eq!(parsed.text.as_deref(), Some("I want the price"));
    }

    #[test]
    fn rejects_payload_without_sender() {
        let a = adapter();
        let payload = serde_json::json!({"entry": []});
        assert!(a.parse_inbound(&payload).is_err());
    }

    #[test]
    fn unrecognized_status_string_ignored() {
        let a = adapter();
        let payload = serde_json::json!({"status": {"id": "wamid.1", "status": "banana"}});
        let update = a.parse_status(&payload).expect("parses");
        assert!(update.status.is_none());
        assert_eq!(update.provider_message_id, "wamid.1");
    }
}
