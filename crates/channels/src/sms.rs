//! Twilio SMS adapter — modeled on an `SmsProvider` shape
//! (account_sid/auth_token/from_number, status callback parsing),
//! narrowed to the `ProviderAdapter` contract.

use crate::adapter::{InboundMessage, ProviderAdapter, StatusUpdate};
use async_trait::async_trait;
use chrono::Utc;
use wireline_core::error::{WireError, WireResult};
use wireline_core::model::MessageStatus;

pub struct TwilioAdapter {
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioAdapter {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
        }
    }
}

#[async_trait]
impl ProviderAdapter for TwilioAdapter {
    fn provider_name(&self) -> &'static str {
        "twilio"
    }

    /// Normalizes Twilio's inbound SMS webhook form (`From`, `Body`,
    /// `MessageSid`).
    fn parse_inbound(&self, raw_payload: &serde_json::Value) -> WireResult<InboundMessage> {
        let sender_external_id = raw_payload
        .get("From")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WireError::InvalidInput("missing From in Twilio payload".to_string()))?
        .to_string();

        let text = raw_payload.get("Body").and_then(|v| v.as_str()).map(|s| s.to_string());
        let external_id = raw_payload.get("MessageSid").and_then(|v| v.as_str()).map(|s| s.to_string());

        Ok(InboundMessage {
                external_id,
                sender_external_id,
                sender_name: None,
                timestamp: Utc::now(),
                text,
                raw: raw_payload.clone(),
            })
    }

    fn build_mock_payload(&self, from: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
                "From": from,
                "To": self.from_number,
                "Body": text,
                "MessageSid": format!("SM{}", uuid::Uuid::new_v4().simple()),
            })
    }

    async fn send_text(&self, to: &str, text: &str) -> WireResult<String> {
        tracing::info!(
            to = to,
            body_len = text.len(),
            from = &self.from_number,
            account_sid = &self.account_sid,
            token_len = self.auth_token.len(),
            "Sending SMS via Twilio"
        );
        metrics::counter!("outbound.send.attempts", "provider" => "twilio").increment(1);
        Ok(format!("SM{}", uuid::Uuid::new_v4().simple()))
    }

    /// Maps Twilio's `MessageStatus` callback values to the canonical
    /// taxonomy; `queued`/`accepted`/`sending` have no canonical
    /// equivalent beyond `pending` and are ignored (caller already holds
    /// `pending`).
    fn parse_status(&self, raw_payload: &serde_json::Value) -> WireResult<StatusUpdate> {
        let provider_message_id = raw_payload
        .get("MessageSid")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WireError::InvalidInput("missing MessageSid in status callback".to_string()))?
        .to_string();

        let status = raw_payload
        .get("MessageStatus")
        .and_then(|v| v.as_str())
        .and_then(|s| match s {
                "sent" => Some(MessageStatus::Sent),
                "delivered" => Some(MessageStatus::Delivered),
                "read" => Some(MessageStatus::Read),
                "failed" | "undelivered" => Some(MessageStatus::Failed),
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

    fn adapter() -> TwilioAdapter {
        TwilioAdapter::new("AC123".to_string(), "token".to_string(), "+15555550100".to_string())
    }

    #[test]
    fn parses_inbound_mock_payload() {
        let a = adapter();
        let payload = a.build_mock_payload("+12065550123", "hello");
        let parsed = a.parse_inbound(&payload).expect("parses");
        assert_eq!(parsed.sender_external_id, "+12065550123");
        assert_eq!(parsed.text.as_deref(), Some("hello"));
    }

    #[test]
    fn undelivered_maps_to_failed() {
        let a = adapter();
        let payload = serde_json::json!({"MessageSid": "SM1", "MessageStatus": "undelivered"});
        let update = a.parse_status(&payload).expect("parses");
        assert_eq!(update.status, Some(MessageStatus::Failed));
    }
}
