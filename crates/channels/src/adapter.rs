//! Provider adapter contract and the single-registration-
//! point registry. An adapter may omit `send_text`
//! (inbound-only); the registry looks adapters up by `provider_name`,
//! generalizing per-channel providers
//! (a WhatsApp provider, an SMS/Twilio provider, an email provider) behind
//! one trait object instead of three unrelated structs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wireline_core::error::{WireError, WireResult};

/// A provider-shaped inbound payload normalized into the canonical shape
/// the pipeline names. `raw` is kept for adapters/handlers that need the
/// original payload (e.g. signature verification over the raw body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub external_id: Option<String>,
    pub sender_external_id: String,
    pub sender_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub text: Option<String>,
    pub raw: serde_json::Value,
}

/// Result of `parse_status`: the provider message id the status applies
/// to, and the canonical status string (`sent|delivered|read|failed`)
/// after the adapter's provider-string mapping. `None` status means the
/// provider string was unrecognized and should be ignored (logged, not
/// an error) per the provider status taxonomy.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub provider_message_id: String,
    pub status: Option<wireline_core::model::MessageStatus>,
}

/// A provider adapter: `parse_inbound`, `build_mock_payload`, `send_text`,
/// `parse_status`. Implementors may return
/// `WireError::ProviderError` for `send_text` when the call fails; the
/// pipeline classifies retryability via `WireError::is_retryable`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider key this adapter registers under, e.g. `"whatsapp"`,
    /// `"twilio"`, `"sendgrid"`.
    fn provider_name(&self) -> &'static str;

    /// Normalizes a raw provider payload into an `InboundMessage`. Returns
    /// `InvalidPayload` (as `WireError::InvalidInput`) if
    /// `sender_external_id` cannot be extracted.
    fn parse_inbound(&self, raw_payload: &serde_json::Value) -> WireResult<InboundMessage>;

    /// Builds a synthetic inbound payload shaped like this provider's
    /// webhook body, for the developer-only mock inbound endpoint.
    fn build_mock_payload(&self, from: &str, text: &str) -> serde_json::Value;

    /// Sends a text message to `to`, returning the provider's message id.
    /// Adapters that are inbound-only (no outbound capability) return
    /// `WireError::ProviderError` unconditionally.
    async fn send_text(&self, to: &str, text: &str) -> WireResult<String>;

    /// Maps a provider status callback payload to a `StatusUpdate`.
    fn parse_status(&self, raw_payload: &serde_json::Value) -> WireResult<StatusUpdate>;
}

/// Adapters registered once at startup by `provider_name`; read-only
/// afterward.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    adapters: Arc<DashMap<&'static str, Arc<dyn ProviderAdapter>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider_name(), adapter);
    }

    /// Looks up an adapter by provider key. `UnknownProvider` if nothing
    /// is registered under that key.
    pub fn get(&self, provider_name: &str) -> WireResult<Arc<dyn ProviderAdapter>> {
        self.adapters
        .get(provider_name)
        .map(|r| r.value().clone())
        .ok_or_else(|| WireError::InvalidInput(format!("unknown provider: {provider_name}")))
    }
}
