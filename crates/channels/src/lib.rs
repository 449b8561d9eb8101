//! Message pipeline: provider adapters, webhook
//! signature verification, and the inbound/outbound/reconcile pipeline
//! over the shared `wireline_core::store` repositories.

pub mod adapter;
pub mod email;
pub mod pipeline;
pub mod signature;
pub mod sms;
pub mod whatsapp;

pub use adapter::{InboundMessage, ProviderAdapter, ProviderRegistry, StatusUpdate};
pub use email::SendGridAdapter;
pub use pipeline::MessagePipeline;
pub use signature::WebhookVerifier;
pub use sms::TwilioAdapter;
pub use whatsapp::WhatsAppAdapter;
