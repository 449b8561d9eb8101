//! Inbound surfaces: the developer-only mock
//! endpoint, the provider inbound webhook, and the provider status
//! webhook. Both real endpoints share `WebhookVerifier`; the mock
//! endpoint never verifies a signature since it has no provider body to
//! sign.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wireline_core::error::{WireError, WireResult};
use wireline_core::ids::{ChannelId, LeadId, MessageId};

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::orchestration::apply_rules_and_trigger;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MockInboundRequest {
    #[serde(rename = "channelId")]
    pub channel_id: ChannelId,
    pub from: String,
    pub text: String,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub message_id: MessageId,
    pub lead_id: LeadId,
}

/// `POST /v1/mock/whatsapp/inbound` — developer-only inbound simulation.
/// Builds the adapter's own mock payload so it exercises the exact same
/// `parse_inbound` path a real webhook would.
pub async fn mock_inbound(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<MockInboundRequest>,
) -> ApiResult<Json<IngestResponse>> {
    let channel = state
    .channels
    .get(&req.channel_id)
    .filter(|c| c.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("channel {}", req.channel_id)))?;

    let adapter = state.registry.get(&channel.provider)?;
    let payload = adapter.build_mock_payload(&req.from, &req.text);

    let result = state.pipeline.ingest_inbound(&channel, &channel.provider, payload).await?;
    apply_rules_and_trigger(&state, result.lead_id, Some(result.conversation_id), Some(&req.text), &[]).await?;

    Ok(Json(IngestResponse { message_id: result.message_id, lead_id: result.lead_id }))
}

/// `POST /v1/webhooks/whatsapp/:provider/:channelId` — provider inbound,
/// optionally signed.
pub async fn provider_inbound(
    State(state): State<AppState>,
    Path((provider, channel_id)): Path<(String, ChannelId)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<IngestResponse>> {
    verify_signature(&state, &headers, &body).await?;

    let channel = state
    .channels
    .get(&channel_id)
    .ok_or_else(|| WireError::NotFound(format!("channel {channel_id}")))?;

    let payload: Value = serde_json::from_slice(&body)
    .map_err(|e| ApiError::Validation(format!("invalid JSON body: {e}")))?;

    let result = state.pipeline.ingest_inbound(&channel, &provider, payload).await?;

    if let Some(message) = state.messages.get(&result.message_id) {
        apply_rules_and_trigger(&state, result.lead_id, Some(result.conversation_id), message.text.as_deref(), &[]).await?;
    }

    Ok(Json(IngestResponse { message_id: result.message_id, lead_id: result.lead_id }))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub message_id: Option<MessageId>,
}

/// `POST /v1/webhooks/whatsapp/status/:provider/:channelId` — provider
/// status callback.
pub async fn provider_status(
    State(state): State<AppState>,
    Path((provider, channel_id)): Path<(String, ChannelId)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<StatusResponse>> {
    verify_signature(&state, &headers, &body).await?;

    let channel = state
    .channels
    .get(&channel_id)
    .ok_or_else(|| WireError::NotFound(format!("channel {channel_id}")))?;

    let payload: Value = serde_json::from_slice(&body)
    .map_err(|e| ApiError::Validation(format!("invalid JSON body: {e}")))?;

    let result = state.pipeline.reconcile_status(&channel, &provider, &payload).await?;
    Ok(Json(StatusResponse { message_id: result.message_id }))
}

async fn verify_signature(state: &AppState, headers: &HeaderMap, body: &Bytes) -> WireResult<()> {
    let Some(verifier) = &state.verifier else { return Ok(()) };
    let timestamp = headers.get("x-omini-timestamp").and_then(|v| v.to_str().ok());
    let signature = headers.get("x-omini-signature").and_then(|v| v.to_str().ok());
    verifier.verify(timestamp, signature, body).await
}
