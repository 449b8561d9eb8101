//! `GET /v1/leads`, `POST /v1/leads/:id/signals`, `GET/PUT /v1/lead-rules`.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use wireline_core::error::WireError;
use wireline_core::ids::LeadId;
use wireline_core::model::Lead;
use wireline_rules::Rule;

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::orchestration::apply_rules_and_trigger;
use crate::state::AppState;

pub async fn list_leads(State(state): State<AppState>, Extension(auth): Extension<AuthContext>) -> Json<Vec<Lead>> {
    Json(state.leads.list_by_org(auth.org_id))
}

#[derive(Deserialize)]
pub struct SignalsRequest {
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Serialize)]
pub struct SignalsResponse {
    pub lead: Lead,
    pub matched_rules: usize,
}

/// `POST /v1/leads/:id/signals`: evaluates the
/// org's rule set against explicit signals/text rather than an inbound
/// message, applies the resulting diff, and triggers journeys/conversion
/// the same way inbound ingestion does.
pub async fn post_signals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(lead_id): Path<LeadId>,
    Json(req): Json<SignalsRequest>,
) -> ApiResult<Json<SignalsResponse>> {
    let lead = state
    .leads
    .get(&lead_id)
    .filter(|l| l.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("lead {lead_id}")))?;

    let conversation_id = state.conversations.list_by_contact(lead.contact_id).first().map(|c| c.id);
    let updates = apply_rules_and_trigger(&state, lead_id, conversation_id, req.text.as_deref(), &req.signals).await?;

    let updated = state.leads.get(&lead_id).unwrap_or(lead);
    Ok(Json(SignalsResponse { matched_rules: updates.matched_rules.len(), lead: updated }))
}

#[derive(Serialize)]
pub struct RuleSetResponse {
    pub rules: Vec<Rule>,
}

#[derive(Deserialize)]
pub struct PutRuleSetRequest {
    pub rules: Vec<Rule>,
}

/// `GET /v1/lead-rules`: the
/// org's current lead rule set. `PUT` replaces it wholesale — rules are
/// evaluated in the order stored, so partial/merge semantics would be
/// ambiguous about ordering.
pub async fn get_rules(State(state): State<AppState>, Extension(auth): Extension<AuthContext>) -> Json<RuleSetResponse> {
    let rules = state.rule_sets.get(&auth.org_id).map(|r| r.value().clone()).unwrap_or_default();
    Json(RuleSetResponse { rules })
}

pub async fn put_rules(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<PutRuleSetRequest>,
) -> Json<RuleSetResponse> {
    state.rule_sets.insert(auth.org_id, req.rules.clone());
    Json(RuleSetResponse { rules: req.rules })
}
