//! `GET/PUT /v1/crm/mapping`, `POST /v1/crm/mapping/{validate,preview}`,
//! `POST /v1/crm/leads/:id`, `POST /v1/crm/revenue`.
//!
//! CRM UI ergonomics and the full field-mapping engine are an explicit
//! non-goal; these handlers accept and echo back the
//! documented JSON shapes with structural validation only, except
//! `revenue`, which really feeds C5.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use wireline_analytics::RevenueEvent;
use wireline_core::error::WireError;
use wireline_core::ids::{CampaignId, LeadId, RevenueEventId};

use crate::auth::AuthContext;
use crate::crm_types::{apply_mapping, CrmMapping, MappingPreview};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn get_mapping(State(state): State<AppState>, Extension(auth): Extension<AuthContext>) -> Json<CrmMapping> {
    Json(state.crm_mappings.get(&auth.org_id).map(|r| r.clone()).unwrap_or_default())
}

pub async fn put_mapping(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(mut mapping): Json<CrmMapping>,
) -> Json<CrmMapping> {
    mapping.updated_at = Utc::now();
    state.crm_mappings.insert(auth.org_id, mapping.clone());
    Json(mapping)
}

#[derive(Deserialize)]
pub struct MappingSampleRequest {
    pub sample: Map<String, Value>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub unmapped_fields: Vec<String>,
}

/// `POST /v1/crm/mapping/validate` — checks `sample` against the stored
/// mapping without mutating any Lead; `unmapped_fields` non-empty is not
/// itself invalid, since a mapping may deliberately ignore CRM columns.
pub async fn validate_mapping(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<MappingSampleRequest>,
) -> Json<ValidateResponse> {
    let mapping = state.crm_mappings.get(&auth.org_id).map(|r| r.clone()).unwrap_or_default();
    let preview = apply_mapping(&mapping, &req.sample);
    Json(ValidateResponse { valid: true, unmapped_fields: preview.unmapped_fields })
}

/// `POST /v1/crm/mapping/preview` — the Lead fields `sample` would
/// produce under the stored mapping, without writing anything.
pub async fn preview_mapping(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<MappingSampleRequest>,
) -> Json<MappingPreview> {
    let mapping = state.crm_mappings.get(&auth.org_id).map(|r| r.clone()).unwrap_or_default();
    Json(apply_mapping(&mapping, &req.sample))
}

#[derive(Deserialize)]
pub struct CrmLeadPushRequest {
    pub record: Map<String, Value>,
}

#[derive(Serialize)]
pub struct CrmLeadPushResponse {
    pub lead_id: LeadId,
    pub applied: MappingPreview,
}

/// `POST /v1/crm/leads/:id` — applies the org's stored mapping to an
/// inbound CRM record and writes the resulting fields onto the named
/// Lead, using the same [`apply_mapping`] the preview/validate endpoints
/// use so they can never disagree with what actually gets written.
pub async fn push_lead(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(lead_id): Path<LeadId>,
    Json(req): Json<CrmLeadPushRequest>,
) -> ApiResult<Json<CrmLeadPushResponse>> {
    state
    .leads
    .get(&lead_id)
    .filter(|l| l.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("lead {lead_id}")))?;

    let mapping = state.crm_mappings.get(&auth.org_id).map(|r| r.clone()).unwrap_or_default();
    let applied = apply_mapping(&mapping, &req.record);

    state.leads.update(&lead_id, |l| {
            if let Some(stage) = &applied.stage {
                l.stage = stage.clone();
            }
            for tag in &applied.tags {
                if !l.tags.contains(tag) {
                    l.tags.push(tag.clone());
                }
            }
            if let Some(score) = applied.score {
                l.score = score;
            }
            if let Some(source) = &applied.source {
                l.source = Some(source.clone());
            }
            for (key, value) in &applied.metadata {
                l.metadata.insert(key.clone(), value.clone());
            }
            l.last_activity_at = Utc::now();
        });

    let settings = state.analytics_settings_for(auth.org_id);
    crate::conversion::detect_and_attribute(
        &state.leads,
        &state.attribution,
        state.events.as_ref(),
        lead_id,
        settings.attribution_window_days,
        None,
        Utc::now(),
    );

    Ok(Json(CrmLeadPushResponse { lead_id, applied }))
}

#[derive(Deserialize)]
pub struct RevenueEventRequest {
    #[serde(default)]
    pub lead_id: Option<LeadId>,
    #[serde(default)]
    pub campaign_id: Option<CampaignId>,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

fn default_currency() -> String {
    "usd".to_string()
}

/// `POST /v1/crm/revenue`. Unlike the rest of this module, this is core C5
/// behavior wearing a CRM-shaped entry point, not a stub.
pub async fn record_revenue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<RevenueEventRequest>,
) -> Json<RevenueEvent> {
    let settings = state.analytics_settings_for(auth.org_id);
    let event = RevenueEvent {
        id: RevenueEventId::new(),
        org_id: auth.org_id,
        lead_id: req.lead_id,
        campaign_id: req.campaign_id,
        amount: req.amount,
        currency: req.currency,
        external_id: req.external_id,
        received_at: Utc::now(),
        attributed_campaign_id: None,
    };
    Json(state.attribution.record_revenue_event(event, settings.attribution_window_days))
}
