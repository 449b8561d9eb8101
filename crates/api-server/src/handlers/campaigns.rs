//! `GET/POST /v1/campaigns`, `POST /v1/campaigns/:id/schedule`,
//! `POST /v1/campaigns/:id/cancel`, `PUT /v1/campaigns/:id/roi`.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wireline_campaigns::{Campaign, CampaignCounters, CampaignRoi, CampaignSend, CampaignStatus, Segment};
use wireline_core::error::WireError;
use wireline_core::ids::{CampaignId, ChannelId};

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub channel_id: ChannelId,
    pub text: String,
    #[serde(default)]
    pub segment: Segment,
    #[serde(default)]
    pub cost: f64,
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<Json<Campaign>> {
    let now = Utc::now();
    let campaign = Campaign {
        id: CampaignId::new(),
        org_id: auth.org_id,
        name: req.name,
        channel_id: req.channel_id,
        text: req.text,
        segment: req.segment,
        status: CampaignStatus::Draft,
        schedule_at: None,
        cost: req.cost,
        counters: CampaignCounters::default(),
        created_at: now,
        updated_at: now,
    };
    state.campaigns.create_campaign(campaign.clone());
    Ok(Json(campaign))
}

pub async fn list_campaigns(State(state): State<AppState>, Extension(auth): Extension<AuthContext>) -> Json<Vec<Campaign>> {
    Json(state.campaigns.list_campaigns(auth.org_id))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<CampaignId>,
) -> ApiResult<Json<Campaign>> {
    let campaign = state
    .campaigns
    .get_campaign(&campaign_id)
    .filter(|c| c.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("campaign {campaign_id}")))?;
    Ok(Json(campaign))
}

pub async fn list_sends(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<CampaignId>,
) -> ApiResult<Json<Vec<CampaignSend>>> {
    state
    .campaigns
    .get_campaign(&campaign_id)
    .filter(|c| c.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("campaign {campaign_id}")))?;
    Ok(Json(state.campaigns.list_sends(campaign_id)))
}

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub schedule_at: DateTime<Utc>,
}

pub async fn schedule_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<CampaignId>,
    Json(req): Json<ScheduleRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
    .campaigns
    .get_campaign(&campaign_id)
    .filter(|c| c.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("campaign {campaign_id}")))?;
    state.campaigns.schedule_campaign(&campaign_id, req.schedule_at)?;
    Ok(Json(serde_json::json!({"status": "scheduled"})))
}

pub async fn cancel_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<CampaignId>,
) -> ApiResult<Json<serde_json::Value>> {
    state
    .campaigns
    .get_campaign(&campaign_id)
    .filter(|c| c.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("campaign {campaign_id}")))?;
    state.campaigns.cancel_campaign(&campaign_id)?;
    Ok(Json(serde_json::json!({"status": "cancelled"})))
}

#[derive(Deserialize)]
pub struct RoiRequest {
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub response_window_hours: Option<i64>,
}

/// `PUT /v1/campaigns/:id/roi`. `revenue` is supplied by the caller — this API layer
/// reads it straight from the request body rather than cross-calling the
/// attribution engine, since a campaign's revenue figure may come from a
/// CRM system outside this request's scope.
pub async fn compute_roi(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<CampaignId>,
    Json(req): Json<RoiRequest>,
) -> ApiResult<Json<CampaignRoi>> {
    state
    .campaigns
    .get_campaign(&campaign_id)
    .filter(|c| c.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("campaign {campaign_id}")))?;
    let window_hours = req.response_window_hours.unwrap_or_else(|| state.analytics_settings_for(auth.org_id).response_window_hours);
    let roi = state.campaigns.compute_roi(campaign_id, req.revenue, window_hours)?;
    Ok(Json(roi))
}
