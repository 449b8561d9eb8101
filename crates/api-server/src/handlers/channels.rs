//! `POST/GET /v1/channels`.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use wireline_core::ids::ChannelId;
use wireline_core::model::Channel;

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateChannelRequest {
    pub provider: String,
    pub name: String,
}

pub async fn create_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateChannelRequest>,
) -> ApiResult<Json<Channel>> {
    let channel = Channel {
        id: ChannelId::new(),
        org_id: auth.org_id,
        provider: req.provider,
        name: req.name,
        created_at: Utc::now(),
    };
    state.channels.insert(channel.clone());
    Ok(Json(channel))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Json<Vec<Channel>> {
    Json(state.channels.list_by_org(auth.org_id))
}
