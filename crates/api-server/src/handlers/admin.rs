//! `POST /v1/admin/api-keys` — admin bootstrap endpoint:
//! mints a bearer token mapped to an organization. Guarded by
//! [`crate::auth::bootstrap_auth`], never by [`crate::auth::bearer_auth`],
//! since it is the thing that hands out the tokens `bearer_auth` checks.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wireline_core::ids::OrgId;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct MintApiKeyRequest {
    /// Reuses an existing organization if supplied; otherwise a fresh one
    /// is minted.
    #[serde(default)]
    pub organization_id: Option<OrgId>,
}

#[derive(Serialize)]
pub struct MintApiKeyResponse {
    pub api_key: String,
    pub organization_id: OrgId,
}

pub async fn mint_api_key(State(state): State<AppState>, Json(req): Json<MintApiKeyRequest>) -> Json<MintApiKeyResponse> {
    let organization_id = req.organization_id.unwrap_or_else(OrgId::new);
    let api_key = format!("wk_{}", Uuid::new_v4().simple());
    state.api_keys.insert(api_key.clone(), organization_id);
    Json(MintApiKeyResponse { api_key, organization_id })
}
