//! `GET/POST/PUT /v1/journeys`, `GET /v1/journeys/:id/runs`.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use wireline_core::error::WireError;
use wireline_core::ids::{JourneyId, JourneyRunId};
use wireline_journey::{Edge, Journey, JourneyRun, JourneyRunStep, JourneyStatus, Node, Trigger};

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateJourneyRequest {
    pub name: String,
    pub triggers: Vec<Trigger>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

pub async fn create_journey(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateJourneyRequest>,
) -> Json<Journey> {
    let now = Utc::now();
    let journey = Journey {
        id: JourneyId::new(),
        org_id: auth.org_id,
        name: req.name,
        status: JourneyStatus::Draft,
        triggers: req.triggers,
        nodes: req.nodes,
        edges: req.edges,
        created_at: now,
        updated_at: now,
    };
    state.journeys.create_journey(journey.clone());
    Json(journey)
}

pub async fn list_journeys(State(state): State<AppState>, Extension(auth): Extension<AuthContext>) -> Json<Vec<Journey>> {
    Json(state.journeys.list_journeys(auth.org_id))
}

pub async fn get_journey(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(journey_id): Path<JourneyId>,
) -> ApiResult<Json<Journey>> {
    let journey = state
    .journeys
    .get_journey(&journey_id)
    .filter(|j| j.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("journey {journey_id}")))?;
    Ok(Json(journey))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: JourneyStatus,
}

#[derive(Serialize)]
pub struct UpdateStatusResponse {
    pub status: JourneyStatus,
}

pub async fn put_journey_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(journey_id): Path<JourneyId>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<UpdateStatusResponse>> {
    state
    .journeys
    .get_journey(&journey_id)
    .filter(|j| j.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("journey {journey_id}")))?;
    state.journeys.update_status(&journey_id, req.status.clone())?;
    Ok(Json(UpdateStatusResponse { status: req.status }))
}

pub async fn list_runs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(journey_id): Path<JourneyId>,
) -> ApiResult<Json<Vec<JourneyRun>>> {
    state
    .journeys
    .get_journey(&journey_id)
    .filter(|j| j.org_id == auth.org_id)
    .ok_or_else(|| WireError::NotFound(format!("journey {journey_id}")))?;
    Ok(Json(state.journeys.list_runs(journey_id)))
}

pub async fn get_run(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthContext>,
    Path(run_id): Path<JourneyRunId>,
) -> ApiResult<Json<JourneyRun>> {
    state
    .journeys
    .get_run(&run_id)
    .ok_or_else(|| WireError::NotFound(format!("journey run {run_id}")))
    .map(Json)
}

pub async fn list_run_steps(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthContext>,
    Path(run_id): Path<JourneyRunId>,
) -> ApiResult<Json<Vec<JourneyRunStep>>> {
    state
    .journeys
    .get_run(&run_id)
    .ok_or_else(|| WireError::NotFound(format!("journey run {run_id}")))?;
    Ok(Json(state.journeys.list_steps(run_id)))
}
