//! `GET /health` — unauthenticated liveness probe. This endpoint
//! pins the exact 200 body as `{status:"ok"}`; unlike a
//! richer `health_check` response, this handler returns nothing beyond
//! that field (see DESIGN.md).

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
