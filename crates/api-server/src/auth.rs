//! Bearer token authentication. Generalizes a static dev-token prefix check
//! into a lookup against the `API_KEYS`-derived org map built in
//! `state::parse_api_keys`, since here a token must resolve to a
//! specific tenant rather than grant a single global admin role.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use wireline_core::ids::OrgId;

use crate::state::AppState;

/// Attached to the request by [`bearer_auth`] once a token resolves;
/// handlers pull the caller's org out of this instead of re-parsing the
/// header themselves.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub org_id: OrgId,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody { error: "unauthorized", message: message.to_string() }),
    )
    .into_response()
}

/// Middleware for every `/v1/*` route except `/v1/admin/*`: resolves the
/// bearer token to an [`OrgId`] via `state.api_keys` and inserts
/// [`AuthContext`] as a request extension.
pub async fn bearer_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = match bearer_token(&req) {
        Some(t) => t,
        None => return unauthorized("Authorization: Bearer <token> header required"),
    };

    let Some(org_id) = state.api_keys.get(token).map(|r| *r) else {
        return unauthorized("unrecognized API key");
    };

    req.extensions_mut().insert(AuthContext { org_id });
    next.run(req).await
}

/// Middleware for `/v1/admin/*`: compares the `x-bootstrap-token` header
/// against `config.bootstrap_token` rather than the per-org API key map,
/// since the admin endpoint mints new API keys and so cannot itself
/// require one.
pub async fn bootstrap_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(token) = bootstrap_token(&req) else {
        return unauthorized("x-bootstrap-token header required");
    };

    match &state.config.bootstrap_token {
        Some(expected) if expected == token => next.run(req).await,
        Some(_) => unauthorized("invalid bootstrap token"),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                    error: "not_found",
                    message: "admin bootstrap endpoint disabled: no bootstrap token configured".to_string(),
                }),
        )
        .into_response(),
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
}

fn bootstrap_token(req: &Request) -> Option<&str> {
    req.headers().get("x-bootstrap-token").and_then(|v| v.to_str().ok())
}
