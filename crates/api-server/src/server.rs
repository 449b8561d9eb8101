//! HTTP router assembly and server bootstrap. Generalizes the
//! `start_http`/`start_metrics` split, with per-feature route groups
//! merged with `.merge()`, down to this backend's single
//! shared [`AppState`]: every feature group below merges into one router
//! over that one state rather than a distinct state per feature.

use std::future::Future;
use std::net::SocketAddr;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{bearer_auth, bootstrap_auth};
use crate::handlers::{admin, analytics, campaigns, channels, crm, health, journeys, leads, webhooks};
use crate::state::AppState;

/// Builds the full router. Split out from
/// [`ApiServer`] so integration tests can mount it directly without binding
/// a socket.
pub fn router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(health::health));

    let channel_routes = Router::new()
    .route("/v1/channels", post(channels::create_channel).get(channels::list_channels));

    // Provider webhooks authenticate via HMAC signature ,
    // never a bearer token, since the provider sending them holds no API
    // key for this tenant — they stay outside the bearer-auth layer below.
    let provider_webhook_routes = Router::new()
    .route("/v1/webhooks/whatsapp/{provider}/{channel_id}", post(webhooks::provider_inbound))
    .route("/v1/webhooks/whatsapp/status/{provider}/{channel_id}", post(webhooks::provider_status));

    let mock_webhook_routes = Router::new().route("/v1/mock/whatsapp/inbound", post(webhooks::mock_inbound));

    let lead_routes = Router::new()
    .route("/v1/leads", get(leads::list_leads))
    .route("/v1/leads/{id}/signals", post(leads::post_signals))
    .route("/v1/lead-rules", get(leads::get_rules).put(leads::put_rules));

    let campaign_routes = Router::new()
    .route("/v1/campaigns", get(campaigns::list_campaigns).post(campaigns::create_campaign))
    .route("/v1/campaigns/{id}", get(campaigns::get_campaign))
    .route("/v1/campaigns/{id}/sends", get(campaigns::list_sends))
    .route("/v1/campaigns/{id}/schedule", post(campaigns::schedule_campaign))
    .route("/v1/campaigns/{id}/cancel", post(campaigns::cancel_campaign))
    .route("/v1/campaigns/{id}/roi", put(campaigns::compute_roi));

    let journey_routes = Router::new()
    .route("/v1/journeys", get(journeys::list_journeys).post(journeys::create_journey))
    .route("/v1/journeys/{id}", get(journeys::get_journey))
    .route("/v1/journeys/{id}/status", put(journeys::put_journey_status))
    .route("/v1/journeys/{id}/runs", get(journeys::list_runs))
    .route("/v1/journeys/runs/{id}", get(journeys::get_run))
    .route("/v1/journeys/runs/{id}/steps", get(journeys::list_run_steps));

    let analytics_routes = Router::new()
    .route("/v1/analytics/summary", get(analytics::summary))
    .route("/v1/analytics/channels", get(analytics::channels))
    .route("/v1/analytics/campaigns", get(analytics::campaigns))
    .route("/v1/analytics/realtime", get(analytics::realtime))
    .route("/v1/analytics/trends/channels", get(analytics::trends_channels))
    .route("/v1/analytics/trends/campaigns", get(analytics::trends_campaigns))
    .route("/v1/analytics/settings", get(analytics::get_settings).put(analytics::put_settings))
    .route("/v1/attribution/report", get(analytics::attribution_report));

    let crm_routes = Router::new()
    .route("/v1/crm/mapping", get(crm::get_mapping).put(crm::put_mapping))
    .route("/v1/crm/mapping/validate", post(crm::validate_mapping))
    .route("/v1/crm/mapping/preview", post(crm::preview_mapping))
    .route("/v1/crm/leads/{id}", post(crm::push_lead))
    .route("/v1/crm/revenue", post(crm::record_revenue));

    let authenticated = Router::new()
    .merge(channel_routes)
    .merge(mock_webhook_routes)
    .merge(lead_routes)
    .merge(campaign_routes)
    .merge(journey_routes)
    .merge(analytics_routes)
    .merge(crm_routes)
    .layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    let admin_routes = Router::new()
    .route("/v1/admin/api-keys", post(admin::mint_api_key))
    .layer(middleware::from_fn_with_state(state.clone(), bootstrap_auth));

    Router::new()
    .merge(health_routes)
    .merge(provider_webhook_routes)
    .merge(authenticated)
    .merge(admin_routes)
    .layer(CompressionLayer::new())
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Owns the bound listener configuration; `serve` runs until the supplied
/// shutdown future resolves, wrapping `axum::serve(...).await`
/// with graceful shutdown.
pub struct ApiServer {
    addr: SocketAddr,
    state: AppState,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let app = router(self.state);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server");
        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
        Ok(())
    }
}
