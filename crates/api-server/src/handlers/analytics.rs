//! `GET /v1/analytics/{summary,channels,campaigns,realtime,trends/...}`,
//! `GET/PUT /v1/analytics/settings`, `GET /v1/attribution/report`.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use wireline_analytics::{AnalyticsDaily, Attribution, CreditModel, Scope};
use wireline_core::ids::{CampaignId, ChannelId};

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::{AnalyticsSettings, AppState};

fn parse_date(raw: Option<&str>) -> ApiResult<NaiveDate> {
    match raw {
        None => Ok(Utc::now().date_naive()),
        Some(s) => s.parse().map_err(|_| ApiError::Validation(format!("invalid date {s}, expected YYYY-MM-DD"))),
    }
}

#[derive(Deserialize)]
pub struct DateQuery {
    #[serde(default)]
    pub date: Option<String>,
}

/// `GET /v1/analytics/summary` — org-wide rollup for one day (today by
/// default).
pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<AnalyticsDaily>> {
    let date = parse_date(query.date.as_deref())?;
    Ok(Json(state.rollup.recompute(auth.org_id, date, Scope::Org)))
}

#[derive(Serialize)]
pub struct ChannelAnalytics {
    pub channel_id: ChannelId,
    pub daily: AnalyticsDaily,
}

/// `GET /v1/analytics/channels` — per-channel rollup for one day.
pub async fn channels(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<ChannelAnalytics>>> {
    let date = parse_date(query.date.as_deref())?;
    let rows = state
    .channels
    .list_by_org(auth.org_id)
    .into_iter()
    .map(|c| ChannelAnalytics { channel_id: c.id, daily: state.rollup.recompute(auth.org_id, date, Scope::Channel(c.id)) })
    .collect();
    Ok(Json(rows))
}

#[derive(Serialize)]
pub struct CampaignAnalytics {
    pub campaign_id: CampaignId,
    pub daily: AnalyticsDaily,
}

/// `GET /v1/analytics/campaigns` — per-campaign rollup for one day.
pub async fn campaigns(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<CampaignAnalytics>>> {
    let date = parse_date(query.date.as_deref())?;
    let rows = state
    .campaigns
    .list_campaigns(auth.org_id)
    .into_iter()
    .map(|c| CampaignAnalytics { campaign_id: c.id, daily: state.rollup.recompute(auth.org_id, date, Scope::Campaign(c.id)) })
    .collect();
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct RealtimeQuery {
    #[serde(default)]
    pub window_minutes: Option<i64>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    #[serde(default)]
    pub campaign_id: Option<CampaignId>,
}

/// `GET /v1/analytics/realtime` — on-demand trailing-window counters,
/// not persisted.
pub async fn realtime(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<RealtimeQuery>,
) -> ApiResult<Json<AnalyticsDaily>> {
    let settings = state.analytics_settings_for(auth.org_id);
    let window_minutes = query.window_minutes.unwrap_or(settings.default_realtime_window_minutes);
    let scope = match (query.channel_id, query.campaign_id) {
        (Some(channel_id), _) => Scope::Channel(channel_id),
        (_, Some(campaign_id)) => Scope::Campaign(campaign_id),
        _ => Scope::Org,
    };
    Ok(Json(state.rollup.realtime_window(auth.org_id, scope, window_minutes, settings.max_realtime_window_minutes)))
}

#[derive(Deserialize)]
pub struct TrendsQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Serialize)]
pub struct ChannelTrend {
    pub channel_id: ChannelId,
    pub days: Vec<AnalyticsDaily>,
}

/// `GET /v1/analytics/trends/channels` — per-channel daily series over
/// the trailing `days` (default 7).
pub async fn trends_channels(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TrendsQuery>,
) -> ApiResult<Json<Vec<ChannelTrend>>> {
    let dates = trailing_dates(query.days.unwrap_or(7))?;
    let rows = state
    .channels
    .list_by_org(auth.org_id)
    .into_iter()
    .map(|c| {
            let days = dates.iter().map(|d| state.rollup.recompute(auth.org_id, *d, Scope::Channel(c.id))).collect();
            ChannelTrend { channel_id: c.id, days }
        })
    .collect();
    Ok(Json(rows))
}

#[derive(Serialize)]
pub struct CampaignTrend {
    pub campaign_id: CampaignId,
    pub days: Vec<AnalyticsDaily>,
}

/// `GET /v1/analytics/trends/campaigns` — per-campaign daily series over
/// the trailing `days` (default 7).
pub async fn trends_campaigns(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TrendsQuery>,
) -> ApiResult<Json<Vec<CampaignTrend>>> {
    let dates = trailing_dates(query.days.unwrap_or(7))?;
    let rows = state
    .campaigns
    .list_campaigns(auth.org_id)
    .into_iter()
    .map(|c| {
            let days = dates.iter().map(|d| state.rollup.recompute(auth.org_id, *d, Scope::Campaign(c.id))).collect();
            CampaignTrend { campaign_id: c.id, days }
        })
    .collect();
    Ok(Json(rows))
}

fn trailing_dates(days: i64) -> ApiResult<Vec<NaiveDate>> {
    if days <= 0 || days > 366 {
        return Err(ApiError::Validation(format!("days must be in 1..=366, got {days}")));
    }
    let today = Utc::now().date_naive();
    Ok((0..days).rev().map(|offset| today - Duration::days(offset)).collect())
}

/// `GET /v1/analytics/settings`.
pub async fn get_settings(State(state): State<AppState>, Extension(auth): Extension<AuthContext>) -> Json<AnalyticsSettings> {
    Json(state.analytics_settings_for(auth.org_id))
}

/// `PUT /v1/analytics/settings`.
pub async fn put_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(settings): Json<AnalyticsSettings>,
) -> Json<AnalyticsSettings> {
    state.analytics_settings.insert(auth.org_id, settings.clone());
    Json(settings)
}

#[derive(Deserialize)]
pub struct AttributionReportQuery {
    pub model: String,
}

#[derive(Serialize)]
pub struct AttributionReport {
    pub model: CreditModel,
    pub rows: Vec<Attribution>,
}

/// `GET /v1/attribution/report?model=first_touch|last_touch|linear`.
pub async fn attribution_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AttributionReportQuery>,
) -> ApiResult<Json<AttributionReport>> {
    let model = CreditModel::parse(&query.model).ok_or_else(|| ApiError::Validation(format!("unknown model {}", query.model)))?;
    let rows = state.attribution.all_rows_for_org(auth.org_id).into_iter().filter(|r| r.model == model).collect();
    Ok(Json(AttributionReport { model, rows }))
}
