//! Shared application state handed to every handler, mirroring the
//! `AppState`/`*State` structs passed into separate route groups
//! (one state struct per feature area)
//! but collapsed into one struct since every route here reads from the
//! same engine graph instead of disjoint ad-tech subsystems.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use wireline_cache::RedisCache;
use wireline_campaigns::CampaignEngine;
use wireline_channels::{MessagePipeline, ProviderRegistry, WebhookVerifier};
use wireline_core::config::AppConfig;
use wireline_core::event_bus::EventSink;
use wireline_core::ids::OrgId;
use wireline_core::model::AnalyticsEvent;
use wireline_core::store::{ChannelStore, ContactStore, ConversationStore, LeadStore, MessageStore};
use wireline_journey::JourneyEngine;
use wireline_jobs::JobSubstrate;
use wireline_analytics::{AttributionEngine, RollupEngine};
use wireline_rules::Rule;

use crate::crm_types::CrmMappingStore;

/// Per-org override of the analytics window defaults (`GET/PUT
/// /v1/analytics/settings`); absent orgs fall back to `AppConfig.analytics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSettings {
    pub default_realtime_window_minutes: i64,
    pub max_realtime_window_minutes: i64,
    pub response_window_hours: i64,
    pub attribution_window_days: i64,
}

impl AnalyticsSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_realtime_window_minutes: config.analytics.default_realtime_window_minutes,
            max_realtime_window_minutes: config.analytics.max_realtime_window_minutes,
            response_window_hours: config.analytics.response_window_hours,
            attribution_window_days: 30,
        }
    }
}

/// Everything `ApiServer::new` needs, already constructed by the binary
/// (`wireline-server`) — the API crate never owns engine lifecycles.
pub struct ApiServerDeps {
    pub channels: Arc<ChannelStore>,
    pub contacts: Arc<ContactStore>,
    pub conversations: Arc<ConversationStore>,
    pub messages: Arc<MessageStore>,
    pub leads: Arc<LeadStore>,
    pub pipeline: Arc<MessagePipeline>,
    pub registry: ProviderRegistry,
    pub jobs: Arc<JobSubstrate>,
    pub cache: Arc<RedisCache>,
    pub verifier: Option<Arc<WebhookVerifier>>,
    pub campaigns: Arc<CampaignEngine>,
    pub journeys: Arc<JourneyEngine>,
    pub attribution: Arc<AttributionEngine>,
    pub rollup: Arc<RollupEngine>,
    pub events: Arc<dyn EventSink>,
    pub event_log: Option<Arc<DashMap<OrgId, Vec<AnalyticsEvent>>>>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub start_time: Instant,
    pub api_keys: Arc<DashMap<String, OrgId>>,
    pub channels: Arc<ChannelStore>,
    pub contacts: Arc<ContactStore>,
    pub conversations: Arc<ConversationStore>,
    pub messages: Arc<MessageStore>,
    pub leads: Arc<LeadStore>,
    pub pipeline: Arc<MessagePipeline>,
    pub registry: ProviderRegistry,
    pub jobs: Arc<JobSubstrate>,
    pub cache: Arc<RedisCache>,
    pub verifier: Option<Arc<WebhookVerifier>>,
    pub rule_sets: Arc<DashMap<OrgId, Vec<Rule>>>,
    pub campaigns: Arc<CampaignEngine>,
    pub journeys: Arc<JourneyEngine>,
    pub attribution: Arc<AttributionEngine>,
    pub rollup: Arc<RollupEngine>,
    pub analytics_settings: Arc<DashMap<OrgId, AnalyticsSettings>>,
    pub crm_mappings: Arc<CrmMappingStore>,
    pub events: Arc<dyn EventSink>,
    pub event_log: Option<Arc<DashMap<OrgId, Vec<AnalyticsEvent>>>>,
}

impl AppState {
    pub fn new(config: AppConfig, deps: ApiServerDeps) -> Self {
        let api_keys = Arc::new(DashMap::new());
        for (key, org_id) in parse_api_keys(&config.api_keys) {
            api_keys.insert(key, org_id);
        }
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
            api_keys,
            channels: deps.channels,
            contacts: deps.contacts,
            conversations: deps.conversations,
            messages: deps.messages,
            leads: deps.leads,
            pipeline: deps.pipeline,
            registry: deps.registry,
            jobs: deps.jobs,
            cache: deps.cache,
            verifier: deps.verifier,
            rule_sets: Arc::new(DashMap::new()),
            campaigns: deps.campaigns,
            journeys: deps.journeys,
            attribution: deps.attribution,
            rollup: deps.rollup,
            analytics_settings: Arc::new(DashMap::new()),
            crm_mappings: Arc::new(DashMap::new()),
            events: deps.events,
            event_log: deps.event_log,
        }
    }

    pub fn analytics_settings_for(&self, org_id: OrgId) -> AnalyticsSettings {
        self.analytics_settings
        .get(&org_id)
        .map(|r| r.clone())
        .unwrap_or_else(|| AnalyticsSettings::from_config(&self.config))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parses `API_KEYS` (`key=org_id,key=org_id,...`) using the
/// bearer-to-organization mapping. Malformed entries are skipped and
/// logged rather than rejected wholesale, so one bad entry doesn't take
/// the whole map down at startup.
fn parse_api_keys(raw: &str) -> HashMap<String, OrgId> {
    let mut out = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((key, org_id)) = entry.split_once('=') else {
            tracing::warn!(entry, "malformed API_KEYS entry, expected key=org_id");
            continue;
        };
        match org_id.trim().parse::<uuid::Uuid>() {
            Ok(uuid) => {
                out.insert(key.trim().to_string(), OrgId::from(uuid));
            }
            Err(e) => tracing::warn!(entry, error = %e, "malformed org_id in API_KEYS entry"),
        }
    }
    out
}
