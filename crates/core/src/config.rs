use serde::Deserialize;

/// Root application configuration. Loaded from environment variables with
/// the prefix `WIRELINE__` (nested fields separated by `__`), plus the
/// flat, spec-mandated env vars read directly in `AppConfig::load`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub schedulers: SchedulerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// `BOOTSTRAP_TOKEN` — required to call the admin bootstrap endpoint.
    #[serde(default)]
    pub bootstrap_token: Option<String>,
    /// `API_KEYS` — dev-mode `key=org_id,key=org_id,...` bearer token map.
    /// Full authentication is out of scope; this is the
    /// simplest mechanism that satisfies "a bearer token resolves to an
    /// organization_id."
    #[serde(default)]
    pub api_keys: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_nats_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_consumer_prefix")]
    pub consumer_prefix: String,
    #[serde(default = "default_nats_max_reconnects")]
    pub max_reconnects: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// `CAMPAIGN_SCHEDULER_INTERVAL_MS`, `ANALYTICS_SCHEDULER_INTERVAL_MS`,
/// `JOURNEY_SCHEDULER_INTERVAL_MS`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_campaign_interval_ms")]
    pub campaign_interval_ms: u64,
    #[serde(default = "default_analytics_interval_ms")]
    pub analytics_interval_ms: u64,
    #[serde(default = "default_journey_interval_ms")]
    pub journey_interval_ms: u64,
}

/// `WEBHOOK_SIGNING_SECRET`, `WEBHOOK_SIGNATURE_TTL_MS`,
/// `WEBHOOK_SIGNATURE_REQUIRED`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub signing_secret: Option<String>,
    #[serde(default = "default_webhook_ttl_ms")]
    pub signature_ttl_ms: u64,
    #[serde(default)]
    pub signature_required: bool,
}

impl WebhookConfig {
    /// Whether inbound payloads must carry a valid signature: either an
    /// explicit requirement, or a configured secret.
    pub fn verification_enabled(&self) -> bool {
        self.signature_required || self.signing_secret.is_some()
    }
}

/// Job substrate defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_remove_on_complete")]
    pub remove_on_complete: usize,
    #[serde(default = "default_remove_on_fail")]
    pub remove_on_fail: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_realtime_window_minutes")]
    pub default_realtime_window_minutes: i64,
    #[serde(default = "default_realtime_window_max_minutes")]
    pub max_realtime_window_minutes: i64,
    #[serde(default = "default_response_window_hours")]
    pub response_window_hours: i64,
}

fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_database_url() -> String {
    "postgres://localhost/wireline".to_string()
}
fn default_nats_urls() -> Vec<String> {
    vec!["nats://localhost:4222".to_string()]
}
fn default_consumer_prefix() -> String {
    "wireline".to_string()
}
fn default_nats_max_reconnects() -> usize {
    60
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_pool_size() -> u32 {
    32
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_cache_ttl_secs() -> u64 {
    600
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_campaign_interval_ms() -> u64 {
    30_000
}
fn default_analytics_interval_ms() -> u64 {
    60_000
}
fn default_journey_interval_ms() -> u64 {
    5_000
}
fn default_webhook_ttl_ms() -> u64 {
    300_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    1_000
}
fn default_remove_on_complete() -> usize {
    1_000
}
fn default_remove_on_fail() -> usize {
    5_000
}
fn default_realtime_window_minutes() -> i64 {
    60
}
fn default_realtime_window_max_minutes() -> i64 {
    1_440
}
fn default_response_window_hours() -> i64 {
    24
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            urls: default_nats_urls(),
            consumer_prefix: default_consumer_prefix(),
            max_reconnects: default_nats_max_reconnects(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
            default_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            campaign_interval_ms: default_campaign_interval_ms(),
            analytics_interval_ms: default_analytics_interval_ms(),
            journey_interval_ms: default_journey_interval_ms(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            remove_on_complete: default_remove_on_complete(),
            remove_on_fail: default_remove_on_fail(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_realtime_window_minutes: default_realtime_window_minutes(),
            max_realtime_window_minutes: default_realtime_window_max_minutes(),
            response_window_hours: default_response_window_hours(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
            nats: NatsConfig::default(),
            redis: RedisConfig::default(),
            metrics: MetricsConfig::default(),
            schedulers: SchedulerConfig::default(),
            webhook: WebhookConfig::default(),
            jobs: JobsConfig::default(),
            analytics: AnalyticsConfig::default(),
            bootstrap_token: None,
            api_keys: String::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional
    /// config file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder().add_source(
            config::Environment::with_prefix("WIRELINE")
            .separator("__")
            .try_parsing(true)
            .list_separator(","),
        );

        // Flat, spec-mandated env vars take precedence over nested ones.
        for (flat, nested) in [
            ("DATABASE_URL", "database.url"),
            ("REDIS_URL", "redis.url"),
            ("PORT", "api.http_port"),
            ("BOOTSTRAP_TOKEN", "bootstrap_token"),
            ("API_KEYS", "api_keys"),
            ("CAMPAIGN_SCHEDULER_INTERVAL_MS", "schedulers.campaign_interval_ms"),
            ("ANALYTICS_SCHEDULER_INTERVAL_MS", "schedulers.analytics_interval_ms"),
            ("JOURNEY_SCHEDULER_INTERVAL_MS", "schedulers.journey_interval_ms"),
            ("WEBHOOK_SIGNING_SECRET", "webhook.signing_secret"),
            ("WEBHOOK_SIGNATURE_TTL_MS", "webhook.signature_ttl_ms"),
            ("WEBHOOK_SIGNATURE_REQUIRED", "webhook.signature_required"),
        ] {
            if let Ok(value) = std::env::var(flat) {
                builder = builder.set_override(nested, value)?;
            }
        }

        builder.build()?.try_deserialize()
    }
}
