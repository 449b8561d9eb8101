//! Process entrypoint: loads configuration, constructs the store/engine
//! graph every handler and scheduler shares, spawns the background
//! schedulers (campaign materialization, journey sweep, analytics
//! rollup, outbound job poller, local cache eviction), and serves the
//! HTTP API until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};

use wireline_analytics::{AttributionEngine, RollupEngine, Scope, TouchpointSource};
use wireline_api::state::{ApiServerDeps, AppState};
use wireline_api::ApiServer;
use wireline_cache::RedisCache;
use wireline_campaigns::CampaignEngine;
use wireline_channels::{
    MessagePipeline, ProviderRegistry, SendGridAdapter, TwilioAdapter, WebhookVerifier, WhatsAppAdapter,
};
use wireline_core::config::AppConfig;
use wireline_core::event_bus::EventSink;
use wireline_core::store::{ChannelStore, ContactStore, ConversationStore, LeadStore, MessageStore};
use wireline_jobs::{JobPolicy, JobSubstrate, QueueName};
use wireline_journey::JourneyEngine;

/// Overrides layered on top of `AppConfig::load()` for local runs where
/// exporting every knob as an env var is more ceremony than the flag is
/// worth.
#[derive(Parser, Debug)]
#[command(name = "wireline-server", version, about = "Omnichannel messaging backend")]
struct Cli {
    /// Override PORT / WIRELINE__API__HTTP_PORT.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Emit human-readable logs instead of JSON (local development).
    #[arg(long, env = "LOG_PRETTY", default_value_t = false)]
    log_pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_pretty);

    let mut config = AppConfig::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load configuration, falling back to defaults");
            AppConfig::default()
        });
    if let Some(port) = cli.port {
        config.api.http_port = port;
    }

    if let Err(e) = install_metrics_exporter(config.metrics.port) {
        warn!(error = %e, "Failed to install Prometheus exporter, metrics will not be exported");
    }

    let channels = Arc::new(ChannelStore::new());
    let contacts = Arc::new(ContactStore::new());
    let conversations = Arc::new(ConversationStore::new());
    let messages = Arc::new(MessageStore::new());
    let leads = Arc::new(LeadStore::new());

    let cache = Arc::new(RedisCache::new(&config.redis).await?);

    let logger = wireline_analytics::EventLogger::new(10_000, 200, Duration::from_secs(2));
    let event_log_handle = logger.log();
    let events: Arc<dyn EventSink> = Arc::new(logger);

    let registry = build_provider_registry();

    let jobs = Arc::new(JobSubstrate::new(JobPolicy::from(&config.jobs)));

    let verifier = Arc::new(WebhookVerifier::new(config.webhook.clone(), cache.clone()));

    let pipeline = Arc::new(
        MessagePipeline::new(
            registry.clone(),
            contacts.clone(),
            conversations.clone(),
            messages.clone(),
            leads.clone(),
            jobs.clone(),
            events.clone(),
        )
        .with_verifier(verifier.clone()),
    );

    let campaigns = Arc::new(CampaignEngine::new(
            leads.clone(),
            channels.clone(),
            contacts.clone(),
            messages.clone(),
            pipeline.clone(),
            cache.clone(),
            events.clone(),
        ));

    let journeys = Arc::new(JourneyEngine::new(
            pipeline.clone(),
            channels.clone(),
            contacts.clone(),
            leads.clone(),
            messages.clone(),
            cache.clone(),
            events.clone(),
        ));

    let touchpoints = TouchpointSource {
        messages: messages.clone(),
        conversations: conversations.clone(),
        leads: leads.clone(),
        journeys: journeys.clone(),
        campaigns: Some(campaigns.clone()),
    };
    let attribution = Arc::new(AttributionEngine::new(touchpoints));

    let rollup = Arc::new(RollupEngine::new(
            messages.clone(),
            conversations.clone(),
            leads.clone(),
            Some(campaigns.clone()),
            attribution.clone(),
            config.analytics.response_window_hours,
        ));

    spawn_schedulers(
        config.clone(),
        channels.clone(),
        cache.clone(),
        campaigns.clone(),
        journeys.clone(),
        rollup.clone(),
    );
    spawn_outbound_poller(config.clone(), cache.clone(), jobs.clone(), pipeline.clone());

    let deps = ApiServerDeps {
        channels,
        contacts,
        conversations,
        messages,
        leads,
        pipeline,
        registry,
        jobs,
        cache,
        verifier: Some(verifier),
        campaigns,
        journeys,
        attribution,
        rollup,
        events,
        event_log: Some(event_log_handle),
    };

    let addr = SocketAddr::new(config.api.host.parse()?, config.api.http_port);
    let state = AppState::new(config, deps);
    let server = ApiServer::new(addr, state);
    server.serve(shutdown_signal()).await
}

fn init_tracing(pretty: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if pretty {
        subscriber.init();
    } else {
        subscriber.json().init();
    }
}

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!(addr = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

/// Registers every provider adapter whose credentials are present in the
/// environment. An adapter absent its credentials is simply not
/// registered — `ProviderRegistry::get` then fails with `UnknownProvider`
/// for that channel's sends instead of attempting a call doomed to fail.
fn build_provider_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    if let (Ok(base_url), Ok(token), Ok(phone_number_id)) = (
        std::env::var("WHATSAPP_API_BASE_URL"),
        std::env::var("WHATSAPP_ACCESS_TOKEN"),
        std::env::var("WHATSAPP_PHONE_NUMBER_ID"),
    ) {
        registry.register(Arc::new(WhatsAppAdapter::new(base_url, token, phone_number_id)));
        info!("Registered WhatsApp provider adapter");
    }

    if let (Ok(sid), Ok(token), Ok(from)) = (
        std::env::var("TWILIO_ACCOUNT_SID"),
        std::env::var("TWILIO_AUTH_TOKEN"),
        std::env::var("TWILIO_FROM_NUMBER"),
    ) {
        registry.register(Arc::new(TwilioAdapter::new(sid, token, from)));
        info!("Registered Twilio SMS provider adapter");
    }

    if let (Ok(from_email), Ok(api_key)) = (std::env::var("SENDGRID_FROM_EMAIL"), std::env::var("SENDGRID_API_KEY")) {
        registry.register(Arc::new(SendGridAdapter::new(from_email, api_key)));
        info!("Registered SendGrid email provider adapter");
    }

    registry
}

#[allow(clippy::too_many_arguments)]
fn spawn_schedulers(
    config: AppConfig,
    channels: Arc<ChannelStore>,
    cache: Arc<RedisCache>,
    campaigns: Arc<CampaignEngine>,
    journeys: Arc<JourneyEngine>,
    rollup: Arc<RollupEngine>,
) {
    let campaign_interval = Duration::from_millis(config.schedulers.campaign_interval_ms);
    tokio::spawn(async move {
            let mut ticker = tokio::time::interval(campaign_interval);
            loop {
                ticker.tick().await;
                for org_id in channels.all_org_ids() {
                    if let Err(e) = campaigns.tick_scheduler(org_id, Utc::now()).await {
                        error!(org_id = %org_id, error = %e, "Campaign scheduler tick failed");
                    }
                }
            }
        });

    let journey_interval = Duration::from_millis(config.schedulers.journey_interval_ms);
    let journeys_for_sweep = journeys.clone();
    tokio::spawn(async move {
            let mut ticker = tokio::time::interval(journey_interval);
            loop {
                ticker.tick().await;
                let advanced = journeys_for_sweep.sweep(Utc::now()).await;
                if !advanced.is_empty() {
                    info!(steps = advanced.len(), "Journey sweep advanced steps");
                }
            }
        });

    let analytics_interval = Duration::from_millis(config.schedulers.analytics_interval_ms);
    let channels_for_rollup = channels.clone();
    tokio::spawn(async move {
            let mut ticker = tokio::time::interval(analytics_interval);
            loop {
                ticker.tick().await;
                let today = Utc::now().date_naive();
                for org_id in channels_for_rollup.all_org_ids() {
                    rollup.recompute(org_id, today, Scope::Org);
                    for channel in channels_for_rollup.list_by_org(org_id) {
                        rollup.recompute(org_id, today, Scope::Channel(channel.id));
                    }
                }
            }
        });

    tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                cache.maintenance().await;
            }
        });
}

fn spawn_outbound_poller(
    config: AppConfig,
    cache: Arc<RedisCache>,
    jobs: Arc<JobSubstrate>,
    pipeline: Arc<MessagePipeline>,
) {
    let max_attempts = config.jobs.max_attempts;
    jobs.spawn_poller(
        QueueName::OutboundMessages,
        cache,
        Duration::from_millis(500),
        4,
        move |job| {
            let pipeline = pipeline.clone();
            async move { pipeline.handle_outbound_job(&job, max_attempts).await }
        },
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler")
        .recv()
        .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining in-flight requests");
}
