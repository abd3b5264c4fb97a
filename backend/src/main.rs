//! AquaCrop Irrigation Engine - Backend Server
//!
//! Keeps an irrigation plan for one farm up to date from live weather and
//! field data, and serves it to the dashboard.

use std::{net::SocketAddr, sync::Arc};

use aquacrop_engine::{
    clock::{Clock, SystemClock},
    config::Config,
    create_app,
    external::{
        AlertSink, HttpVegetationSource, LogAlertSink, OpenMeteoClient, PushAlertSink, RemoteOracle,
        SimulatedVegetationSource, VegetationSource,
    },
    services::{
        EngineDependencies, EngineSettings, FocusAdvisor, RefreshPeriods, RefreshScheduler,
        ScheduleStrategy, SessionContext,
    },
    AppState, Engine,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "aquacrop_engine=debug,tower_http=debug".into());
    if std::env::var("AQC_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = Config::load()?;

    tracing::info!("Starting AquaCrop Irrigation Engine");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Farm: {}", config.farm.name);

    let engine = Arc::new(build_engine(&config)?);

    // Start periodic triggers
    let scheduler = RefreshScheduler::new(engine.clone(), RefreshPeriods::from(&config.refresh));
    scheduler.start_all();

    // Create application state
    let state = AppState {
        engine,
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop_all();
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wire the engine's collaborators from configuration
fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let feed = Arc::new(OpenMeteoClient::new(
        config.weather.api_endpoint.clone(),
        config.weather.request_soil_moisture,
        clock.clone(),
    ));

    let vegetation: Arc<dyn VegetationSource> = match &config.vegetation.api_endpoint {
        Some(endpoint) => Arc::new(HttpVegetationSource::new(endpoint.clone())),
        None => {
            tracing::info!("No vegetation endpoint configured, using simulated indices");
            Arc::new(SimulatedVegetationSource::new())
        }
    };

    let remote = config.oracle.api_endpoint.as_ref().map(|endpoint| {
        Arc::new(RemoteOracle::new(
            endpoint.clone(),
            config.oracle.focus_endpoint.clone(),
            config.oracle.api_key.clone(),
        ))
    });
    let oracle = remote.clone().map(|r| r as Arc<dyn ScheduleStrategy>);
    let focus_advisor = remote.map(|r| r as Arc<dyn FocusAdvisor>);

    let alerts: Arc<dyn AlertSink> = match &config.alerts.push_endpoint {
        Some(endpoint) => Arc::new(PushAlertSink::new(endpoint.clone())),
        None => Arc::new(LogAlertSink),
    };

    let settings = EngineSettings {
        location: config.farm.location(),
        window_start: config.scheduling.window_start_time()?,
        icon_url: config.alerts.icon_url.clone(),
        max_log_entries: config.activity_log.max_entries,
        session: SessionContext {
            tier: config.session.tier,
            alerts_permitted: config.session.alerts_permitted,
            read_only: config.session.read_only,
        },
    };

    Ok(Engine::new(
        settings,
        EngineDependencies {
            feed,
            vegetation,
            oracle,
            focus_advisor,
            alerts,
            clock,
        },
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
