//! Dexter trading core server.
//!
//! Wires the ingestion scheduler, signal engine, orchestration pipeline, and
//! execution engine into a single process, and serves the HTTP surface (§6)
//! on top of them.

use anyhow::{Context, Result};
use dexter_trading_core::auth::{api as auth_api, auth_middleware, AuthState, JwtHandler, UserStore};
use axum::{middleware as axum_mw, routing::post, Router};
use dexter_trading_core::config::Config;
use dexter_trading_core::execution::{self, ExecutionEngine, HttpBrokerBridge, OrderType};
use dexter_trading_core::ingestion::{HttpMarketDataProvider, IngestionScheduler, MarketDataProvider, ProviderClient};
use dexter_trading_core::orchestration::{
    self, HttpToolRunner, MemoryClient, OrchestrationPipeline, PlannerClient, ReflectionJob,
};
use dexter_trading_core::resilience::CircuitBreaker;
use dexter_trading_core::signals::strategies::{RsiReversionStrategy, SmaCrossStrategy};
use dexter_trading_core::signals::{SignalEngine, SignalEngineConfig, SignalStore, Strategy};
use dexter_trading_core::{api, artifacts, db, flow, metrics, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TRADED_SYMBOLS: &[&str] = &["AAPL", "MSFT", "SPY", "QQQ", "NVDA"];
const ORCHESTRATION_REQUEST_TIMEOUT_SECS: u64 = 15;
const REFLECTION_WINDOW_DAYS: i64 = 7;
const REFLECTION_INTERVAL_SECS: u64 = 6 * 3600;

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("dexter trading core starting");

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = db::Pool::new(config.database_url.clone(), config.pool.clone())
        .context("failed to open database pool")?;

    let metrics_handle = metrics::install();

    // Auth: absent JWT_SECRET disables the whole auth surface.
    let user_store = Arc::new(UserStore::new(&config.database_url).context("failed to open user store")?);
    let jwt_handler = config.jwt_secret.clone().map(|secret| Arc::new(JwtHandler::new(secret)));
    let auth_state = AuthState::new(user_store, jwt_handler.clone());
    info!(enabled = jwt_handler.is_some(), "auth initialized");

    // Ingestion: the bridge's own REST surface doubles as the market-data
    // provider (quotes + candles), selected at priority 0.
    let provider: Box<dyn MarketDataProvider> =
        Box::new(HttpMarketDataProvider::new("ib-bridge", 0, config.ib_bridge_url.clone())?);
    let provider_client = Arc::new(ProviderClient::new(vec![provider]));
    let ingestion_scheduler = Arc::new(IngestionScheduler::new(
        TRADED_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        config.ingestion_poll_interval,
        provider_client,
        pool.clone(),
        config.retry,
    ));

    // Signals.
    let signal_store = Arc::new(SignalStore::new(pool.clone()));
    let strategies: Vec<Box<dyn Strategy>> = vec![
        Box::new(SmaCrossStrategy::new(10, 30)),
        Box::new(RsiReversionStrategy::new(14)),
    ];
    let signal_engine = Arc::new(SignalEngine::new(
        SignalEngineConfig {
            symbols: TRADED_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            interval: config.ingestion_poll_interval,
            min_confidence: 0.55,
            expiry_hours: 24,
        },
        strategies,
        pool.clone(),
        signal_store.clone(),
    ));

    // Artifacts.
    let artifact_store = Arc::new(artifacts::ArtifactStore::new(pool.clone()));

    // Execution: broker bridge behind its own circuit breaker.
    let broker_breaker = Arc::new(CircuitBreaker::new("broker", config.circuit_breaker));
    let broker: Arc<dyn execution::BrokerBridge> =
        Arc::new(HttpBrokerBridge::new(config.ib_bridge_url.clone(), broker_breaker)?);
    let order_type = match config.order_type.as_str() {
        "market" | "mkt" => OrderType::Mkt,
        "stop" | "stp" => OrderType::Stp,
        _ => OrderType::Lmt,
    };
    let execution_engine = Arc::new(ExecutionEngine::new(
        signal_store.clone(),
        artifact_store.clone(),
        broker.clone(),
        pool.clone(),
        config.risk_per_trade,
        config.max_position_pct,
        order_type,
    ));

    // Orchestration: memory + planner clients, tool runner, pipeline.
    let request_timeout = std::time::Duration::from_secs(ORCHESTRATION_REQUEST_TIMEOUT_SECS);
    let memory_client = Arc::new(MemoryClient::new(config.memory_service_url.clone(), request_timeout)?);
    let planner_client = Arc::new(PlannerClient::new(config.agent0_service_url.clone(), request_timeout)?);
    let tool_runner: Arc<dyn orchestration::ToolRunner> =
        Arc::new(HttpToolRunner::new(config.dexter_service_url.clone(), request_timeout)?);
    let pipeline = Arc::new(OrchestrationPipeline::new(
        pool.clone(),
        signal_store.clone(),
        memory_client.clone(),
        planner_client,
        tool_runner,
    ));
    let reflection_job = Arc::new(ReflectionJob::new(memory_client, REFLECTION_WINDOW_DAYS, false));

    // Background loops.
    tokio::spawn(ingestion_scheduler.run());
    tokio::spawn(signal_engine.run());
    tokio::spawn(reflection_job.run(std::time::Duration::from_secs(REFLECTION_INTERVAL_SECS)));

    let app_state = api::AppState {
        signal_store,
        pipeline,
        execution_engine,
        broker,
        metrics_handle,
    };

    let auth_router = Router::new()
        .route("/auth/status", axum::routing::get(auth_api::auth_status))
        .route("/auth/login", post(auth_api::login))
        .with_state(auth_state);

    let mut protected_routes = api::api_router(app_state.clone());
    if let Some(handler) = jwt_handler.clone() {
        protected_routes = protected_routes.route_layer(axum_mw::from_fn_with_state(handler, auth_middleware));
    }

    let public_routes = api::public_router(app_state);

    let rate_limiter = middleware::RateLimitLayer::new(middleware::RateLimitConfig {
        enabled: config.rate_limit_enabled,
        requests_per_minute: config.rate_limit_requests_per_minute,
        requests_per_hour: config.rate_limit_requests_per_hour,
        ..Default::default()
    });
    tokio::spawn({
        let rate_limiter = rate_limiter.clone();
        async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(600));
            loop {
                ticker.tick().await;
                rate_limiter.cleanup();
            }
        }
    });

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(auth_router)
        .layer(axum_mw::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(axum::middleware::from_fn(flow::flow_id_middleware))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "dexter trading core listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dexter_trading_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    let _ = dotenv::dotenv();
}
