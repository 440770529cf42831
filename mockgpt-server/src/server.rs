use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use anyhow::Context;
use axum::{
    Extension, Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    serve,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shared::config::{
    ConfigDocument,
    server::{Config, LogFormat},
};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    app_state::AppState,
    http::error::handle_panic,
    middleware::request_context::{self, RequestIdState},
    routes,
    services::{
        config_store::{JsonFileStore, SharedConfigStore},
        proxy_forwarder::ProxyForwarder,
    },
    tracer,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder on first use.
pub fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                warn!("metrics recorder already installed");
            }
            handle
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

/// Initializes the tracing subscriber for logging using the provided configuration.
///
/// Returns the configured level. A subscriber installed earlier is left in place.
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let installed = if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).try_init()
    } else {
        fmt_builder.with_ansi(true).try_init()
    };
    if installed.is_err() {
        warn!("tracing subscriber already installed");
    }

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Creates the application state around a configuration store.
///
/// # Errors
/// Returns an error if the upstream HTTP client cannot be built.
pub fn create_app_state(
    config: &Config,
    store: SharedConfigStore,
) -> anyhow::Result<Arc<AppState>> {
    let forwarder = ProxyForwarder::new().context("failed to build upstream HTTP client")?;
    Ok(Arc::new(AppState::new(store, forwarder, &config.streaming)))
}

/// Creates the CORS layer; an empty origin list allows any origin.
pub fn create_cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::list([Method::GET, Method::POST, Method::OPTIONS]))
        .allow_headers(AllowHeaders::any())
        .max_age(Duration::from_secs(config.server.cors.max_age_seconds));

    if config.server.cors.allowed_origins.is_empty() {
        cors.allow_origin(AllowOrigin::any())
    } else {
        let origins = config
            .server
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Routes served under the state, before middleware.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(routes::completions::create_router_completions())
        .merge(routes::config::create_router_config())
        .merge(routes::health::create_health_router())
}

/// Creates the main application router with all middleware and routes.
pub fn create_app_router(
    state: Arc<AppState>,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Router {
    let request_id_state = RequestIdState::from_config(config);

    create_api_router()
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(metrics_handle))
        .layer(create_cors_layer(config))
        .layer(tracer::create_trace_layer())
        .layer(from_fn_with_state(
            request_id_state,
            request_context::assign_request_id,
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// Resolves when CTRL+C is received.
pub async fn create_shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("Shutting down...");
}

/// Starts the server and serves until shutdown.
///
/// # Errors
/// Returns an error if the configuration document cannot be seeded, the
/// listener cannot be bound, or the server fails while running.
pub async fn run(config: Config) -> anyhow::Result<()> {
    initialize_tracing(&config);
    info!("Starting server...");

    let metrics_handle = metrics_handle();

    let store = JsonFileStore::new(&config.store.document_path);
    store
        .ensure_exists(&ConfigDocument::default())
        .await
        .with_context(|| {
            format!(
                "failed to prepare configuration document {}",
                store.path().display()
            )
        })?;
    info!(path = %store.path().display(), "using configuration document");

    let state = create_app_state(&config, Arc::new(store))?;
    let app = create_app_router(state, &config, metrics_handle);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}
