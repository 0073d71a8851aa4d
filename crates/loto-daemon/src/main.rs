//! loto-daemon entry point.
//!
//! Thin on purpose: load configuration, set up tracing, connect the store,
//! build the shared state, wire middleware, and start the HTTP server. Route
//! handlers live in `routes.rs`; shared state in `state.rs`.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use loto_auth::JwksVerifier;
use loto_config::DaemonConfig;
use loto_core::LotoService;
use loto_daemon::{routes, state};
use loto_db::PgStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = DaemonConfig::from_env().context("invalid daemon configuration")?;
    info!(config = ?cfg, "configuration loaded");

    let pool = loto_db::connect(&cfg.db).await?;
    if cfg.db.auto_migrate {
        loto_db::migrate(&pool).await?;
        info!("database migrations applied");
    }

    let store = Arc::new(PgStore::from_config(pool, &cfg.db));
    let service = LotoService::new(store, cfg.public_base_url.clone());
    let verifier = Arc::new(JwksVerifier::new(&cfg.auth).context("identity provider client")?);
    let shared = state::AppState::new(service, verifier);
    shared
        .check_ticket_code()
        .context("LOTO_PUBLIC_BASE_URL is unusable")?;
    let shared = Arc::new(shared);

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors(&cfg.cors_origins));

    info!("loto-daemon listening on http://{}", cfg.bind_addr);

    axum::serve(tokio::net::TcpListener::bind(cfg.bind_addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS for the configured frontend origins, credentials allowed.
fn cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([routes::TICKET_ID_HEADER])
        .allow_credentials(true)
}
