use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod allocator;
mod calendar;
mod capacity;
mod cache;
mod config;
mod crm;
mod db;
mod errors;
mod hr;
mod middleware;
mod models;
mod notifier;
mod routes;
mod selector;
mod state;
mod store;

use allocator::Allocator;
use crm::HttpCrmClient;
use notifier::SmtpNotifier;
use state::AppState;
use store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ───────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── Config ────────────────────────────────────────────────
    let config = config::Config::from_env()?;
    tracing::info!(env = %config.app_env, "Starting adviser allocation engine");

    // ── Database ──────────────────────────────────────────────
    let pool = db::connect(&config).await?;
    db::run_migrations(&pool).await?;

    // ── Collaborators ─────────────────────────────────────────
    let store = Arc::new(Store::new(pool.clone(), &config));
    let crm: Arc<dyn crm::CrmClient> = Arc::new(HttpCrmClient::new(&config)?);
    let notifier: Arc<dyn notifier::Notifier> = Arc::new(SmtpNotifier::new(config.clone()));
    let allocator = Arc::new(Allocator::new(store.clone(), crm.clone(), notifier, config.clone()));

    let app_state = AppState { pool, config, store, crm, allocator };

    // Read address before moving config into state
    let addr: SocketAddr = format!(
        "{}:{}",
        app_state.config.backend_host,
        app_state.config.backend_port
    )
    .parse()?;

    // ── Router ────────────────────────────────────────────────
    let app = Router::new()
        .nest("/api/v1", routes::all_routes(app_state.clone()))
        .layer(CorsLayer::permissive())     // tighten in production
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);
    tracing::info!(%addr, "Listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
