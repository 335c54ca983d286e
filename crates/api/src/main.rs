use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vrinda_api::{build_router, state::AppState};
use vrinda_config::{DEV_JWT_SECRET, Settings};
use vrinda_services::clock::SystemClock;
use vrinda_services::signaling::{MemoryStore, RedisStore, SignalingStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    init_tracing(&settings.app.log_format);

    if settings.jwt.secret == DEV_JWT_SECRET {
        warn!("Using the development JWT secret; set VRINDA__JWT__SECRET in production");
    }

    let store: Arc<dyn SignalingStore> = match &settings.redis.url {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            info!("Signaling relay backed by Redis");
            Arc::new(store)
        }
        None => {
            warn!("No Redis URL configured, signaling state is kept in process memory");
            let sweep = Duration::from_secs(settings.signaling.sweep_interval_secs.max(1));
            MemoryStore::with_sweeper(sweep)
        }
    };

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let state = AppState::new(settings, store, Arc::new(SystemClock));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Vrinda live-session server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(%e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
