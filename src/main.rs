use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use chatgate::{app::build_router, config::settings, handlers::AppState, services::metrics};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = settings::load().context("loading configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "chatgate=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    metrics::init_metrics().context("registering metrics")?;

    let state = AppState::new(settings.clone()).context("building application state")?;
    let _gc = state
        .rate_limiter
        .spawn_gc(Duration::from_secs(settings.rate_limit.gc_interval_seconds));

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(
        %addr,
        environment = %settings.environment,
        storage = ?settings.storage.backend,
        "chatgate listening"
    );

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("chatgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
