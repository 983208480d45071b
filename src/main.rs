use anyhow::Result;
use recap_engine::{create_router, AppState, Config};
use tracing::info;

/// Exit code for misconfiguration (non-loopback host, invalid settings).
const EXIT_MISCONFIGURED: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: invalid engine configuration: {e}");
            std::process::exit(EXIT_MISCONFIGURED);
        }
    };

    // The engine serves exactly one machine; binding anywhere else is a
    // configuration error caught before the socket opens.
    if !config.is_loopback_host() {
        eprintln!(
            "ERROR: engine must bind to loopback only (got: {})",
            config.host
        );
        std::process::exit(EXIT_MISCONFIGURED);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.mode,
        "starting recap engine"
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config);
    let registry = state.registry.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "engine listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    info!("engine stopped");
    Ok(())
}

/// Wait for SIGINT/SIGTERM, then abort in-flight sessions before the server
/// drains its handlers.
async fn shutdown_signal(registry: std::sync::Arc<recap_engine::SessionRegistry>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
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
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let active = registry.active_ids();
    if !active.is_empty() {
        info!(sessions = active.len(), "aborting in-flight sessions");
    }
    registry.abort_all();
    info!("shutdown signal received");
}
