use dotenv::dotenv;
use mimalloc::MiMalloc;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use projects_api::{App, config::ServerConfig, router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_LOG_FILTER: &str = "projects_api=debug,tower_http=info";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = ServerConfig::new_from_env();
    let port = config.port;
    tracing::info!(env = ?config.env, orphan_policy = ?config.orphan_policy, "starting");

    let app = App::new(config)?;

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let production = std::env::var("ENVIRONMENT").is_ok_and(|e| e == "production");

    tracing_subscriber::registry()
        .with(filter)
        .with(production.then(|| fmt::layer().json()))
        .with((!production).then(|| fmt::layer()))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
