//! Enerex server binary: wire the engine task to the HTTP boundary.

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use enerex::config::Config;
use enerex::engine::{self, Exchange};
use enerex::server;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    info!(port = config.port, persistent = config.persistent_dir.is_some(), "starting");

    let exchange = Exchange::from_config(&config);
    let (engine, engine_task) = engine::spawn(exchange);

    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, port = config.port, "could not bind");
            return;
        }
    };

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "shutdown signal listener failed");
        }
        info!("shutdown requested");
    };

    if let Err(err) = server::serve(listener, engine, shutdown).await {
        error!(%err, "server error");
    }
    engine_task.abort();
}
