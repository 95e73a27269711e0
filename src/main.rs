use std::sync::Arc;

use anyhow::Context;
use caretaker_match::config::ServerConfig;
use caretaker_match::sink::{LogNavigator, LogSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env();
    let addr = config.socket_addr()?;

    eprintln!("CareTaker Match v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Entry:    http://{}/", addr);
    eprintln!("   Intake:   http://{}/api/intake", addr);
    eprintln!("   Provider: http://{}/api/provider", addr);
    eprintln!("   DEMO VERSION - submissions are logged and discarded\n");

    let app = caretaker_match::app(&config, Arc::new(LogSink), Arc::new(LogNavigator));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "Intake server started");
    axum::serve(listener, app).await?;

    Ok(())
}
