use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use temperature_service::{api, config::Config, db, ingest::MqttIngest, store::ReadingsStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional: deployments usually inject the environment directly
    let _ = dotenvy::dotenv();

    // RUST_LOG drives the filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let store = ReadingsStore::new(pool, config.schema.clone());
    info!(table = %store.schema().table(), "Database ready");

    // MQTT ingestion shares the store (and its pool) with the HTTP handlers
    match config.mqtt.clone() {
        Some(mqtt) => {
            tokio::spawn(MqttIngest::new(store.clone(), mqtt).run());
        }
        None => info!("MQTT_BROKER_HOST not set; ingestion disabled"),
    }

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM. A handler that fails to install
/// is logged and never fires, so the other one still triggers shutdown.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    info!(signal = received, "Draining HTTP connections before exit");
}
