use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hotelbook::catalog::InMemoryCatalog;
use hotelbook::config::Config;
use hotelbook::engine::Engine;
use hotelbook::http::{self, AppState};
use hotelbook::{compactor, seed};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    hotelbook::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;

    let seed_data = match &config.seed_file {
        Some(path) => seed::load(path)?,
        None => seed::SeedFile::default(),
    };
    let catalog = Arc::new(InMemoryCatalog::from_hotels(seed_data.hotels.iter().cloned()));
    let engine = Arc::new(Engine::open(config.wal_path(), catalog.clone(), config.engine())?);
    let provisioned = seed::apply(&seed_data, &engine).await?;

    let compactor_task = tokio::spawn(compactor::run_compactor(engine.clone(), config.compact_threshold));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("hotelbook listening on {addr}");
    info!("  wal: {}", config.wal_path().display());
    info!("  hotels: {}, new calendar rows: {provisioned}", catalog.hotel_count());
    info!("  lock_timeout: {:?}", config.lock_timeout);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let app = http::router(AppState {
        engine: engine.clone(),
    });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server drained");
    compactor_task.abort();
    drop(engine);
    info!("hotelbook stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
