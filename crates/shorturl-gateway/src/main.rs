use anyhow::Context;
use clap::Parser;
use shorturl_core::Shortener;
use shorturl_gateway::cli::CLI;
use shorturl_gateway::{telemetry, App, AppState};
use shorturl_generator::SeqGenerator;
use shorturl_shortener::ShortenerService;
use shorturl_storage::open_storage;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    telemetry::init(config.log_format)?;

    let base_url = config.validated_base_url()?;
    let storage_config = config.storage_config();
    info!(
        listen_addr = %config.listen_addr,
        base_url = %base_url,
        log_format = %config.log_format,
        "starting shorturl server"
    );

    let opened = open_storage(&storage_config)
        .await
        .context("failed to open storage")?;
    let service = Arc::new(ShortenerService::new(
        opened.storage,
        SeqGenerator::resume_after(opened.recovered_max),
        base_url,
    ));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    let router = App::router(AppState::new(service.clone()));
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(e) = service.shutdown().await {
        error!(error = %e, "storage did not close cleanly");
    }
    info!("shorturl server stopped");

    served.context("http server failed")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
    }
}
