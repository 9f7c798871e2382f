use bridge_desktop::ReqwestHttpClient;
use clap::Parser;
use core_runtime::logging::init_logging;
use media_proxy::{router, ProxyConfig, ProxyState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ProxyConfig::parse();
    config.validate()?;
    init_logging(config.logging_config()?)?;

    if !config.strict_tls {
        warn!("Upstream TLS certificates are not verified (set STRICT_TLS to enable)");
    }

    let http_client = Arc::new(
        ReqwestHttpClient::builder()
            .timeout(config.request_timeout())
            .accept_invalid_certs(!config.strict_tls)
            .build()?,
    );
    let state = ProxyState::from_config(&config, http_client).await?;

    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!(
        addr = %listener.local_addr()?,
        upstream = config.upstream_base(),
        cache_dir = %config.cache_dir.display(),
        cache_videos = config.cache_videos,
        "Media proxy listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Media proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
