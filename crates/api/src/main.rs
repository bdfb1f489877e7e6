use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use taskforge_api::app::{build_app, build_services};
use taskforge_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("reading configuration")?;
    taskforge_observability::init(config.log_format);
    if config.uses_dev_jwt_secret() {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let bind_addr = config.bind_addr;
    let services = build_services(config).await.context("starting services")?;
    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;
    Ok(())
}
