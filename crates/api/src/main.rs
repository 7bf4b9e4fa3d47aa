use anyhow::Context;

use cafekiosk_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cafekiosk_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = cafekiosk_api::app::services::build_services(&config).await?;
    let app = cafekiosk_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        locking_policy = ?config.locking_policy,
        "listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app).await?;
    Ok(())
}
