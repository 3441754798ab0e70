use payforge_api::{app, config::ApiConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    payforge_observability::init();

    let config = ApiConfig::from_env()?;
    let app = app::build_app(&config).await?;
    let orchestrator = app.orchestrator().spawn();

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app.router)
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "failed to listen for shutdown signal");
            }
        })
        .await?;

    orchestrator.shutdown().await;
    Ok(())
}
