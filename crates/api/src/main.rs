use anyhow::Context;

use stockrecon_infra::config::AppConfig;
use stockrecon_infra::reconcile::ReconcileOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    stockrecon_observability::init(config.log_format);

    let engine = stockrecon_api::app::services::build_engine(&config.backend)
        .await
        .context("failed to build stores")?;

    if config.reconcile_on_start {
        // A failed startup pass is logged by the engine; serving continues so
        // the pass can be retried over HTTP.
        if let Ok(report) = engine.reconcile(ReconcileOptions::default()).await {
            tracing::info!(
                changed = report.variants_changed,
                anomalies = report.anomalies.len(),
                "startup reconcile complete"
            );
        }
    }

    let app = stockrecon_api::app::build_app(engine);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
