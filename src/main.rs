use std::sync::Arc;
use std::time::Duration;

use deputy::config::Config;
use deputy::platform::Connector;
use deputy::platform::rest::RestConnector;
use deputy::worker::{WorkerPool, start_workers};

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

    let config = Config::from_env()?;
    tracing::info!(
        base_url = %config.base_url,
        guild = %config.home_guild,
        workers = config.worker_credentials.len(),
        "Starting deputy v{}",
        env!("CARGO_PKG_VERSION"),
    );

    let connector: Arc<dyn Connector> = Arc::new(RestConnector::new(
        config.base_url.clone(),
        config.home_guild,
        config.heartbeat_interval,
    ));

    // Primary session: the context of last resort. Connected before any
    // worker so a gateway built on this pool always has somewhere to
    // fall back to. Embedders wire deputy::ops::{Members, Channels}
    // through an Offloader over this pool and session.
    let primary = connector.connect(&config.primary_credential).await?;
    tokio::spawn(async move {
        if let Err(e) = primary.run().await {
            tracing::error!(error = %e, "Primary session lost");
        }
    });

    let pool = Arc::new(WorkerPool::new());
    let workers = start_workers(
        &pool,
        &connector,
        config.worker_credentials,
        config.startup_stagger,
    )
    .await;
    if workers.is_empty() {
        tracing::warn!("No worker credentials configured, every call will use the primary session");
    }

    // Periodic pool status for operators.
    let status_pool = Arc::clone(&pool);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            for worker in status_pool.workers() {
                tracing::info!(
                    worker = worker.id(),
                    running = worker.is_running(),
                    tasks = worker.tasks_performed(),
                    "Pool status"
                );
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}
