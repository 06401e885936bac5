use std::sync::Arc;

use courier::channels::{Channel, CliChannel};
use courier::commands::{CommandTable, Dispatcher};
use courier::config::BotConfig;
use courier::engine::Engine;
use courier::scheduler::{self, Scheduler};
use courier::services::HttpContentServices;
use courier::store::{LibSqlStore, Store};

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

    let config = BotConfig::from_env()?;
    config.validate()?;
    let config = Arc::new(config);

    eprintln!("🤖 {} v{}", config.name, env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Uploads: {}", config.uploads_dir.display());
    eprintln!("   Type a message and press Enter. Ctrl-C to exit.\n");

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn Store> = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    store.run_migrations().await?;

    // The operator is an admin from the first startup, before any message
    // from them arrives.
    if let Some(operator) = config.operator_address.as_deref() {
        store.upsert_user(operator, None, Some(true)).await?;
        tracing::info!(operator = %operator, "Operator seeded as admin");
    }

    // ── Channel, services, engine ────────────────────────────────────────
    let channel: Arc<dyn Channel> = Arc::new(CliChannel::new());
    let services = Arc::new(HttpContentServices::new(
        config.weather_api_key.clone(),
        config.translate_api_key.clone(),
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        CommandTable::builtin(),
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&channel),
        services,
    ));

    let engine = Arc::new(Engine::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&channel),
        dispatcher,
    ));

    // ── Background sweeps ────────────────────────────────────────────────
    let sched = Arc::new(Scheduler::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&channel),
    ));
    let sweeps = scheduler::spawn_all(sched);

    let engine_task = tokio::spawn(engine.run());

    tokio::select! {
        result = engine_task => {
            match result {
                Ok(Ok(())) => tracing::info!("Engine stopped"),
                Ok(Err(e)) => tracing::error!("Engine failed: {e}"),
                Err(e) => tracing::error!("Engine task panicked: {e}"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    sweeps.shutdown();
    channel.shutdown().await?;
    Ok(())
}
