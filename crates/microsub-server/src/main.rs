//! microsub-server: the storage-backed half of the ingestion engine --
//! tiered scheduling (C6), processing (C7), WebSub (C8), and webmention
//! (C9) -- running as a long-lived service.
//!
//! The Item/Feed/Channel store methods (C3-C5) are called by the
//! authenticated Microsub API surface, which is routing plumbing external
//! to this engine (see spec "Out of scope") and isn't implemented here --
//! hence `dead_code` is allowed crate-wide rather than per method.
#![allow(dead_code)]

mod api;
mod cli;
mod config;
mod db;
mod error;
mod logging;
mod prelude;
mod processor;
mod scheduler;
mod webmention;
mod websub;

use prelude::internal::*;
use prelude::*;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    logging::setup_logging(&cli, &config)?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    let config = Arc::new(config);

    match cli.mode.clone().unwrap_or_default() {
        CommandMode::Serve => serve(cli, config).await,
    }
}

async fn serve(_cli: Cli, config: Arc<Config>) -> Result<()> {
    let db = Database::new(config.database_path()).await?;
    tracing::info!("applied retention cleanup on startup");
    db.cleanup_all_on_startup(config.microsub.max_full_read_items_per_channel).await?;

    let client = reqwest::Client::new();
    let processor = Processor::new(db.clone(), client.clone(), (*config).clone());
    let scheduler = Scheduler::new(
        db.clone(),
        processor.clone(),
        config.microsub.scheduler_interval,
        config.microsub.batch_concurrency,
    );

    let cancel_token = CancellationToken::new();

    let app = api::router(api::AppState { db, processor, client, config: config.clone() });
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.bind, config.port)).await?;
    tracing::info!(bind = %config.bind, port = config.port, "microsub-server listening");

    let mut tasks = JoinSet::new();

    let server_cancel = cancel_token.clone();
    tasks.spawn(async move {
        let served = axum::serve(listener, app);
        tokio::select! {
            result = served => result.map_err(anyhow::Error::from),
            _ = server_cancel.cancelled() => Ok(()),
        }
    });

    let scheduler_cancel = cancel_token.clone();
    tasks.spawn(async move {
        scheduler.run(scheduler_cancel).await;
        Ok(())
    });

    let signal_cancel = cancel_token.clone();
    tasks.spawn(async move {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received ctrl-c, shutting down");
        signal_cancel.cancel();
        Ok(())
    });

    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(error = %err, "task failed");
                cancel_token.cancel();
            }
            Err(err) => {
                tracing::error!(error = %err, "task panicked");
                cancel_token.cancel();
            }
        }
    }

    Ok(())
}
