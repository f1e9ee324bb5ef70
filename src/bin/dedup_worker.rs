use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dedup_consumer::kafka::DedupBatchConsumer;
use dedup_consumer::store::{self, ExpiredRecordReaper};
use dedup_consumer::{BatchCoordinator, Config, ConsumeStrategy, HandlerOutcome, Message, MessageHandler};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logs every message it is given; stands in for real business logic
struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, message: &Message) -> HandlerOutcome {
        info!(
            topic = %message.topic,
            tag = %message.tag,
            delivery_id = %message.delivery_id(),
            body_len = message.body.len(),
            "Consumed message"
        );
        HandlerOutcome::Success
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        application = %config.dedup.application_name,
        store = config.store.as_str(),
        dedup_enabled = config.dedup.dedup_enabled,
        "Dedup Worker starting"
    );

    let record_store = store::connect(&config).await?;

    let reaper = ExpiredRecordReaper::new(
        record_store.clone(),
        Duration::from_secs(config.worker.reap_interval_secs),
    );
    let reaper_handle = tokio::spawn(reaper.run());

    let strategy = ConsumeStrategy::from_config(&config.dedup, record_store)?;
    let coordinator = Arc::new(BatchCoordinator::new(strategy));
    let consumer = DedupBatchConsumer::new(config.kafka.clone(), coordinator)?;

    info!("Dedup Worker started, waiting for messages...");

    let handler = LoggingHandler;
    let result = tokio::select! {
        result = consumer.run(&handler) => result,
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping consumer");
            Ok(())
        }
    };

    reaper_handle.abort();

    if let Err(e) = &result {
        warn!(error = %e, "Dedup Worker stopped with error");
    }
    info!("Dedup Worker stopped");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
