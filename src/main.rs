use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use nats_es_bridge::config::{BridgeConfig, Cli};
use nats_es_bridge::coordinator::{CoordinatorOptions, FlushCoordinator};
use nats_es_bridge::ingress::{self, PumpExit};
use nats_es_bridge::nats_connection;
use nats_es_bridge::sink::{BulkSink, DryRunSink, ElasticsearchSink};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = BridgeConfig::resolve(Cli::parse())?;
    tracing::info!(
        bus = %nats_connection::redact(&config.bus_servers),
        subject = %config.subject,
        store = %config.store_url,
        index = %config.index,
        threshold = config.threshold,
        dry_run = config.dry_run,
        "starting bridge"
    );

    let sink: Arc<dyn BulkSink> = if config.dry_run {
        Arc::new(DryRunSink::new())
    } else {
        Arc::new(ElasticsearchSink::new(&config.store_url()?, config.flush_timeout)?)
    };

    let coordinator = FlushCoordinator::new(
        CoordinatorOptions::builder()
            .destination(config.destination())
            .sink(sink)
            .threshold(config.threshold)
            .flush_timeout(config.flush_timeout)
            .build(),
    );
    tracing::info!(sink = %coordinator.sink_name(), "flush coordinator ready");

    // Create a NATS connection
    let nc = nats_connection::connect(&config.bus_servers).await?;
    let subscriber = nats_connection::subscribe(&nc, &config.subject).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    tracing::info!("bridge running, press Ctrl+C to stop");
    let (received, exit) =
        ingress::pump(ingress::from_subscriber(subscriber), &coordinator, shutdown).await;
    if exit == PumpExit::StreamClosed {
        tracing::warn!("NATS subscription ended unexpectedly");
    }

    coordinator.close().await;
    tracing::info!(received, "bridge stopped");

    Ok(())
}
