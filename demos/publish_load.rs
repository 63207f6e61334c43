use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, error, info};

use nats_es_bridge::nats_connection;

/// Publishes synthetic sensor readings so a running bridge has something to batch.
///
/// Usage: `cargo run --example publish_load -- [nats_url] [messages] [interval_ms]`
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();
    info!("Starting publish_load demo");

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "nats://localhost:4222".to_string());
    let messages: u64 = args.next().map(|n| n.parse()).transpose()?.unwrap_or(10_000);
    let interval = Duration::from_millis(args.next().map(|n| n.parse()).transpose()?.unwrap_or(1));

    debug!("Connecting to NATS server...");
    let nc = nats_connection::connect(&url).await?;

    let rooms = ["kitchen", "hall", "garage", "attic"];
    for i in 0..messages {
        let room = rooms[(i % rooms.len() as u64) as usize];
        let subject = format!("sensors.{}.temperature", room);
        let payload = format!("{{\"seq\":{},\"celsius\":{:.1}}}", i, 18.0 + (i % 70) as f64 / 10.0);

        if let Err(e) = nc.publish(subject, payload.into()).await {
            error!("Failed to publish message: {}", e);
        }
        if i % 1_000 == 0 {
            info!("Published {} messages", i);
        }
        sleep(interval).await;
    }

    nc.flush().await?;
    info!("Publisher finished after {} messages.", messages);

    Ok(())
}
