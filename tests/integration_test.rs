use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_stream::wrappers::ReceiverStream;

use nats_es_bridge::batch::Destination;
use nats_es_bridge::coordinator::{CoordinatorOptions, FlushCoordinator};
use nats_es_bridge::ingress::{self, InboundMessage, PumpExit};
use nats_es_bridge::nats_connection;
use nats_es_bridge::sink::InMemorySink;
use nats_es_bridge::sink::elasticsearch::render_bulk_body;

#[tokio::test]
async fn test_stream_to_sink_without_loss() -> Result<()> {
    let sink = Arc::new(InMemorySink::new());
    let coordinator = FlushCoordinator::new(
        CoordinatorOptions::builder()
            .destination(Destination::new("mqtt").with_doc_type("eclipse"))
            .sink(sink.clone())
            .threshold(4 * 1024)
            .build(),
    );

    let (tx, rx) = mpsc::channel(64);
    let producer = tokio::spawn(async move {
        for i in 0..500 {
            let message = InboundMessage::new(format!("sensors.{}", i % 7), format!("{{\"reading\":{}}}", i));
            if tx.send(message).await.is_err() {
                break;
            }
        }
    });

    let (received, exit) =
        ingress::pump(ReceiverStream::new(rx), &coordinator, std::future::pending()).await;
    producer.await?;
    coordinator.close().await;

    assert_eq!(500, received);
    assert_eq!(PumpExit::StreamClosed, exit);

    let batches = sink.batches().await;
    assert!(batches.len() > 1, "threshold should split the stream");
    for batch in &batches[..batches.len() - 1] {
        assert!(batch.estimated_size() >= 4 * 1024);
    }

    let payloads: Vec<String> = sink
        .records()
        .await
        .iter()
        .map(|r| String::from_utf8(r.payload().to_vec()).unwrap())
        .collect();
    let expected: Vec<String> = (0..500).map(|i| format!("{{\"reading\":{}}}", i)).collect();
    assert_eq!(expected, payloads);

    let body = String::from_utf8(render_bulk_body(&batches[0])?)?;
    let first_lines: Vec<&str> = body.lines().take(2).collect();
    assert_eq!(r#"{"create":{"_index":"mqtt","_type":"eclipse"}}"#, first_lines[0]);
    assert!(first_lines[1].contains(r#""message":"{\"reading\":0}""#));
    assert!(first_lines[1].contains(r#""topic":"sensors.0""#));

    Ok(())
}

#[tokio::test]
async fn test_shutdown_flushes_buffered_records() -> Result<()> {
    let sink = Arc::new(InMemorySink::new());
    let coordinator = FlushCoordinator::new(
        CoordinatorOptions::builder()
            .destination(Destination::new("nats"))
            .sink(sink.clone())
            .build(),
    );

    let (tx, rx) = mpsc::channel(8);
    for i in 0..3 {
        tx.send(InboundMessage::new("test.data", format!("{},apple", i))).await?;
    }

    let shutdown = async {
        sleep(Duration::from_millis(100)).await;
    };
    let (received, exit) = ingress::pump(ReceiverStream::new(rx), &coordinator, shutdown).await;

    assert_eq!(3, received);
    assert_eq!(PumpExit::Shutdown, exit);
    // far below the default threshold, nothing written yet
    assert!(sink.batches().await.is_empty());

    coordinator.close().await;
    assert_eq!(3, sink.records().await.len());

    drop(tx);
    Ok(())
}

#[tokio::test]
#[ignore = "needs a NATS server on localhost:4222"]
async fn test_nats_integration() -> Result<()> {
    // Connect to NATS
    let client = nats_connection::connect("nats://localhost:4222").await?;
    let subscriber = nats_connection::subscribe(&client, "test.>").await?;

    let sink = Arc::new(InMemorySink::new());
    let coordinator = FlushCoordinator::new(
        CoordinatorOptions::builder()
            .destination(Destination::new("nats"))
            .sink(sink.clone())
            .build(),
    );

    let publisher = client.clone();
    tokio::spawn(async move {
        for d in ["1,apple", "2,banana", "3,orange"] {
            let _ = publisher.publish("test.data", d.as_bytes().to_vec().into()).await;
            sleep(Duration::from_millis(10)).await;
        }
        let _ = publisher.flush().await;
    });

    let shutdown = sleep(Duration::from_secs(1));
    let (received, _) =
        ingress::pump(ingress::from_subscriber(subscriber), &coordinator, shutdown).await;
    coordinator.close().await;

    assert_eq!(3, received);
    let payloads: Vec<String> = sink
        .records()
        .await
        .iter()
        .map(|r| String::from_utf8(r.payload().to_vec()).unwrap())
        .collect();
    assert_eq!(vec!["1,apple", "2,banana", "3,orange"], payloads);

    Ok(())
}
