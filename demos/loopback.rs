//! In-process loopback host.
//!
//! Demonstrates:
//! - Calls buffered before a bridge exists, flushed on lazy bind
//! - Request/response with raw and JSON decoding
//! - A streaming subscription ended with `die`
//! - Native-originated requests parsed and re-emitted as events
//!
//! Usage:
//!   cargo run --example loopback
//!   cargo run --example loopback -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hostlink::{ChannelBridge, Correlator, Envelope, InboundRequest};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const NATIVE_SEEK: &str = r#"{"id":"n1","method":"Player@seek","params":{"position":12.5}}"#;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|arg| arg == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    println!("=== Loopback Host ===\n");

    let link = Correlator::new();
    let (bridge, outbound) = ChannelBridge::new();
    tokio::spawn(host(link.clone(), outbound));

    // ========================================================================
    // Buffered Calls
    // ========================================================================

    println!("[1] Calling before any bridge is bound...");
    link.run("AppService@hello", json!({ "from": "script" }));
    let sum = link.call_json("Math@add", json!({ "a": 2, "b": 3 }));
    println!("    queued: {}", link.queued_count());

    link.lazy_bind_bridge_after(Arc::new(bridge), Duration::from_millis(100))?;
    let sum = sum
        .timeout(Duration::from_secs(1))
        .await
        .context("Math@add")?;
    println!("    ✓ 2 + 3 = {}\n", sum.unwrap_or(Value::Null));

    // ========================================================================
    // Raw Replies
    // ========================================================================

    println!("[2] Raw reply...");
    let echoed = link.call("Echo@say", json!("hello")).await?;
    println!("    ✓ echoed: {echoed}\n");

    // ========================================================================
    // Streaming
    // ========================================================================

    println!("[3] Subscribing to ticks...");
    let (ticks_tx, mut ticks_rx) = mpsc::unbounded_channel();
    let subscription = link.live_json("Clock@ticks", json!({ "count": 5 }), move |tick| {
        let _ = ticks_tx.send(tick);
    });

    for _ in 0..3 {
        let tick = ticks_rx.recv().await.context("tick stream closed")?;
        println!("    tick: {}", tick.unwrap_or(Value::Null));
    }
    link.die(subscription.as_str());
    println!("    ✓ unsubscribed, pending jobs: {}\n", link.pending_count());

    // ========================================================================
    // Native-Originated Requests
    // ========================================================================

    println!("[4] Native request...");
    let (seek_tx, mut seek_rx) = mpsc::unbounded_channel();
    link.on("Player@seek", move |params| {
        let _ = seek_tx.send(params.clone());
    });

    let request = InboundRequest::parse(NATIVE_SEEK);
    let event = format!(
        "{}@{}",
        request.target_name.as_deref().unwrap_or_default(),
        request.target_method.as_deref().unwrap_or_default()
    );
    link.emit(&event, request.params.as_ref().unwrap_or(&Value::Null));

    let params = seek_rx.recv().await.context("seek listener dropped")?;
    println!("    ✓ seek to {}\n", params["position"]);

    link.destroy();
    println!("=== Done ===");
    Ok(())
}

// ============================================================================
// Host
// ============================================================================

/// Executes envelopes and answers through `dequeue`.
async fn host(link: Correlator, mut outbound: mpsc::UnboundedReceiver<String>) {
    while let Some(message) = outbound.recv().await {
        let Ok(envelope) = Envelope::from_json(&message) else {
            continue;
        };
        println!("    host <- {message}");

        let Some(id) = envelope.id.clone() else {
            continue;
        };

        match envelope.method.as_str() {
            "Math@add" => {
                let a = envelope.params["a"].as_i64().unwrap_or_default();
                let b = envelope.params["b"].as_i64().unwrap_or_default();
                link.dequeue(id.as_str(), json!(a + b));
            }
            "Echo@say" => {
                let text = envelope.params.as_str().unwrap_or_default().to_string();
                link.dequeue(id.as_str(), text);
            }
            "Clock@ticks" => {
                let count = envelope.params["count"].as_u64().unwrap_or_default();
                let link = link.clone();
                tokio::spawn(async move {
                    for n in 0..count {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        link.dequeue(id.as_str(), n.to_string());
                    }
                });
            }
            _ => {}
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug { "hostlink=trace" } else { "hostlink=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
