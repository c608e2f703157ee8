//! Echo - a client and a responder talking over local TCP.
//!
//! This example demonstrates:
//! - Serving registered functions with a `Responder`
//! - Connecting a `Client` with the builder pattern
//! - Awaited calls, callback calls, remote errors
//! - The stop handshake
//!
//! Run with `RUST_LOG=beatwire=debug cargo run --example echo` to see every
//! beat.

use std::time::Duration;

use beatwire::callee::Responder;
use beatwire::transport::Listener;
use beatwire::Client;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beatwire=info")),
        )
        .init();

    let listener = Listener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let responder = Responder::builder()
            .handle("shout", |text: String| async move { Ok(text.to_uppercase()) })
            .beat_interval(Duration::from_millis(20))
            .debug(true)
            .accept(&listener)
            .await?;
        responder.run().await
    });

    let mut client = Client::builder()
        .host(addr.ip().to_string())
        .port(addr.port())
        .timeout_ms(1000)
        .announce_stop(true)
        .debug(true)
        .connect()
        .await?;
    client.start()?;

    let echoed = client.call("echo", "Hello").await?;
    println!("echo -> {}", echoed);

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    client.invoke_with("shout", "quiet please", move |value| {
        println!("shout -> {}", value);
        let _ = done_tx.send(());
    });
    done_rx.await?;

    match client.call("whisper", "hello").await {
        Ok(value) => println!("whisper -> {}", value),
        Err(e) => println!("whisper failed: {}", e),
    }

    client.stop().await?;
    client.wait().await?;

    let beats = server.await??;
    println!("responder served {} beats", beats);
    Ok(())
}
