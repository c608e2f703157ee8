//! Integration tests for beatwire.
//!
//! These tests run a client against a responder over real transports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beatwire::callee::Responder;
use beatwire::transport::{Channel, Listener};
use beatwire::{BeatwireError, CallError, Client, ConnectionState};

const BEAT_INTERVAL: Duration = Duration::from_millis(5);

/// Bind a responder on an ephemeral port and serve one connection.
async fn spawn_tcp_responder() -> (
    std::net::SocketAddr,
    tokio::task::JoinHandle<beatwire::Result<u64>>,
) {
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let responder = Responder::builder()
            .handle("reverse", |arg: String| async move {
                Ok(arg.chars().rev().collect())
            })
            .handle("fail", |arg: String| async move { Err(arg) })
            .beat_interval(BEAT_INTERVAL)
            .accept(&listener)
            .await?;
        responder.run().await
    });

    (addr, task)
}

async fn connect(addr: std::net::SocketAddr) -> Client {
    let mut client = Client::builder()
        .host(addr.ip().to_string())
        .port(addr.port())
        .timeout_ms(1000)
        .announce_stop(true)
        .connect()
        .await
        .unwrap();
    client.start().unwrap();
    client
}

/// Echo over TCP returns the argument unmodified.
#[tokio::test]
async fn test_tcp_echo() {
    let (addr, _server) = spawn_tcp_responder().await;
    let client = connect(addr).await;

    assert_eq!(client.call("echo", "Hello").await, Ok("Hello".to_string()));
    assert_eq!(
        client.call("echo", "  spaced ::: value ").await,
        Ok("  spaced ::: value ".to_string())
    );
}

/// Registered functions and their errors reach the caller.
#[tokio::test]
async fn test_tcp_registered_functions() {
    let (addr, _server) = spawn_tcp_responder().await;
    let client = connect(addr).await;

    assert_eq!(
        client.call("reverse", "beat").await,
        Ok("taeb".to_string())
    );

    let err = client.call("fail", "boom").await.unwrap_err();
    assert_eq!(err, CallError::Remote("Malformed packet: 'boom'".to_string()));

    // The cycle survives a remote error.
    assert_eq!(client.call("echo", "again").await, Ok("again".to_string()));
}

/// Unknown functions surface as remote errors.
#[tokio::test]
async fn test_tcp_unknown_function() {
    let (addr, _server) = spawn_tcp_responder().await;
    let client = connect(addr).await;

    let err = client.call("missing", "x").await.unwrap_err();
    assert!(matches!(err, CallError::Remote(ref e) if e.contains("unknown function")));
    assert_eq!(client.state(), ConnectionState::Running);
}

/// Sequential calls are each delivered exactly once.
#[tokio::test]
async fn test_tcp_many_calls() {
    let (addr, _server) = spawn_tcp_responder().await;
    let client = connect(addr).await;

    for i in 0..20 {
        let arg = format!("call-{}", i);
        assert_eq!(client.call("echo", &arg).await, Ok(arg));
    }
}

/// stop() completes the handshake on both sides.
#[tokio::test]
async fn test_tcp_clean_stop() {
    let (addr, server) = spawn_tcp_responder().await;
    let client = connect(addr).await;

    assert_eq!(client.call("echo", "before").await, Ok("before".to_string()));
    client.stop().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Stopped);

    let late = client.call("echo", "after").await;
    assert_eq!(late, Err(CallError::ConnectionLost));

    assert!(client.wait().await.is_ok());
    let beats = server.await.unwrap().unwrap();
    assert!(beats >= 2);
}

/// Without announcing STOP the responder never sends STOPPED.
#[tokio::test]
async fn test_tcp_stop_without_announce_times_out() {
    let (addr, _server) = spawn_tcp_responder().await;
    let mut client = Client::builder()
        .host(addr.ip().to_string())
        .port(addr.port())
        .timeout_ms(100)
        .connect()
        .await
        .unwrap();
    client.start().unwrap();

    let err = client.stop().await.unwrap_err();
    assert!(matches!(err, BeatwireError::ShutdownTimeout(_)));
    assert_eq!(client.state(), ConnectionState::Failed);
    assert!(matches!(
        client.wait().await,
        Err(BeatwireError::ShutdownTimeout(_))
    ));
}

/// A peer that accepts but never answers trips the liveness check once.
#[tokio::test]
async fn test_tcp_silent_peer_liveness() {
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let (mut channel, _) = listener.accept().await.unwrap();
        let mut seen = 0;
        while channel.recv().await.is_some() {
            seen += 1;
        }
        seen
    });

    let failures = Arc::new(AtomicUsize::new(0));
    let counter = failures.clone();
    let mut client = Client::builder()
        .host(addr.ip().to_string())
        .port(addr.port())
        .timeout_ms(50)
        .on_liveness_failure(move |e| {
            assert!(matches!(e, BeatwireError::LivenessTimeout(_)));
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .connect()
        .await
        .unwrap();
    client.start().unwrap();
    let reply = client.invoke("echo", "lost");

    assert!(matches!(
        client.wait().await,
        Err(BeatwireError::LivenessTimeout(_))
    ));
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(reply.await, Err(CallError::ConnectionLost));

    // One beat, then nothing after the timeout.
    assert_eq!(silent.await.unwrap(), 1);
}

/// Losing the responder mid-session is a liveness failure.
#[tokio::test]
async fn test_tcp_responder_gone() {
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut channel, _) = listener.accept().await.unwrap();
        channel.recv().await;
        channel.close().await.unwrap();
    });

    let client = connect(addr).await;
    let err = client.wait().await.unwrap_err();
    assert!(err.is_liveness_failure());
}

/// The protocol runs over any byte stream.
#[tokio::test]
async fn test_duplex_stream() {
    let (left, right) = tokio::io::duplex(4096);

    let responder = Responder::builder()
        .beat_interval(BEAT_INTERVAL)
        .serve(Channel::from_stream(right))
        .unwrap();
    let server = tokio::spawn(responder.run());

    let mut client = Client::builder()
        .timeout_ms(1000)
        .announce_stop(true)
        .with_channel(Channel::from_stream(left))
        .unwrap();
    client.start().unwrap();

    assert_eq!(client.call("echo", "Hello").await, Ok("Hello".to_string()));
    client.stop().await.unwrap();
    assert!(client.wait().await.is_ok());
    assert!(server.await.unwrap().is_ok());
}

/// In-memory pair: a second invoke before the beat replaces the first.
#[tokio::test]
async fn test_in_memory_superseded_call() {
    let (local, remote) = Channel::pair();
    let responder = Responder::builder()
        .beat_interval(Duration::from_millis(50))
        .serve(remote)
        .unwrap();
    tokio::spawn(responder.run());

    let mut client = Client::builder().with_channel(local).unwrap();
    client.start().unwrap();

    let first = client.invoke("echo", "first");
    let second = client.invoke("echo", "second");

    assert_eq!(first.await, Err(CallError::Superseded));
    assert_eq!(second.await, Ok("second".to_string()));
}
