use std::time::{Duration, Instant};

use tokio::net::TcpListener;

use platen::channel::tcp::TcpChannel;
use platen::channel::{Channel, ChannelConfig, ChannelState};
use platen::error::TransportError;

/// A listener that accepts connections and then sits on them silently.
async fn unresponsive_peer() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("tcp://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            held.push(stream);
        }
    });
    endpoint
}

#[tokio::test]
async fn receive_timeout_is_bounded() {
    let endpoint = unresponsive_peer().await;
    let mut channel = TcpChannel::connect(&endpoint, ChannelConfig::default())
        .await
        .unwrap();

    channel
        .send(b"https://example.com", Duration::from_millis(1000))
        .await
        .unwrap();

    let start = Instant::now();
    let err = channel
        .receive(Duration::from_millis(10))
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(err.is_timeout(), "got {err:?}");
    assert!(
        elapsed < Duration::from_millis(250),
        "timeout took {elapsed:?}"
    );
}

#[tokio::test]
async fn timed_out_channel_recovers_after_reset() {
    let endpoint = unresponsive_peer().await;
    let mut channel = TcpChannel::connect(&endpoint, ChannelConfig::default())
        .await
        .unwrap();

    channel
        .send(b"first", Duration::from_millis(1000))
        .await
        .unwrap();
    channel
        .receive(Duration::from_millis(10))
        .await
        .unwrap_err();

    // the exchange is still outstanding: a new send is a violation
    assert_eq!(channel.state(), ChannelState::AwaitingReply);
    let err = channel
        .send(b"second", Duration::from_millis(1000))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ProtocolViolation(_)));

    // reset reconnects and the channel is usable again
    channel.reset().await.unwrap();
    assert_eq!(channel.state(), ChannelState::Idle);
    channel
        .send(b"second", Duration::from_millis(1000))
        .await
        .unwrap();
}

#[tokio::test]
async fn double_send_is_a_protocol_violation() {
    let endpoint = unresponsive_peer().await;
    let mut channel = TcpChannel::connect(&endpoint, ChannelConfig::default())
        .await
        .unwrap();

    channel
        .send(b"one", Duration::from_millis(1000))
        .await
        .unwrap();
    let err = channel
        .send(b"two", Duration::from_millis(1000))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ProtocolViolation(_)));
}

#[tokio::test]
async fn receive_without_a_request_is_a_protocol_violation() {
    let endpoint = unresponsive_peer().await;
    let mut channel = TcpChannel::connect(&endpoint, ChannelConfig::default())
        .await
        .unwrap();

    let err = channel
        .receive(Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ProtocolViolation(_)));
}

#[tokio::test]
async fn connecting_to_a_dead_endpoint_fails_fast() {
    // bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("tcp://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = TcpChannel::connect(&endpoint, ChannelConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Connection(_)), "got {err:?}");
}

#[tokio::test]
async fn malformed_endpoint_is_rejected_before_connecting() {
    let err = TcpChannel::connect("127.0.0.1:6660", ChannelConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Endpoint(_)));
}
