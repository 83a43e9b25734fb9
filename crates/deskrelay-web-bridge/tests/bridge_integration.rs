//! End-to-end tests for the WebSocket bridge.
//!
//! A plain `TcpListener` stands in for the relay.  Each test starts the
//! bridge on an ephemeral port, connects a real WebSocket client, and checks
//! the bytes on both sides.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use deskrelay_core::protocol::codec::{encode_resolution, encode_stream_frame};
use deskrelay_web_bridge::application::browser_text_to_wire;
use deskrelay_web_bridge::domain::BridgeConfig;
use deskrelay_web_bridge::infrastructure::serve;

const WAIT: Duration = Duration::from_secs(3);

type Browser = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Harness {
    ws_addr: SocketAddr,
    relay: TcpListener,
    running: Arc<AtomicBool>,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

async fn start_bridge(send_handshake: bool, max_frame_len: u32) -> Harness {
    let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = ws_listener.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));

    let config = BridgeConfig {
        ws_bind_addr: ws_addr,
        relay_addr: relay.local_addr().unwrap(),
        send_handshake,
        max_frame_len,
    };
    tokio::spawn(serve(ws_listener, config, Arc::clone(&running)));

    Harness {
        ws_addr,
        relay,
        running,
    }
}

/// Connects a browser and accepts the bridge's matching relay connection.
async fn open_session(harness: &Harness) -> (Browser, TcpStream) {
    let (browser, _) = timeout(WAIT, connect_async(format!("ws://{}", harness.ws_addr)))
        .await
        .expect("timed out connecting to the bridge")
        .unwrap();
    let (relay_side, _) = timeout(WAIT, harness.relay.accept())
        .await
        .expect("bridge never connected to the relay")
        .unwrap();
    (browser, relay_side)
}

async fn read_exact_n(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for relay bytes")
        .unwrap();
    buf
}

async fn next_browser_message(browser: &mut Browser) -> Message {
    timeout(WAIT, browser.next())
        .await
        .expect("timed out waiting for a browser message")
        .expect("WebSocket ended early")
        .unwrap()
}

async fn expect_browser_closed(browser: &mut Browser) {
    loop {
        match timeout(WAIT, browser.next())
            .await
            .expect("WebSocket was not closed")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(other)) => panic!("expected close, got {other:?}"),
        }
    }
}

async fn expect_relay_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let result = timeout(WAIT, stream.read(&mut buf))
        .await
        .expect("relay connection was not closed");
    match result {
        Ok(0) | Err(_) => {}
        Ok(n) => panic!("expected close, got {n} bytes: {:?}", &buf[..n]),
    }
}

// ── Browser → relay ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_opens_with_client_token_then_forwards_mouse_move() {
    // Arrange
    let harness = start_bridge(true, 1024).await;
    let (mut browser, mut relay) = open_session(&harness).await;

    // Act
    browser
        .send(Message::Text(
            r#"{"type":"mouse_move","x":120,"y":80}"#.to_string(),
        ))
        .await
        .unwrap();

    // Assert: role token first, then exactly one wire frame
    assert_eq!(read_exact_n(&mut relay, 6).await, b"client");
    assert_eq!(
        read_exact_n(&mut relay, 11).await,
        b"\x01\x00\x00\x00\x06120,80"
    );
}

#[tokio::test]
async fn test_direct_mode_sends_frames_without_token() {
    let harness = start_bridge(false, 1024).await;
    let (mut browser, mut relay) = open_session(&harness).await;

    browser
        .send(Message::Text(
            r#"{"type":"control_state","state":true}"#.to_string(),
        ))
        .await
        .unwrap();

    let expected = browser_text_to_wire(r#"{"type":"control_state","state":true}"#).unwrap();
    assert_eq!(expected[0], 0x07);
    assert_eq!(read_exact_n(&mut relay, expected.len()).await, expected);
}

#[tokio::test]
async fn test_invalid_message_is_dropped_and_session_continues() {
    // Arrange
    let harness = start_bridge(true, 1024).await;
    let (mut browser, mut relay) = open_session(&harness).await;
    assert_eq!(read_exact_n(&mut relay, 6).await, b"client");

    // Act: garbage, an unknown type and a missing field, then a valid click
    for text in [
        "not json at all",
        r#"{"type":"teleport","x":1}"#,
        r#"{"type":"mouse_down","x":5}"#,
        r#"{"type":"mouse_down","x":5,"y":6,"button":1}"#,
    ] {
        browser.send(Message::Text(text.to_string())).await.unwrap();
    }

    // Assert: only the valid event reaches the relay
    let expected = browser_text_to_wire(r#"{"type":"mouse_down","x":5,"y":6,"button":1}"#).unwrap();
    assert_eq!(read_exact_n(&mut relay, expected.len()).await, expected);
    assert_eq!(expected[0], 0x04);
}

#[tokio::test]
async fn test_browser_binary_frames_are_ignored() {
    let harness = start_bridge(true, 1024).await;
    let (mut browser, mut relay) = open_session(&harness).await;
    assert_eq!(read_exact_n(&mut relay, 6).await, b"client");

    browser.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    browser
        .send(Message::Text(r#"{"type":"mouse_up","x":1,"y":2,"button":3}"#.to_string()))
        .await
        .unwrap();

    let expected = browser_text_to_wire(r#"{"type":"mouse_up","x":1,"y":2,"button":3}"#).unwrap();
    assert_eq!(read_exact_n(&mut relay, expected.len()).await, expected);
}

// ── Relay → browser ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_resolution_frame_reaches_browser_as_json() {
    // Arrange
    let harness = start_bridge(true, 1024).await;
    let (mut browser, mut relay) = open_session(&harness).await;

    // Act
    relay
        .write_all(&encode_stream_frame(&encode_resolution(1920, 1080)).unwrap())
        .await
        .unwrap();

    // Assert
    let Message::Text(text) = next_browser_message(&mut browser).await else {
        panic!("expected a text message");
    };
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"type": "resolution", "width": 1920, "height": 1080})
    );
}

#[tokio::test]
async fn test_image_frames_reach_browser_as_binary_in_order() {
    // Arrange: two frames written in one burst, one split across writes
    let harness = start_bridge(true, 1024).await;
    let (mut browser, mut relay) = open_session(&harness).await;
    let mut burst = encode_stream_frame(b"\xFF\xD8first").unwrap();
    let second = encode_stream_frame(b"\xFF\xD8second").unwrap();
    burst.extend_from_slice(&second[..3]);

    // Act
    relay.write_all(&burst).await.unwrap();
    relay.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    relay.write_all(&second[3..]).await.unwrap();

    // Assert
    assert_eq!(
        next_browser_message(&mut browser).await,
        Message::Binary(b"\xFF\xD8first".to_vec())
    );
    assert_eq!(
        next_browser_message(&mut browser).await,
        Message::Binary(b"\xFF\xD8second".to_vec())
    );
}

// ── Teardown ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_relay_close_closes_browser() {
    let harness = start_bridge(true, 1024).await;
    let (mut browser, relay) = open_session(&harness).await;

    drop(relay);

    expect_browser_closed(&mut browser).await;
}

#[tokio::test]
async fn test_browser_close_closes_relay_connection() {
    // Arrange
    let harness = start_bridge(true, 1024).await;
    let (mut browser, mut relay) = open_session(&harness).await;
    assert_eq!(read_exact_n(&mut relay, 6).await, b"client");

    // Act
    browser.close(None).await.unwrap();

    // Assert
    expect_relay_closed(&mut relay).await;
}

#[tokio::test]
async fn test_oversized_frame_closes_session() {
    // Arrange: a frame header announcing more than the 16-byte limit
    let harness = start_bridge(true, 16).await;
    let (mut browser, mut relay) = open_session(&harness).await;
    assert_eq!(read_exact_n(&mut relay, 6).await, b"client");

    // Act
    relay.write_all(&1000u32.to_be_bytes()).await.unwrap();

    // Assert: both sides are torn down
    expect_browser_closed(&mut browser).await;
    expect_relay_closed(&mut relay).await;
}

#[tokio::test]
async fn test_sessions_get_independent_relay_connections() {
    let harness = start_bridge(true, 1024).await;
    let (mut first_browser, mut first_relay) = open_session(&harness).await;
    let (_second_browser, mut second_relay) = open_session(&harness).await;
    assert_eq!(read_exact_n(&mut first_relay, 6).await, b"client");
    assert_eq!(read_exact_n(&mut second_relay, 6).await, b"client");

    second_relay
        .write_all(&encode_stream_frame(b"only-second").unwrap())
        .await
        .unwrap();
    first_relay
        .write_all(&encode_stream_frame(b"only-first").unwrap())
        .await
        .unwrap();

    assert_eq!(
        next_browser_message(&mut first_browser).await,
        Message::Binary(b"only-first".to_vec())
    );
}
