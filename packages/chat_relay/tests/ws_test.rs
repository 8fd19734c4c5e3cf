//! End-to-end tests: a real relay on a random port, real websocket clients.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chat_relay::hooks::RecordingHook;
use chat_relay::{ChatHub, RelayState, create_routes};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the relay on a random port and return its hub and address.
async fn start_test_server(hub: ChatHub) -> (Arc<ChatHub>, SocketAddr) {
    let hub = Arc::new(hub);
    let app = create_routes(RelayState { hub: hub.clone() });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (hub, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("websocket connect failed");
    ws
}

async fn send(client: &mut Client, text: &str) {
    client.send(Message::text(text)).await.unwrap();
}

/// Next text frame, skipping control frames.
async fn recv_text(client: &mut Client) -> String {
    timeout(TEST_TIMEOUT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
                Some(Ok(_)) => continue,
                other => panic!("expected text frame, got {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for text frame")
}

/// Assert no text frame arrives within a short window.
async fn assert_silent(client: &mut Client) {
    if let Ok(Some(Ok(Message::Text(text)))) =
        timeout(Duration::from_millis(200), client.next()).await
    {
        panic!("unexpected frame: {}", text);
    }
}

async fn wait_for_members(hub: &ChatHub, n: usize) {
    timeout(TEST_TIMEOUT, async {
        while hub.registry().len().await != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry never reached expected size");
}

#[tokio::test]
async fn test_message_reaches_all_clients_including_sender() {
    let (hub, addr) = start_test_server(ChatHub::default()).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    let mut carol = connect(addr).await;
    wait_for_members(&hub, 3).await;

    send(&mut alice, "Alice").await;
    send(&mut alice, "hello").await;

    assert_eq!(recv_text(&mut alice).await, "Alice: hello");
    assert_eq!(recv_text(&mut bob).await, "Alice: hello");
    assert_eq!(recv_text(&mut carol).await, "Alice: hello");
}

#[tokio::test]
async fn test_name_table_records_client_ip() {
    let (hub, addr) = start_test_server(ChatHub::default()).await;
    let mut alice = connect(addr).await;

    send(&mut alice, "  Alice  ").await;
    send(&mut alice, "ping").await;
    assert_eq!(recv_text(&mut alice).await, "Alice: ping");

    assert_eq!(
        hub.registry().lookup_name("Alice").await.as_deref(),
        Some("127.0.0.1")
    );
}

#[tokio::test]
async fn test_closed_client_no_longer_receives() {
    let (hub, addr) = start_test_server(ChatHub::default()).await;
    let mut bob = connect(addr).await;
    let mut carol = connect(addr).await;
    wait_for_members(&hub, 2).await;

    send(&mut bob, "Bob").await;
    bob.close(None).await.unwrap();
    wait_for_members(&hub, 1).await;

    send(&mut carol, "Carol").await;
    send(&mut carol, "hi").await;
    assert_eq!(recv_text(&mut carol).await, "Carol: hi");
}

#[tokio::test]
async fn test_dropped_connection_does_not_disturb_others() {
    let (hub, addr) = start_test_server(ChatHub::default()).await;
    let dropped = connect(addr).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    wait_for_members(&hub, 3).await;

    // No close handshake, just gone
    drop(dropped);
    send(&mut alice, "Alice").await;
    send(&mut alice, "anyone?").await;

    assert_eq!(recv_text(&mut alice).await, "Alice: anyone?");
    assert_eq!(recv_text(&mut bob).await, "Alice: anyone?");
    wait_for_members(&hub, 2).await;
}

#[tokio::test]
async fn test_empty_name_prefixes_with_colon() {
    let (hub, addr) = start_test_server(ChatHub::default()).await;
    let mut anon = connect(addr).await;
    let mut other = connect(addr).await;
    wait_for_members(&hub, 2).await;

    send(&mut anon, "").await;
    send(&mut anon, "who am I").await;

    assert_eq!(recv_text(&mut anon).await, ": who am I");
    assert_eq!(recv_text(&mut other).await, ": who am I");
}

#[tokio::test]
async fn test_name_frame_is_not_broadcast() {
    let (hub, addr) = start_test_server(ChatHub::default()).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    wait_for_members(&hub, 2).await;

    send(&mut alice, "Alice").await;
    assert_silent(&mut bob).await;
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_per_sender_order_is_preserved() {
    let (hub, addr) = start_test_server(ChatHub::default()).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    wait_for_members(&hub, 2).await;

    send(&mut alice, "Alice").await;
    for i in 0..50 {
        send(&mut alice, &format!("m{}", i)).await;
    }
    for i in 0..50 {
        assert_eq!(recv_text(&mut bob).await, format!("Alice: m{}", i));
    }
}

#[tokio::test]
async fn test_hook_receives_messages() {
    let hook = Arc::new(RecordingHook::new());
    let (hub, addr) = start_test_server(ChatHub::default().with_hook(hook.clone())).await;
    let mut alice = connect(addr).await;
    wait_for_members(&hub, 1).await;

    send(&mut alice, "Alice").await;
    send(&mut alice, "first").await;
    send(&mut alice, "second").await;
    assert_eq!(recv_text(&mut alice).await, "Alice: first");
    assert_eq!(recv_text(&mut alice).await, "Alice: second");

    assert_eq!(
        hook.messages(),
        vec![
            ("Alice".to_string(), "first".to_string()),
            ("Alice".to_string(), "second".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_health_reports_connections_and_metrics() {
    let (hub, addr) = start_test_server(ChatHub::default()).await;
    let mut alice = connect(addr).await;
    let _bob = connect(addr).await;
    wait_for_members(&hub, 2).await;

    send(&mut alice, "Alice").await;
    send(&mut alice, "hello").await;
    assert_eq!(recv_text(&mut alice).await, "Alice: hello");

    let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 2);
    assert_eq!(body["metrics"]["connections"]["total"], 2);
    assert_eq!(body["metrics"]["messages"]["received"], 1);
    assert_eq!(body["metrics"]["messages"]["broadcasts"], 1);
}
