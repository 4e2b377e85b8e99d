use futures::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

mod common;

use common::{TestServer, TestUser};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn connect(server: &TestServer, access_token: &str) -> Socket {
    // ---
    let (socket, _) = connect_async(server.ws_url(access_token))
        .await
        .expect("WebSocket handshake");

    // Registration happens after the upgrade completes server-side.
    sleep(Duration::from_millis(100)).await;
    socket
}

fn frame(from: &TestUser, to: &TestUser, body: &str, timestamp: &str) -> Value {
    // ---
    json!({
        "sender_username": from.username,
        "receiver_username": to.username,
        "encrypted_message": body,
        "message_hash": format!("hash-of-{body}"),
        "signature": { "r": "0a", "s": "0b" },
        "timestamp": timestamp,
    })
}

async fn send(socket: &mut Socket, frame: &Value) {
    // ---
    socket
        .send(Message::text(frame.to_string()))
        .await
        .expect("send frame");
}

/// Next text frame as JSON, or `None` if nothing arrives in time.
async fn recv(socket: &mut Socket) -> Option<Value> {
    // ---
    loop {
        let next = timeout(RECV_TIMEOUT, socket.next()).await.ok()??;
        match next.ok()? {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

async fn history(server: &TestServer, access_token: &str, peer: &TestUser) -> Vec<Value> {
    // ---
    let body: Value = server
        .client
        .get(server.url(&format!("/api/protected/history/{}", peer.username)))
        .bearer_auth(access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["data"].as_array().cloned().unwrap_or_default()
}

#[tokio::test]
async fn message_is_persisted_then_delivered_to_both_sides() {
    // ---
    let server = TestServer::new().await;
    let alice = TestUser::new("alice");
    let bob = TestUser::new("bob");
    let alice_session = alice.sign_up_and_login(&server).await;
    let bob_session = bob.sign_up_and_login(&server).await;

    let mut alice_ws = connect(&server, &alice_session.access_token).await;
    let mut bob_ws = connect(&server, &bob_session.access_token).await;

    send(
        &mut alice_ws,
        &frame(&alice, &bob, "ciphertext-1", "2025-06-01T10:00:00Z"),
    )
    .await;

    let delivered = recv(&mut bob_ws).await.expect("bob receives the frame");
    assert_eq!(delivered["sender_username"], alice.username.as_str());
    assert_eq!(delivered["receiver_username"], bob.username.as_str());
    assert_eq!(delivered["encrypted_message"], "ciphertext-1");
    assert_eq!(delivered["timestamp"], "2025-06-01T10:00:00Z");
    let id = delivered["id"].as_str().expect("server-assigned id").to_string();

    let echo = recv(&mut alice_ws).await.expect("sender receives its echo");
    assert_eq!(echo["id"], id.as_str());

    let stored = history(&server, &bob_session.access_token, &alice).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["id"], id.as_str());
    assert_eq!(stored[0]["encrypted_message"], "ciphertext-1");
}

#[tokio::test]
async fn offline_receiver_still_gets_history() {
    // ---
    let server = TestServer::new().await;
    let alice = TestUser::new("alice");
    let bob = TestUser::new("bob");
    let alice_session = alice.sign_up_and_login(&server).await;
    let bob_session = bob.sign_up_and_login(&server).await;

    let mut alice_ws = connect(&server, &alice_session.access_token).await;
    send(
        &mut alice_ws,
        &frame(&alice, &bob, "while-you-were-out", "2025-06-01T10:00:00Z"),
    )
    .await;
    assert!(recv(&mut alice_ws).await.is_some(), "echo still arrives");

    let stored = history(&server, &bob_session.access_token, &alice).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["encrypted_message"], "while-you-were-out");
}

#[tokio::test]
async fn history_is_ordered_by_timestamp() {
    // ---
    let server = TestServer::new().await;
    let alice = TestUser::new("alice");
    let bob = TestUser::new("bob");
    let alice_session = alice.sign_up_and_login(&server).await;
    let bob_session = bob.sign_up_and_login(&server).await;

    let mut alice_ws = connect(&server, &alice_session.access_token).await;
    let mut bob_ws = connect(&server, &bob_session.access_token).await;

    // Each echo arrives only after its message was persisted.
    send(&mut alice_ws, &frame(&alice, &bob, "second", "2025-06-01T10:00:02Z")).await;
    recv(&mut alice_ws).await.expect("echo");
    send(&mut bob_ws, &frame(&bob, &alice, "first", "2025-06-01T10:00:01Z")).await;
    recv(&mut bob_ws).await.expect("echo");
    send(&mut alice_ws, &frame(&alice, &bob, "third", "2025-06-01T10:00:03Z")).await;
    recv(&mut alice_ws).await.expect("echo");

    let stored = history(&server, &alice_session.access_token, &bob).await;
    let bodies: Vec<&str> = stored
        .iter()
        .map(|m| m["encrypted_message"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, ["first", "second", "third"]);
}

#[tokio::test]
async fn spoofed_and_malformed_frames_are_dropped_without_closing() {
    // ---
    let server = TestServer::new().await;
    let alice = TestUser::new("alice");
    let bob = TestUser::new("bob");
    let carol = TestUser::new("carol");
    let alice_session = alice.sign_up_and_login(&server).await;
    let bob_session = bob.sign_up_and_login(&server).await;
    carol.register(&server).await;

    let mut alice_ws = connect(&server, &alice_session.access_token).await;
    let mut bob_ws = connect(&server, &bob_session.access_token).await;

    // Alice pretends to be Carol.
    send(&mut alice_ws, &frame(&carol, &bob, "spoof", "2025-06-01T10:00:00Z")).await;
    alice_ws
        .send(Message::text("{ not json"))
        .await
        .unwrap();

    // The connection survives and the next good frame goes through.
    send(&mut alice_ws, &frame(&alice, &bob, "genuine", "2025-06-01T10:00:01Z")).await;

    let delivered = recv(&mut bob_ws).await.expect("genuine frame");
    assert_eq!(delivered["encrypted_message"], "genuine");
    assert_eq!(delivered["sender_username"], alice.username.as_str());

    let with_carol = history(&server, &bob_session.access_token, &carol).await;
    assert!(with_carol.is_empty());
}

#[tokio::test]
async fn newer_connection_displaces_the_older_one() {
    // ---
    let server = TestServer::new().await;
    let alice = TestUser::new("alice");
    let bob = TestUser::new("bob");
    let alice_session = alice.sign_up_and_login(&server).await;
    let bob_session = bob.sign_up_and_login(&server).await;

    let mut bob_old = connect(&server, &bob_session.access_token).await;
    let mut bob_new = connect(&server, &bob_session.access_token).await;
    let mut alice_ws = connect(&server, &alice_session.access_token).await;

    send(&mut alice_ws, &frame(&alice, &bob, "hello", "2025-06-01T10:00:00Z")).await;

    let delivered = recv(&mut bob_new).await.expect("newest connection receives");
    assert_eq!(delivered["encrypted_message"], "hello");

    // Closing the displaced socket must not unregister the live one.
    bob_old.close(None).await.ok();
    sleep(Duration::from_millis(100)).await;

    send(&mut alice_ws, &frame(&alice, &bob, "still-there", "2025-06-01T10:00:01Z")).await;
    let delivered = recv(&mut bob_new).await.expect("still registered");
    assert_eq!(delivered["encrypted_message"], "still-there");
}

#[tokio::test]
async fn upgrade_requires_a_valid_access_token() {
    // ---
    let server = TestServer::new().await;

    for url in [
        format!("ws://{}/api/ws/chat", server.addr),
        server.ws_url("garbage"),
    ] {
        match connect_async(url).await {
            Err(WsError::Http(response)) => {
                assert_eq!(response.status().as_u16(), StatusCode::UNAUTHORIZED.as_u16());
            }
            Err(other) => panic!("unexpected handshake error: {other}"),
            Ok(_) => panic!("handshake should be refused"),
        }
    }
}
