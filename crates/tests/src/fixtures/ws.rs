use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use super::test_app::TestApp;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens a socket and consumes the `connected` greeting.
pub async fn connect(app: &TestApp, token: &str) -> WsClient {
    let (mut ws, _) = connect_async(app.ws_url(token))
        .await
        .expect("Failed to connect WS");
    let greeting = next_json(&mut ws).await;
    assert_eq!(greeting["type"], "connected");
    ws
}

pub async fn send(ws: &mut WsClient, msg_type: &str, data: Value) {
    let msg = serde_json::json!({ "type": msg_type, "data": data });
    ws.send(Message::text(msg.to_string())).await.unwrap();
}

pub async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("timed out waiting for WS message")
            .expect("WS stream ended")
            .expect("WS error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Skips messages until one of type `msg_type` arrives.
pub async fn expect_event(ws: &mut WsClient, msg_type: &str) -> Value {
    loop {
        let msg = next_json(ws).await;
        if msg["type"] == msg_type {
            return msg;
        }
    }
}

/// Skips messages until one of type `msg_type` satisfies `pred`.
pub async fn expect_event_where(
    ws: &mut WsClient,
    msg_type: &str,
    pred: impl Fn(&Value) -> bool,
) -> Value {
    loop {
        let msg = expect_event(ws, msg_type).await;
        if pred(&msg["data"]) {
            return msg;
        }
    }
}

/// Asserts nothing except timer ticks arrives within a short grace period.
pub async fn expect_silence(ws: &mut WsClient) {
    let deadline = tokio::time::sleep(Duration::from_millis(150));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return,
            msg = ws.next() => {
                if let Some(Ok(Message::Text(text))) = msg {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    assert_eq!(value["type"], "session-timer-update", "unexpected message {value}");
                }
            }
        }
    }
}

/// Joins `session_id` and returns the `session-joined` snapshot.
pub async fn join(ws: &mut WsClient, session_id: &str) -> Value {
    send(ws, "join-session", serde_json::json!({ "sessionId": session_id })).await;
    expect_event(ws, "session-joined").await
}
