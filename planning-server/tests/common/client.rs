//! WebSocket test client for protocol testing
//!
//! Provides both low-level WsConnection and high-level TestClient.
//!
//! Note: Some methods may appear unused because they're only used in specific
//! test files and clippy checks each test independently.

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for an expected message
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Join URL for a room
pub fn join_url(addr: SocketAddr, room_id: &str, name: &str, game_master: bool) -> String {
    let mut url = format!("ws://{addr}/api/ws?roomId={room_id}&name={name}");
    if game_master {
        url.push_str("&gamemaster=true");
    }
    url
}

/// Low-level WebSocket connection
pub struct WsConnection {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl WsConnection {
    /// Connect to a URL, optionally sending an `Origin` header
    ///
    /// Returns the HTTP status when the server refuses the upgrade.
    pub async fn try_connect(url: &str, origin: Option<&str>) -> Result<Self, u16> {
        let mut request = url.into_client_request().unwrap();
        if let Some(origin) = origin {
            request
                .headers_mut()
                .insert("Origin", HeaderValue::from_str(origin).unwrap());
        }

        match tokio_tungstenite::connect_async(request).await {
            Ok((ws, _)) => {
                let (sink, stream) = ws.split();
                Ok(Self { sink, stream })
            }
            Err(WsError::Http(response)) => Err(response.status().as_u16()),
            Err(e) => panic!("WebSocket connect failed: {e}"),
        }
    }

    /// Send raw text message
    pub async fn send_raw(&mut self, msg: &str) {
        self.sink
            .send(Message::Text(msg.to_string().into()))
            .await
            .unwrap();
    }

    /// Send JSON message
    pub async fn send_json<T: Serialize>(&mut self, msg: &T) {
        let json = serde_json::to_string(msg).unwrap();
        self.send_raw(&json).await;
    }

    /// Receive raw text message; `None` once the server closed the socket
    pub async fn recv_raw(&mut self) -> Option<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.to_string()),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(_)) => return None,
            }
        }
    }

    /// Receive with timeout, returns None if timeout or closed
    pub async fn recv_timeout(&mut self, duration: Duration) -> Option<String> {
        tokio::time::timeout(duration, self.recv_raw())
            .await
            .ok()
            .flatten()
    }

    /// Close the socket cleanly
    pub async fn close(mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

/// High-level test client joined to one room
pub struct TestClient {
    pub conn: WsConnection,
    pub name: String,
}

impl TestClient {
    /// Join a room and consume the first roomState
    #[allow(dead_code)]
    pub async fn join(addr: SocketAddr, room_id: &str, name: &str, game_master: bool) -> Self {
        let url = join_url(addr, room_id, name, game_master);
        let conn = WsConnection::try_connect(&url, None)
            .await
            .unwrap_or_else(|status| panic!("join refused with {status}"));

        let mut client = Self {
            conn,
            name: name.to_string(),
        };
        let state = client.recv().await;
        assert_eq!(state["type"], "roomState", "Expected roomState on join");
        client
    }

    /// Receive the next message
    #[allow(dead_code)]
    pub async fn recv(&mut self) -> Value {
        let text = self
            .conn
            .recv_timeout(RECV_TIMEOUT)
            .await
            .expect("Expected a message");
        serde_json::from_str(&text).expect("Failed to parse JSON")
    }

    /// Receive roomState payloads until one satisfies `pred`
    #[allow(dead_code)]
    pub async fn recv_state_until(&mut self, pred: impl Fn(&Value) -> bool) -> Value {
        loop {
            let msg = self.recv().await;
            if msg["type"] == "roomState" && pred(&msg["payload"]) {
                return msg["payload"].clone();
            }
        }
    }

    /// Assert no message received within duration
    #[allow(dead_code)]
    pub async fn expect_no_message(&mut self, duration: Duration) {
        let msg = self.conn.recv_timeout(duration).await;
        assert!(msg.is_none(), "Expected no message but received {msg:?}");
    }

    #[allow(dead_code)]
    pub async fn vote(&mut self, ticket_id: &str, vote: i64) {
        self.conn
            .send_json(&json!({
                "type": "vote",
                "payload": {"ticketId": ticket_id, "vote": vote},
            }))
            .await;
    }

    #[allow(dead_code)]
    pub async fn send_type(&mut self, kind: &str) {
        self.conn
            .send_json(&json!({"type": kind, "payload": null}))
            .await;
    }

    #[allow(dead_code)]
    pub async fn close(self) {
        self.conn.close().await;
    }
}
