//! WebSocket test client for the SCORM runtime channel
//!
//! Note: Some methods may appear unused because they're only used in specific
//! test files and clippy checks each test independently.

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use scorm_core::AttemptId;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to one attempt's runtime channel
pub struct WsConnection {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl WsConnection {
    /// Connect with the session cookie for `token`, or anonymously
    pub async fn connect(addr: SocketAddr, attempt: AttemptId, token: Option<&str>) -> Self {
        let url = format!("ws://{}/websocket/attempt/{}/scorm_api", addr, attempt);
        let mut request = url.into_client_request().unwrap();
        if let Some(token) = token {
            request.headers_mut().insert(
                "Cookie",
                HeaderValue::from_str(&format!("scorm_session={token}")).unwrap(),
            );
        }
        let (ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .expect("Failed to connect");
        let (sink, stream) = ws.split();
        Self { sink, stream }
    }

    /// Send raw text message
    pub async fn send_raw(&mut self, msg: &str) {
        self.sink
            .send(Message::Text(msg.to_string().into()))
            .await
            .unwrap();
    }

    /// Send one batch of key/value pairs
    #[allow(dead_code)]
    pub async fn send_batch(&mut self, id: u64, pairs: &[(&str, &str)]) {
        let data: Vec<Value> = pairs
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        self.send_raw(&json!({ "id": id, "data": data }).to_string())
            .await;
    }

    /// Receive raw text message
    pub async fn recv_raw(&mut self) -> String {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("WebSocket error: {}", e),
                None => panic!("WebSocket closed"),
            }
        }
    }

    /// Receive and parse a JSON message, failing after five seconds
    pub async fn recv(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(5), self.recv_raw())
            .await
            .expect("timed out waiting for a message");
        serde_json::from_str(&text).expect("Failed to parse JSON")
    }

    /// Receive with timeout, returns None if timeout
    #[allow(dead_code)]
    pub async fn recv_timeout(&mut self, duration: Duration) -> Option<String> {
        tokio::time::timeout(duration, self.recv_raw()).await.ok()
    }

    /// Assert no message received within duration
    #[allow(dead_code)]
    pub async fn expect_no_message(&mut self, duration: Duration) {
        assert!(
            self.recv_timeout(duration).await.is_none(),
            "Expected no message but received one"
        );
    }
}
