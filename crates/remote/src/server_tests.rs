// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test server utilities for integration testing.
//!
//! Provides a TestServer that runs on a random port, backed by a temp
//! directory, with access to its state for verification.

#![cfg(test)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::server;
use crate::state::ServerState;

/// A test server that runs on a random port and can be controlled.
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    state: ServerState,
    /// Keep the temp directory alive for the lifetime of the test server.
    _temp_dir: tempfile::TempDir,
}

impl TestServer {
    /// Start a new test server on a random available port.
    pub async fn start() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = ServerState::open(temp_dir.path()).unwrap();

        // Bind to port 0 to get a random available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state_clone = state.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = server::serve(listener, state_clone) => {
                    if let Err(e) = result {
                        eprintln!("Test server error: {}", e);
                    }
                }
                _ = shutdown_rx => {
                    // Shutdown requested
                }
            }
        });

        TestServer {
            addr,
            shutdown_tx,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get the WebSocket URL for connecting to this server.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Get access to the server state for verification.
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Shutdown the test server.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use ob_core::protocol::{ClientMessage, ServerMessage};
    use ob_core::Record;
    use serde_json::json;
    use tokio::time::{timeout, Duration};
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    /// Sends one raw frame and waits for the reply.
    async fn roundtrip_raw(url: &str, text: String) -> ServerMessage {
        let (mut ws, _) = connect_async(url).await.unwrap();
        ws.send(Message::Text(text.into())).await.unwrap();

        match timeout(Duration::from_secs(5), ws.next()).await {
            Ok(Some(Ok(Message::Text(reply)))) => ServerMessage::from_json(&reply).unwrap(),
            Ok(other) => panic!("Expected text reply, got {:?}", other),
            Err(_) => panic!("Timeout waiting for reply"),
        }
    }

    async fn roundtrip(url: &str, msg: ClientMessage) -> ServerMessage {
        roundtrip_raw(url, msg.to_json().unwrap()).await
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let server = TestServer::start().await;

        let reply = roundtrip(&server.ws_url(), ClientMessage::ping(42)).await;
        assert_eq!(reply, ServerMessage::pong(42));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_insert_is_acked_and_stored() {
        let server = TestServer::start().await;

        let msg = ClientMessage::Insert {
            request_id: 7,
            collection: "tasks".into(),
            record: record(json!({"id": "t1", "title": "A"})),
        };
        assert_eq!(
            roundtrip(&server.ws_url(), msg).await,
            ServerMessage::ack(7)
        );

        let stored = server.state().get("tasks", "t1").await.unwrap().unwrap();
        assert_eq!(stored["title"], "A");
        server.shutdown();
    }

    #[tokio::test]
    async fn test_patch_missing_record_is_rejected() {
        let server = TestServer::start().await;

        let msg = ClientMessage::Patch {
            request_id: 3,
            collection: "tasks".into(),
            id: "ghost".into(),
            fields: Record::new(),
        };
        let reply = roundtrip(&server.ws_url(), msg).await;
        assert!(matches!(reply, ServerMessage::Rejected { request_id: 3, .. }));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_invoke_returns_result() {
        let server = TestServer::start().await;

        let msg = ClientMessage::Invoke {
            request_id: 9,
            procedure: "ping".into(),
            args: Record::new(),
        };
        assert_eq!(
            roundtrip(&server.ws_url(), msg).await,
            ServerMessage::ack_with(9, json!("pong"))
        );

        server.shutdown();
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_without_id() {
        let server = TestServer::start().await;

        let reply = roundtrip_raw(&server.ws_url(), "{not json".into()).await;
        match reply {
            ServerMessage::Error {
                request_id,
                message,
            } => {
                assert!(request_id.is_none());
                assert!(message.contains("malformed request"));
            }
            other => panic!("Expected error, got {:?}", other),
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_requests_on_one_connection_are_answered_in_order() {
        let server = TestServer::start().await;
        let (mut ws, _) = connect_async(&server.ws_url()).await.unwrap();

        for request_id in 1..=3u64 {
            let msg = ClientMessage::Remove {
                request_id,
                collection: "tasks".into(),
                id: format!("t{}", request_id),
            };
            ws.send(Message::Text(msg.to_json().unwrap().into()))
                .await
                .unwrap();
        }

        for expected in 1..=3u64 {
            let Some(Ok(Message::Text(reply))) = ws.next().await else {
                panic!("connection ended early");
            };
            assert_eq!(
                ServerMessage::from_json(&reply).unwrap(),
                ServerMessage::ack(expected)
            );
        }

        server.shutdown();
    }
}
