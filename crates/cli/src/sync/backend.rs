// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote backend abstraction.
//!
//! The sync engine only needs four primitives from the record store:
//! insert, patch, remove and invoke. [`RemoteBackend`] captures them so the
//! engine can run against:
//! - [`WebSocketBackend`], which speaks the `ob_core::protocol` messages
//! - scripted mocks in unit tests

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ob_core::protocol::{ClientMessage, ServerMessage};
use ob_core::{Mutation, Record};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

/// Error type for backend calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or the connection dropped.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The backend failed while handling the request.
    #[error("server error: {0}")]
    Server(String),

    /// The backend understood the request and refused it.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The backend replied with something we could not understand.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    /// True for failures that retrying will not fix.
    pub fn is_permanent(&self) -> bool {
        matches!(self, BackendError::Rejected(_))
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Boxed future returned by [`RemoteBackend`] calls.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = BackendResult<()>> + Send + 'a>>;

/// The remote record store.
pub trait RemoteBackend: Send + Sync {
    /// Insert a full record into `collection`.
    fn insert(&self, collection: String, record: Record) -> BackendFuture<'_>;

    /// Patch fields of record `id` in `collection`.
    fn patch(&self, collection: String, id: String, fields: Record) -> BackendFuture<'_>;

    /// Remove record `id` from `collection`.
    fn remove(&self, collection: String, id: String) -> BackendFuture<'_>;

    /// Invoke the remote procedure `procedure`.
    fn invoke(&self, procedure: String, args: Record) -> BackendFuture<'_>;
}

/// Routes a mutation to the matching backend primitive.
pub fn dispatch<'a>(backend: &'a dyn RemoteBackend, mutation: &Mutation) -> BackendFuture<'a> {
    match mutation.clone() {
        Mutation::Create { collection, record } => backend.insert(collection, record),
        Mutation::Update {
            collection,
            id,
            fields,
        } => backend.patch(collection, id, fields),
        Mutation::Delete { collection, id } => backend.remove(collection, id),
        Mutation::RemoteCall { procedure, args } => backend.invoke(procedure, args),
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

/// Backend speaking JSON request/response over one WebSocket.
///
/// Connects lazily on the first call and reconnects on the call after a
/// network failure. Calls are serialized on the connection.
pub struct WebSocketBackend {
    url: String,
    conn: Mutex<Option<WebSocketConnection>>,
    next_request: AtomicU64,
}

impl WebSocketBackend {
    pub fn new(url: impl Into<String>) -> Self {
        WebSocketBackend {
            url: url.into(),
            conn: Mutex::new(None),
            next_request: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Closes the connection, if open.
    pub async fn disconnect(&self) {
        if let Some(mut ws) = self.conn.lock().await.take() {
            let _ = ws.sink.close().await;
        }
    }

    async fn request(&self, build: impl FnOnce(u64) -> ClientMessage) -> BackendResult<()> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let msg = build(request_id);

        let mut guard = self.conn.lock().await;
        let ws = match guard.take() {
            Some(ws) => ws,
            None => connect(&self.url).await?,
        };
        let ws = guard.insert(ws);

        let result = exchange(ws, request_id, &msg).await;
        if matches!(result, Err(BackendError::Network(_))) {
            // Connection is broken, reconnect on the next call
            *guard = None;
        }
        result
    }
}

impl RemoteBackend for WebSocketBackend {
    fn insert(&self, collection: String, record: Record) -> BackendFuture<'_> {
        Box::pin(async move {
            self.request(|request_id| ClientMessage::Insert {
                request_id,
                collection,
                record,
            })
            .await
        })
    }

    fn patch(&self, collection: String, id: String, fields: Record) -> BackendFuture<'_> {
        Box::pin(async move {
            self.request(|request_id| ClientMessage::Patch {
                request_id,
                collection,
                id,
                fields,
            })
            .await
        })
    }

    fn remove(&self, collection: String, id: String) -> BackendFuture<'_> {
        Box::pin(async move {
            self.request(|request_id| ClientMessage::Remove {
                request_id,
                collection,
                id,
            })
            .await
        })
    }

    fn invoke(&self, procedure: String, args: Record) -> BackendFuture<'_> {
        Box::pin(async move {
            self.request(|request_id| ClientMessage::Invoke {
                request_id,
                procedure,
                args,
            })
            .await
        })
    }
}

async fn connect(url: &str) -> BackendResult<WebSocketConnection> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| BackendError::Network(format!("connect to {url}: {e}")))?;

    let (sink, stream) = ws_stream.split();
    Ok(WebSocketConnection { sink, stream })
}

/// Sends one request and waits for its reply.
async fn exchange(
    ws: &mut WebSocketConnection,
    request_id: u64,
    msg: &ClientMessage,
) -> BackendResult<()> {
    let json = msg
        .to_json()
        .map_err(|e| BackendError::Protocol(e.to_string()))?;

    ws.sink
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| BackendError::Network(e.to_string()))?;

    loop {
        match ws.stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let reply = ServerMessage::from_json(&text)
                    .map_err(|e| BackendError::Protocol(e.to_string()))?;

                match reply {
                    ServerMessage::Ack { request_id: id, .. } if id == request_id => return Ok(()),
                    ServerMessage::Rejected {
                        request_id: id,
                        reason,
                    } if id == request_id => return Err(BackendError::Rejected(reason)),
                    ServerMessage::Error {
                        request_id: Some(id),
                        message,
                    } if id == request_id => return Err(BackendError::Server(message)),
                    ServerMessage::Error {
                        request_id: None,
                        message,
                    } => return Err(BackendError::Server(message)),
                    // Late reply to an earlier, timed-out request
                    _ => continue,
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(BackendError::Network("connection closed".into()));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(BackendError::Network(e.to_string())),
        }
    }
}
