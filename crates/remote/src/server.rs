// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Each text frame is one request; each request gets exactly one reply
//! carrying the same request id.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use ob_core::protocol::{ClientMessage, ServerMessage};

use crate::state::{ServerState, StateError};

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    serve(listener, state).await
}

/// Accepts connections on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = handle_client_message(&text, &state).await;
                ws_sink.send(Message::Text(reply.to_json()?.into())).await?;
            }
            Ok(Message::Close(_)) => {
                info!("Client {} disconnected", peer_addr);
                break;
            }
            Ok(Message::Ping(data)) => {
                ws_sink.send(Message::Pong(data)).await?;
            }
            Ok(_) => {
                // Ignore other message types (Binary, Pong, Frame)
            }
            Err(e) => {
                warn!("WebSocket error from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Applies one request and builds its reply.
pub(crate) async fn handle_client_message(text: &str, state: &ServerState) -> ServerMessage {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => return ServerMessage::error(None, format!("malformed request: {}", e)),
    };
    debug!("Received message: {:?}", msg);

    let request_id = msg.request_id();
    let result = match msg {
        ClientMessage::Insert {
            collection, record, ..
        } => state.insert(&collection, &record).await.map(|()| None),
        ClientMessage::Patch {
            collection,
            id,
            fields,
            ..
        } => state.patch(&collection, &id, &fields).await.map(|()| None),
        ClientMessage::Remove { collection, id, .. } => {
            state.remove(&collection, &id).await.map(|()| None)
        }
        ClientMessage::Invoke {
            procedure, args, ..
        } => state.invoke(&procedure, &args).await.map(Some),
        ClientMessage::Ping { id } => return ServerMessage::pong(id),
    };

    match result {
        Ok(None) => ServerMessage::ack(request_id),
        Ok(Some(value)) => ServerMessage::ack_with(request_id, value),
        Err(StateError::Rejected(reason)) => {
            debug!("Rejected request {}: {}", request_id, reason);
            ServerMessage::rejected(request_id, reason)
        }
        Err(e) => {
            error!("Request {} failed: {}", request_id, e);
            ServerMessage::error(Some(request_id), e.to_string())
        }
    }
}
