//! WebSocket session handler (C5)
//!
//! Drives one accepted connection through VALIDATE -> AUTHORIZE -> ADMIT ->
//! REGISTER -> ACTIVE -> CLEANUP. CLEANUP runs on every path out of ACTIVE,
//! including the shutdown signal, so I2/I4 (registry invariants) hold
//! regardless of how the session ends.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::channel::ChannelName;
use crate::error::Error;

use super::server::SharedState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, channel, query.token, state))
}

async fn close_with(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

async fn handle_socket(mut socket: WebSocket, channel_name: String, token: Option<String>, state: SharedState) {
    // VALIDATE
    let channel = match ChannelName::parse(&channel_name) {
        Ok(c) => c,
        Err(e) => {
            let (code, reason) = e.ws_close();
            close_with(&mut socket, code, reason).await;
            return;
        }
    };

    // AUTHORIZE
    let mut user_id = None;
    let mut wallet_address = None;
    match token.filter(|t| !t.is_empty()) {
        Some(tok) => match state.jwt.verify_token(&tok) {
            Ok(payload) => {
                if !state
                    .jwt
                    .verify_channel_access(&payload.user_id, channel.as_str())
                {
                    let (code, reason) = Error::AuthorizationDenied(channel.to_string()).ws_close();
                    close_with(&mut socket, code, reason).await;
                    return;
                }
                user_id = Some(payload.user_id);
                wallet_address = Some(payload.wallet_address);
            }
            Err(e) => {
                let (code, reason) = e.ws_close();
                close_with(&mut socket, code, reason).await;
                return;
            }
        },
        None if state.config.require_auth
            && !channel.is_public()
            && !channel.is_ephemeral()
            && !channel.is_global() =>
        {
            let (code, reason) = Error::TokenInvalid("missing token".to_string()).ws_close();
            close_with(&mut socket, code, reason).await;
            return;
        }
        None => {}
    }

    // ADMIT
    let max_clients = state.config.max_clients_per_channel;
    if max_clients > 0 && state.registry.get_channel_count(channel.as_str()).await >= max_clients {
        let (code, reason) = Error::ChannelAtCapacity.ws_close();
        close_with(&mut socket, code, reason).await;
        return;
    }

    // REGISTER
    let (subscriber_id, mut outbound_rx) = state
        .registry
        .add_client(&channel, user_id, wallet_address, 100)
        .await;
    state.stats.record_connection();

    let client_count = state.registry.get_channel_count(channel.as_str()).await;
    let total_clients = state.registry.get_total_connections().await;
    tracing::info!(
        channel = %channel,
        subscriber = ?subscriber_id,
        client_count,
        total_clients,
        "client connected"
    );

    let mut shutdown_rx = state.shutdown.subscribe();
    let (mut sink, mut stream) = socket.split();

    // ACTIVE
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(payload) => {
                        if sink.send(Message::Text(payload.to_string())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        state.stats.record_message_received();
                        state.registry.record_message_received(subscriber_id).await;
                    }
                    Some(Err(_)) => break,
                }
            }
            _ = shutdown_rx.changed() => {
                let _ = sink.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Server shutdown".into(),
                }))).await;
                break;
            }
        }
    }

    // CLEANUP
    state.registry.remove_client(subscriber_id, channel.as_str()).await;
    tracing::info!(channel = %channel, subscriber = ?subscriber_id, "client disconnected");
}

