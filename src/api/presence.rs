//! User presence endpoints.
//!
//! A WebSocket connection is the presence lease: connecting marks the user
//! online, any traffic (including pong replies to our pings) refreshes the
//! lease, and the socket closing — gracefully or not — releases it. The
//! registry's sweeper handles clients that vanish without a close frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::db::User;
use crate::presence::UserPresence;
use crate::AppState;

use super::auth::user_from_ws_token;

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: Option<String>,
}

/// Last known presence state of every user seen since startup
///
/// GET /api/presence
pub async fn list_presence(
    State(state): State<Arc<AppState>>,
    _user: User,
) -> Json<Vec<UserPresence>> {
    Json(state.presence.snapshot())
}

/// WebSocket endpoint maintaining the caller's presence lease
///
/// GET /api/presence/ws?token=...
pub async fn presence_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsAuthQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // WebSocket clients cannot set custom headers; the token rides the query
    let user = user_from_ws_token(&state, query.token.as_deref())
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(ws.on_upgrade(move |socket| handle_presence_socket(socket, state, user.id)))
}

async fn handle_presence_socket(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (mut sender, mut receiver) = socket.split();

    state.presence.connect(&user_id);
    tracing::debug!(user_id = %user_id, "Presence connection opened");

    // Ping well inside the lease TTL so replies keep the lease alive
    let ping_every = Duration::from_secs((state.config.presence.lease_ttl_secs / 3).max(1));
    let mut ping_interval = interval(ping_every);
    // First tick fires immediately; skip it so we don't ping on connect
    ping_interval.tick().await;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        state.presence.heartbeat(&user_id);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        state.presence.heartbeat(&user_id);
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_))) => {
                        // Any client traffic counts as a heartbeat
                        state.presence.heartbeat(&user_id);
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        break;
                    }
                }
            }
        }
    }

    state.presence.disconnect(&user_id);
    tracing::debug!(user_id = %user_id, "Presence connection closed");
}
