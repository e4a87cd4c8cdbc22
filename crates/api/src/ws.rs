//! WebSocket gateway for live notifications.
//!
//! `GET /ws?token=<JWT>` upgrades after the token is verified. While the
//! socket is open the user is in the presence map and receives
//! `newNotification` / `getOnlineUsers` frames; closing it removes them.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use agrihub_common::error::AppError;
use agrihub_notifier::{ClientEvent, Connection, NotificationHub, ServerEvent};

use crate::middleware::auth::{AuthUser, authenticate_token, bearer_token};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// Socket owner, from the `token` query parameter or the Authorization header.
///
/// Browsers cannot set headers on a WebSocket handshake, hence the query parameter.
pub struct WsUser(pub AuthUser);

impl FromRequestParts<AppState> for WsUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<WsAuthQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        let token = query
            .token
            .filter(|t| !t.is_empty())
            .or_else(|| bearer_token(parts))
            .ok_or_else(|| AppError::Auth("Missing token".to_string()))?;

        let user = authenticate_token(&token, &state.config.jwt_secret)?;
        Ok(WsUser(user))
    }
}

/// GET /ws — Upgrade to a notification socket.
async fn ws_upgrade(
    State(state): State<AppState>,
    WsUser(user): WsUser,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(hub, socket, user))
}

async fn handle_socket(hub: NotificationHub, socket: WebSocket, user: AuthUser) {
    let Connection {
        user_id,
        conn_id,
        mut outbound,
        reply,
    } = hub.connect(user.user_id);

    let (mut sink, mut stream) = socket.split();

    // Writer: drain the outbound queue into the socket
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Reader: answer pings on this socket, stop on close
    let mut reader = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => match ClientEvent::parse(text.as_str()) {
                    Some(ClientEvent::Ping) => {
                        reply.send(&ServerEvent::Pong);
                    }
                    None => {
                        tracing::debug!(user_id = %user_id, "Ignoring unrecognised client frame");
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(user_id = %user_id, error = %e, "Socket read error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.disconnect(user_id, conn_id);
}
