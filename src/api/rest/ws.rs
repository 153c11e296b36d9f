use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::gateway::events::{ClientEvent, ServerEvent};
use crate::gateway::sessions::Role;
use crate::gateway::{self, SessionContext};
use crate::state::AppState;

/// Identity is whatever the transport claims. Verifying a signed credential
/// here is a known open question; the handshake fails closed when either
/// field is missing.
#[derive(Deserialize)]
pub struct ConnectParams {
    user_id: Option<Uuid>,
    role: Option<Role>,
}

pub async fn ws_handler(
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    let (Some(user_id), Some(role)) = (params.user_id, params.role) else {
        return (StatusCode::UNAUTHORIZED, "authentication failed").into_response();
    };

    let session = SessionContext {
        conn_id: Uuid::new_v4(),
        user_id,
        role,
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, session))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session: SessionContext) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel(state.session_buffer_size);

    gateway::connect(&state, session, tx);

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize outbound event");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let Message::Text(text) = message else { continue };

            match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => gateway::handle_event(&recv_state, session, event),
                Err(err) => {
                    warn!(user_id = %session.user_id, error = %err, "unparseable client event");
                    recv_state.sessions.send_to_conn(
                        session.conn_id,
                        &ServerEvent::Error {
                            message: "malformed event".to_string(),
                        },
                    );
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    gateway::disconnect(&state, session);
}
