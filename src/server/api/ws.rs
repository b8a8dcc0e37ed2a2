//! `GET /api/sessions/:id/ws` (spec §4.9/§6 wire contract), backed by (G).
//!
//! Downstream frames: `status`, `scrollback`, `output`, `exit`.
//! Upstream frames: `input`, `resize`, `spawn`.
//!
//! Grounded on the teacher's `server/api/ws.rs` subscribe-loop shape,
//! extended to a per-session attach/detach lifecycle instead of a single
//! global notification feed.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::index::Session;
use crate::runtime::{Frame, ManagedState, SpawnSpec};
use crate::server::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/sessions/{id}/ws", get(ws_handler))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum UpstreamFrame {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
    Spawn,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DownstreamFrame<'a> {
    Status {
        is_active: bool,
        session_title: &'a str,
        working_directory: &'a str,
    },
    Scrollback { data: String },
    Output { data: String },
    Exit { code: i32 },
}

/// Build the current `status` frame from the resolved session and the
/// runtime's live state (spec §6 wire contract: `status {is_active,
/// session_title, working_directory}`).
fn status_frame<'a>(state: &AppState, session: &'a Session) -> DownstreamFrame<'a> {
    let is_active = matches!(state.runtime.state(&session.session_id), Some(ManagedState::Active));
    DownstreamFrame::Status {
        is_active,
        session_title: session.title.as_deref().unwrap_or(&session.session_id),
        working_directory: &session.working_directory,
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, session_id: String) {
    let session = match tokio::task::spawn_blocking({
        let state = state.clone();
        let session_id = session_id.clone();
        move || state.sessions.find_session(&session_id)
    })
    .await
    {
        Ok(Ok(session)) => session,
        _ => {
            tracing::warn!("ws attach to unknown session {session_id}");
            return;
        }
    };

    let spec = SpawnSpec {
        program: state.config.runtime.child_program.clone(),
        args: vec!["--resume".to_string(), session_id.clone()],
    };
    let working_directory = std::path::PathBuf::from(&session.working_directory);

    let attach = match state.runtime.attach(&session_id, &working_directory, &spec).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!("failed to spawn child for session {session_id}: {e:#}");
            return;
        }
    };

    if send_json(&mut socket, &status_frame(&state, &session)).await.is_err() {
        state.runtime.detach(&session_id);
        return;
    }

    if send_json(
        &mut socket,
        &DownstreamFrame::Scrollback {
            data: String::from_utf8_lossy(&attach.scrollback).to_string(),
        },
    )
    .await
    .is_err()
    {
        state.runtime.detach(&session_id);
        return;
    }

    let mut rx = attach.rx;
    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Ok(Frame::Output(bytes)) => {
                        let text = String::from_utf8_lossy(&bytes).to_string();
                        if send_json(&mut socket, &DownstreamFrame::Output { data: text }).await.is_err() {
                            break;
                        }
                    }
                    Ok(Frame::Status(reason)) => {
                        tracing::debug!("session {session_id} status event: {reason}");
                        if send_json(&mut socket, &status_frame(&state, &session)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Frame::Exited(code)) => {
                        let _ = send_json(&mut socket, &DownstreamFrame::Exit { code }).await;
                        break;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws client for {session_id} lagged, disconnecting ({n} frames dropped)");
                        break;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<UpstreamFrame>(&text) {
                            Ok(UpstreamFrame::Input { data }) => {
                                let _ = state.runtime.send_input(&session_id, data.as_bytes());
                            }
                            Ok(UpstreamFrame::Resize { cols, rows }) => {
                                let _ = state.runtime.resize(&session_id, cols, rows);
                            }
                            Ok(UpstreamFrame::Spawn) => {}
                            Err(e) => tracing::debug!("ignoring malformed ws frame: {e}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.runtime.detach(&session_id);
}

async fn send_json(socket: &mut WebSocket, frame: &DownstreamFrame<'_>) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    socket.send(Message::Text(json.into())).await
}
