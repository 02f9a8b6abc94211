// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket push endpoint.
//!
//! `GET /ws?session_id=...&content=N&state=M` replays everything above the
//! given watermarks and then streams live frames (see [`Frame`]) as JSON text.
//! The socket is one-way: text sent by the client is logged and dropped.

use axum::{
    extract::{
        Query, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use chanlink_core::{
    ChanlinkError, Frame, PushStream, PushTransport, SequencePosition, SessionId, Watermarks,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::handlers::ApiError;
use crate::server::GatewayState;

/// Query parameters of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub session_id: SessionId,
    #[serde(default)]
    pub content: SequencePosition,
    #[serde(default)]
    pub state: SequencePosition,
}

/// WebSocket upgrade handler.
///
/// Unknown sessions and unopenable channels are refused before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let (membership, detached) = match state.session(&query.session_id) {
        Ok(session) => session,
        Err(e) => return ApiError(e).into_response(),
    };
    let since = Watermarks::new(query.content, query.state);
    let stream = match state.transport.open(&membership, since).await {
        Ok(stream) => stream,
        Err(e) => return ApiError(e).into_response(),
    };
    debug!(session_id = %query.session_id, ?since, "push stream opened");
    ws.on_upgrade(move |socket| handle_socket(socket, state, stream, detached, query.session_id))
}

/// Pump frames until the client leaves, the session detaches or the feed ends.
async fn handle_socket(
    socket: WebSocket,
    state: GatewayState,
    mut stream: Box<dyn PushStream>,
    detached: CancellationToken,
    session_id: SessionId,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let done = detached.child_token();
    state.stream_opened(&session_id);

    let reader_done = done.clone();
    let reader_session = session_id.clone();
    let reader = tokio::spawn(async move {
        while let Some(incoming) = ws_receiver.next().await {
            match incoming {
                Ok(WsMessage::Text(text)) => {
                    let violation = ChanlinkError::ProtocolViolation(format!(
                        "unexpected client frame: {}",
                        text.as_str()
                    ));
                    warn!(session_id = %reader_session, error = %violation, "dropping client frame");
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(session_id = %reader_session, error = %e, "websocket read error");
                    break;
                }
            }
        }
        reader_done.cancel();
    });

    loop {
        let frame = tokio::select! {
            _ = done.cancelled() => break,
            frame = stream.next_frame() => frame,
        };
        match frame {
            Ok(Some(frame)) => {
                if ws_sender
                    .send(WsMessage::Text(frame.encode().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "push feed failed");
                let frame = Frame::Error {
                    message: e.to_string(),
                };
                let _ = ws_sender.send(WsMessage::Text(frame.encode().into())).await;
                break;
            }
        }
    }

    stream.close().await;
    let _ = ws_sender.send(WsMessage::Close(None)).await;
    done.cancel();
    reader.abort();
    state.stream_closed(&session_id);
    debug!(session_id = %session_id, "push stream closed");
}
