// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chanlink_core::{
    Channel, ChannelId, ChannelKind, ChannelLink, ChanlinkError, HealthStatus, Membership,
    MessageBody, Participant, ParticipantId, PullTransport, Registry, SequencePosition,
    SessionId, StateUpdate, SyncBatch, Watermarks,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::server::GatewayState;

/// Request body for POST /v1/attach.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttachRequest {
    pub channel_id: ChannelId,
    /// Stable external key of the participant.
    pub participant_key: String,
    /// Falls back to the key when empty.
    #[serde(default)]
    pub display_name: String,
}

/// Response body for POST /v1/attach.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttachResponse {
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
    pub channel_id: ChannelId,
    pub participant: Participant,
}

impl From<Membership> for AttachResponse {
    fn from(m: Membership) -> Self {
        Self {
            session_id: m.session_id,
            participant_id: m.participant.id.clone(),
            channel_id: m.channel_id,
            participant: m.participant,
        }
    }
}

impl From<AttachResponse> for Membership {
    fn from(resp: AttachResponse) -> Self {
        Self {
            session_id: resp.session_id,
            channel_id: resp.channel_id,
            participant: resp.participant,
        }
    }
}

/// Request body for POST /v1/send.
#[derive(Debug, Serialize, Deserialize)]
pub struct SendRequest {
    pub session_id: SessionId,
    pub payload: String,
}

/// Request body for POST /v1/state.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateRequest {
    pub session_id: SessionId,
    pub update: StateUpdate,
}

/// Outcome of a send or state publish.
///
/// A validation rejection is a normal outcome, reported with `accepted: false`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SequencePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Request body for POST /v1/poll.
#[derive(Debug, Serialize, Deserialize)]
pub struct PollRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub watermarks: Watermarks,
}

/// Request body for POST /v1/detach.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetachRequest {
    pub session_id: SessionId,
}

/// Request body for POST /v1/channels.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    #[serde(default)]
    pub kind: ChannelKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelsResponse {
    pub channels: Vec<Channel>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembersResponse {
    pub members: Vec<Participant>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Sessions attached through this gateway.
    pub sessions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`ChanlinkError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ChanlinkError);

impl From<ChanlinkError> for ApiError {
    fn from(err: ChanlinkError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ChanlinkError::NotFound { .. } | ChanlinkError::SessionClosed => StatusCode::NOT_FOUND,
            ChanlinkError::InvalidInput { .. } | ChanlinkError::ProtocolViolation(_) => {
                StatusCode::BAD_REQUEST
            }
            ChanlinkError::SyncFailure { .. }
            | ChanlinkError::Registry { .. }
            | ChanlinkError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, %status, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// POST /v1/attach
pub async fn post_attach(
    State(state): State<GatewayState>,
    Json(req): Json<AttachRequest>,
) -> Result<Json<AttachResponse>, ApiError> {
    let membership = state
        .transport
        .join(&req.channel_id, &req.participant_key, &req.display_name)
        .await?;
    info!(
        session_id = %membership.session_id,
        channel = %membership.channel_id,
        participant = %membership.participant.id,
        "remote session attached"
    );
    state.insert_session(membership.clone());
    Ok(Json(membership.into()))
}

/// POST /v1/send
pub async fn post_send(
    State(state): State<GatewayState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    publish(&state, &req.session_id, MessageBody::Content(req.payload)).await
}

/// POST /v1/state
pub async fn post_state(
    State(state): State<GatewayState>,
    Json(req): Json<StateRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    publish(&state, &req.session_id, MessageBody::State(req.update)).await
}

async fn publish(
    state: &GatewayState,
    session_id: &SessionId,
    body: MessageBody,
) -> Result<Json<PublishResponse>, ApiError> {
    let membership = state.membership(session_id)?;
    match state.transport.publish(&membership, body).await {
        Ok(position) => Ok(Json(PublishResponse {
            accepted: true,
            position: Some(position),
            reason: None,
        })),
        Err(ChanlinkError::InvalidInput { reason }) => {
            debug!(session_id = %session_id, %reason, "publish rejected");
            Ok(Json(PublishResponse {
                accepted: false,
                position: None,
                reason: Some(reason.to_string()),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /v1/poll
pub async fn post_poll(
    State(state): State<GatewayState>,
    Json(req): Json<PollRequest>,
) -> Result<Json<SyncBatch>, ApiError> {
    let membership = state.membership(&req.session_id)?;
    let batch = state.transport.poll(&membership, req.watermarks).await?;
    Ok(Json(batch))
}

/// POST /v1/detach
///
/// Unknown sessions are not an error: detaching twice is a no-op.
pub async fn post_detach(
    State(state): State<GatewayState>,
    Json(req): Json<DetachRequest>,
) -> StatusCode {
    if let Some(membership) = state.remove_session(&req.session_id) {
        if let Err(e) = state.transport.leave(&membership).await {
            warn!(session_id = %req.session_id, error = %e, "leave failed");
        }
        info!(session_id = %req.session_id, "remote session detached");
    }
    StatusCode::NO_CONTENT
}

/// GET /v1/channels
pub async fn get_channels(
    State(state): State<GatewayState>,
) -> Result<Json<ChannelsResponse>, ApiError> {
    let channels = state.hub.list_channels().await?;
    Ok(Json(ChannelsResponse { channels }))
}

/// POST /v1/channels
pub async fn post_channels(
    State(state): State<GatewayState>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    let id = state.hub.create_channel(&req.name, req.kind).await?;
    let channel = state.hub.open_channel(&id).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

/// GET /v1/channels/{id}/members
pub async fn get_members(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<MembersResponse>, ApiError> {
    let channel = ChannelId::from(id);
    state.hub.open_channel(&channel).await?;
    let members = state.hub.members(&channel).await?;
    Ok(Json(MembersResponse { members }))
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let (status, detail) = match state.hub.registry().health_check().await {
        Ok(HealthStatus::Healthy) => ("ok", None),
        Ok(HealthStatus::Degraded(msg)) | Ok(HealthStatus::Unhealthy(msg)) => ("degraded", Some(msg)),
        Err(e) => ("degraded", Some(e.to_string())),
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        sessions: state.session_count(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlink_core::RejectReason;

    #[test]
    fn error_status_mapping() {
        let cases = [
            (ChanlinkError::not_found("channel", "x"), StatusCode::NOT_FOUND),
            (ChanlinkError::SessionClosed, StatusCode::NOT_FOUND),
            (
                ChanlinkError::invalid(RejectReason::Empty),
                StatusCode::BAD_REQUEST,
            ),
            (
                ChanlinkError::registry(std::io::Error::other("db")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ChanlinkError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[test]
    fn rejected_publish_omits_position() {
        let resp = PublishResponse {
            accepted: false,
            position: None,
            reason: Some("payload is empty".into()),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["accepted"], false);
        assert!(json.get("position").is_none());
        assert_eq!(json["reason"], "payload is empty");
    }

    #[test]
    fn attach_request_display_name_defaults_to_empty() {
        let req: AttachRequest =
            serde_json::from_str(r#"{"channel_id": "ch-1", "participant_key": "agent-1"}"#)
                .unwrap();
        assert_eq!(req.channel_id, ChannelId::from("ch-1"));
        assert!(req.display_name.is_empty());
    }

    #[test]
    fn poll_request_watermarks_default_to_zero() {
        let req: PollRequest = serde_json::from_str(r#"{"session_id": "s-1"}"#).unwrap();
        assert_eq!(req.watermarks, Watermarks::ZERO);
    }
}
