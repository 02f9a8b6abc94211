// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side transports that talk to a remote gateway.
//!
//! [`RemoteTransport`] implements the link and pull seams over the HTTP API
//! and the push seam over the `/ws` endpoint, so a transport manager can run
//! in a different process from the hub.

use std::time::Duration;

use async_trait::async_trait;
use chanlink_core::{
    Channel, ChannelId, ChannelKind, ChannelLink, ChanlinkError, Frame, Membership, MessageBody,
    PullTransport, PushStream, PushTransport, RejectReason, SequencePosition, SyncBatch,
    Watermarks,
};
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message as WsMessage};
use tracing::debug;
use url::Url;

use crate::handlers::{
    AttachRequest, AttachResponse, ChannelsResponse, CreateChannelRequest, DetachRequest,
    ErrorResponse, HealthResponse, PollRequest, PublishResponse, SendRequest, StateRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Link, pull and push transport backed by a remote gateway.
#[derive(Clone)]
pub struct RemoteTransport {
    http: reqwest::Client,
    base: Url,
}

impl RemoteTransport {
    /// Connect to the gateway at `base`, e.g. `http://127.0.0.1:8710/`.
    pub fn new(base: &str) -> Result<Self, ChanlinkError> {
        let base = Url::parse(base)
            .map_err(|e| ChanlinkError::Config(format!("invalid gateway url `{base}`: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChanlinkError::transport_with("failed to build http client", e))?;
        Ok(Self::with_client(http, base))
    }

    pub fn with_client(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub async fn create_channel(
        &self,
        name: &str,
        kind: ChannelKind,
    ) -> Result<Channel, ChanlinkError> {
        let req = CreateChannelRequest {
            name: name.to_string(),
            kind,
        };
        self.post_json("v1/channels", &req).await
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>, ChanlinkError> {
        let resp: ChannelsResponse = self.get_json("v1/channels").await?;
        Ok(resp.channels)
    }

    pub async fn health(&self) -> Result<HealthResponse, ChanlinkError> {
        self.get_json("health").await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChanlinkError> {
        self.base
            .join(path)
            .map_err(|e| ChanlinkError::Config(format!("invalid gateway path `{path}`: {e}")))
    }

    fn ws_url(&self, membership: &Membership, since: Watermarks) -> Result<Url, ChanlinkError> {
        let mut url = self.endpoint("ws")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ChanlinkError::Config(format!("cannot derive websocket url from {url}")))?;
        url.query_pairs_mut()
            .append_pair("session_id", membership.session_id.as_str())
            .append_pair("content", &since.content.to_string())
            .append_pair("state", &since.state.to_string());
        Ok(url)
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ChanlinkError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await
            .map_err(|e| ChanlinkError::transport_with(format!("POST {path} failed"), e))?;
        decode(path, check(resp).await?).await
    }

    async fn get_json<Resp: DeserializeOwned>(&self, path: &str) -> Result<Resp, ChanlinkError> {
        let resp = self
            .http
            .get(self.endpoint(path)?)
            .send()
            .await
            .map_err(|e| ChanlinkError::transport_with(format!("GET {path} failed"), e))?;
        decode(path, check(resp).await?).await
    }
}

/// Map a non-success response onto the error taxonomy.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ChanlinkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .json::<ErrorResponse>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());
    Err(match status {
        StatusCode::NOT_FOUND => ChanlinkError::not_found("remote resource", message),
        StatusCode::BAD_REQUEST => ChanlinkError::invalid(RejectReason::Remote(message)),
        StatusCode::SERVICE_UNAVAILABLE => ChanlinkError::SyncFailure {
            message,
            source: None,
        },
        _ => ChanlinkError::transport(format!("gateway returned {status}: {message}")),
    })
}

async fn decode<Resp: DeserializeOwned>(
    path: &str,
    resp: reqwest::Response,
) -> Result<Resp, ChanlinkError> {
    resp.json()
        .await
        .map_err(|e| ChanlinkError::ProtocolViolation(format!("bad response from {path}: {e}")))
}

fn published(resp: PublishResponse) -> Result<SequencePosition, ChanlinkError> {
    match (resp.accepted, resp.position) {
        (true, Some(position)) => Ok(position),
        (true, None) => Err(ChanlinkError::ProtocolViolation(
            "accepted publish without a position".into(),
        )),
        (false, _) => Err(ChanlinkError::invalid(RejectReason::Remote(
            resp.reason.unwrap_or_else(|| "rejected".into()),
        ))),
    }
}

#[async_trait]
impl ChannelLink for RemoteTransport {
    async fn join(
        &self,
        channel: &ChannelId,
        participant_key: &str,
        display_name: &str,
    ) -> Result<Membership, ChanlinkError> {
        let req = AttachRequest {
            channel_id: channel.clone(),
            participant_key: participant_key.to_string(),
            display_name: display_name.to_string(),
        };
        let resp: AttachResponse = self.post_json("v1/attach", &req).await?;
        Ok(resp.into())
    }

    async fn publish(
        &self,
        membership: &Membership,
        body: MessageBody,
    ) -> Result<SequencePosition, ChanlinkError> {
        let session_id = membership.session_id.clone();
        let resp: PublishResponse = match body {
            MessageBody::Content(payload) => {
                self.post_json("v1/send", &SendRequest { session_id, payload })
                    .await?
            }
            MessageBody::State(update) => {
                self.post_json("v1/state", &StateRequest { session_id, update })
                    .await?
            }
        };
        published(resp)
    }

    async fn leave(&self, membership: &Membership) -> Result<(), ChanlinkError> {
        let req = DetachRequest {
            session_id: membership.session_id.clone(),
        };
        let resp = self
            .http
            .post(self.endpoint("v1/detach")?)
            .json(&req)
            .send()
            .await
            .map_err(|e| ChanlinkError::transport_with("POST v1/detach failed", e))?;
        check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl PullTransport for RemoteTransport {
    async fn poll(
        &self,
        membership: &Membership,
        since: Watermarks,
    ) -> Result<SyncBatch, ChanlinkError> {
        let req = PollRequest {
            session_id: membership.session_id.clone(),
            watermarks: since,
        };
        self.post_json("v1/poll", &req).await.map_err(|e| match e {
            e @ ChanlinkError::SyncFailure { .. } => e,
            other => ChanlinkError::sync("remote poll failed", other),
        })
    }
}

#[async_trait]
impl PushTransport for RemoteTransport {
    async fn open(
        &self,
        membership: &Membership,
        since: Watermarks,
    ) -> Result<Box<dyn PushStream>, ChanlinkError> {
        let url = self.ws_url(membership, since)?;
        let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ChanlinkError::transport_with("websocket connect failed", e))?;
        debug!(session_id = %membership.session_id, "websocket connected");
        Ok(Box::new(WsPushStream { ws, closed: false }))
    }
}

/// Frames read from a gateway WebSocket.
pub struct WsPushStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl PushStream for WsPushStream {
    async fn next_frame(&mut self) -> Result<Option<Frame>, ChanlinkError> {
        if self.closed {
            return Ok(None);
        }
        loop {
            match self.ws.next().await {
                Some(Ok(WsMessage::Text(text))) => return Frame::decode(text.as_str()).map(Some),
                Some(Ok(WsMessage::Binary(_))) => {
                    return Err(ChanlinkError::ProtocolViolation(
                        "binary frames are not supported".into(),
                    ));
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    self.closed = true;
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.closed = true;
                    return Err(ChanlinkError::transport_with("websocket read failed", e));
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlink_core::{Participant, ParticipantId, SessionId};

    fn membership() -> Membership {
        Membership {
            session_id: SessionId::from("s-1"),
            channel_id: ChannelId::from("ch-1"),
            participant: Participant {
                id: ParticipantId::from("p-1"),
                external_key: "agent-1".into(),
                display_name: "agent-1".into(),
                channels: Default::default(),
                sequence: 0,
                active: true,
            },
        }
    }

    #[test]
    fn ws_url_swaps_scheme_and_carries_watermarks() {
        let t = RemoteTransport::new("http://127.0.0.1:8710/").unwrap();
        let url = t.ws_url(&membership(), Watermarks::new(4, 2)).unwrap();
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:8710/ws?session_id=s-1&content=4&state=2"
        );

        let t = RemoteTransport::new("https://example.com/chat/").unwrap();
        let url = t.ws_url(&membership(), Watermarks::ZERO).unwrap();
        assert!(url.as_str().starts_with("wss://example.com/chat/ws?"));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let err = RemoteTransport::new("not a url").err().unwrap();
        assert!(matches!(err, ChanlinkError::Config(_)));
    }

    #[test]
    fn rejected_publish_maps_to_remote_reason() {
        let err = published(PublishResponse {
            accepted: false,
            position: None,
            reason: Some("payload is empty".into()),
        })
        .unwrap_err();
        assert_eq!(
            err.reject_reason(),
            Some(&RejectReason::Remote("payload is empty".into()))
        );
        assert_eq!(
            published(PublishResponse {
                accepted: true,
                position: Some(7),
                reason: None,
            })
            .unwrap(),
            7
        );
    }
}
