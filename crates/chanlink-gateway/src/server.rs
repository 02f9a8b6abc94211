// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    routing::{get, post},
};
use chanlink_config::GatewayConfig;
use chanlink_core::{ChanlinkError, ChannelLink, Membership, SessionId};
use chanlink_sync::{ChannelHub, LocalTransport};
use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::handlers;
use crate::ws;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

/// A session attached over the wire.
pub(crate) struct ServerSession {
    pub membership: Membership,
    /// Cancelled on detach; ends any WebSocket streaming for the session.
    pub cancel: CancellationToken,
    /// Last request or stream event for the session.
    pub last_seen: tokio::time::Instant,
    /// WebSockets currently streaming to the session.
    pub open_streams: u32,
}

impl ServerSession {
    fn idle_for(&self, now: tokio::time::Instant, max_idle: Duration) -> bool {
        self.open_streams == 0 && now.duration_since(self.last_seen) >= max_idle
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub hub: Arc<ChannelHub>,
    pub(crate) transport: LocalTransport,
    pub(crate) sessions: Arc<DashMap<SessionId, ServerSession>>,
    pub health: HealthState,
    idle_timeout: Option<Duration>,
}

impl GatewayState {
    pub fn new(hub: Arc<ChannelHub>) -> Self {
        Self {
            transport: LocalTransport::new(hub.clone()),
            hub,
            sessions: Arc::new(DashMap::new()),
            health: HealthState {
                start_time: Instant::now(),
            },
            idle_timeout: None,
        }
    }

    /// Drop remote sessions that stay silent for `timeout`. `None` keeps
    /// them until detach.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn membership(&self, id: &SessionId) -> Result<Membership, ChanlinkError> {
        self.session(id).map(|(membership, _)| membership)
    }

    /// Look up a session and mark it active.
    pub(crate) fn session(
        &self,
        id: &SessionId,
    ) -> Result<(Membership, CancellationToken), ChanlinkError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ChanlinkError::not_found("session", id.as_str()))?;
        session.last_seen = tokio::time::Instant::now();
        Ok((session.membership.clone(), session.cancel.clone()))
    }

    pub(crate) fn insert_session(&self, membership: Membership) {
        self.sessions.insert(
            membership.session_id.clone(),
            ServerSession {
                membership,
                cancel: CancellationToken::new(),
                last_seen: tokio::time::Instant::now(),
                open_streams: 0,
            },
        );
    }

    pub(crate) fn stream_opened(&self, id: &SessionId) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.open_streams += 1;
            session.last_seen = tokio::time::Instant::now();
        }
    }

    pub(crate) fn stream_closed(&self, id: &SessionId) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.open_streams = session.open_streams.saturating_sub(1);
            session.last_seen = tokio::time::Instant::now();
        }
    }

    /// Remove every session silent for at least `max_idle` and end its stream.
    pub(crate) fn reap_idle(&self, max_idle: Duration) -> Vec<Membership> {
        let now = tokio::time::Instant::now();
        let idle: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|s| s.idle_for(now, max_idle))
            .map(|s| s.key().clone())
            .collect();
        idle.iter()
            .filter_map(|id| self.sessions.remove_if(id, |_, s| s.idle_for(now, max_idle)))
            .map(|(_, session)| {
                session.cancel.cancel();
                session.membership
            })
            .collect()
    }

    /// Spawn the idle-session reaper if an idle timeout is set. It runs
    /// until `cancel` fires.
    pub fn spawn_session_reaper(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let max_idle = self.idle_timeout?;
        let state = self.clone();
        let period = (max_idle / 4).max(Duration::from_millis(100));
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                for membership in state.reap_idle(max_idle) {
                    if let Err(e) = state.transport.leave(&membership).await {
                        warn!(session_id = %membership.session_id, error = %e, "leave failed");
                    }
                    info!(
                        session_id = %membership.session_id,
                        idle_secs = max_idle.as_secs(),
                        "idle remote session dropped"
                    );
                }
            }
            debug!("session reaper stopped");
        }))
    }

    /// Forget a session and end its stream. Returns the membership if it was known.
    pub(crate) fn remove_session(&self, id: &SessionId) -> Option<Membership> {
        self.sessions.remove(id).map(|(_, session)| {
            session.cancel.cancel();
            session.membership
        })
    }

    /// Drop every session and end their streams.
    pub fn close_all(&self) {
        for session in self.sessions.iter() {
            session.cancel.cancel();
        }
        self.sessions.clear();
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Build the gateway router.
///
/// - GET /health
/// - POST /v1/attach, /v1/send, /v1/state, /v1/poll, /v1/detach
/// - GET, POST /v1/channels
/// - GET /v1/channels/{id}/members
/// - GET /ws (push transport)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/attach", post(handlers::post_attach))
        .route("/v1/send", post(handlers::post_send))
        .route("/v1/state", post(handlers::post_state))
        .route("/v1/poll", post(handlers::post_poll))
        .route("/v1/detach", post(handlers::post_detach))
        .route(
            "/v1/channels",
            get(handlers::get_channels).post(handlers::post_channels),
        )
        .route("/v1/channels/{id}/members", get(handlers::get_members))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Bind to the configured host:port and serve until `shutdown` resolves.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ChanlinkError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ChanlinkError::transport_with(format!("failed to bind gateway to {addr}"), e))?;
    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ChanlinkError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "gateway listening");
    }

    let reaper = CancellationToken::new();
    let _reaper_guard = reaper.clone().drop_guard();
    state.spawn_session_reaper(reaper.clone());

    let sessions = state.clone();
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            reaper.cancel();
            sessions.close_all();
            info!("gateway shutting down");
        })
        .await
        .map_err(|e| ChanlinkError::transport_with("gateway server error", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlink_core::ChannelKind;
    use chanlink_security::Validator;
    use chanlink_storage::MemoryRegistry;

    fn state() -> GatewayState {
        GatewayState::new(Arc::new(ChannelHub::new(
            Arc::new(MemoryRegistry::new()),
            Validator::default(),
        )))
    }

    #[test]
    fn gateway_state_is_clone() {
        let state = state();
        let cloned = state.clone();
        assert_eq!(cloned.session_count(), 0);
    }

    #[test]
    fn server_config_from_gateway_config() {
        let config = ServerConfig::from(&GatewayConfig::default());
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8710);
    }

    async fn joined(state: &GatewayState, key: &str) -> Membership {
        let channel = state
            .hub
            .create_channel(&format!("room {key}"), ChannelKind::General)
            .await
            .unwrap();
        let membership = state.transport.join(&channel, key, "").await.unwrap();
        state.insert_session(membership.clone());
        membership
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_reaped_and_active_one_kept() {
        let state = state();
        let idle = joined(&state, "agent-1").await;
        let active = joined(&state, "agent-2").await;

        tokio::time::advance(Duration::from_secs(6)).await;
        state.session(&active.session_id).unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        let reaped = state.reap_idle(Duration::from_secs(10));
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].session_id, idle.session_id);
        assert_eq!(state.session_count(), 1);
        assert!(state.membership(&idle.session_id).is_err());
        assert!(state.membership(&active.session_id).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn open_stream_keeps_session_alive() {
        let state = state();
        let m = joined(&state, "agent-1").await;
        let (_, detached) = state.session(&m.session_id).unwrap();

        state.stream_opened(&m.session_id);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(state.reap_idle(Duration::from_secs(5)).is_empty());

        state.stream_closed(&m.session_id);
        assert!(state.reap_idle(Duration::from_secs(5)).is_empty());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(state.reap_idle(Duration::from_secs(5)).len(), 1);
        assert!(detached.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_runs_until_cancelled() {
        let state = state().with_idle_timeout(Some(Duration::from_secs(8)));
        joined(&state, "agent-1").await;
        let cancel = CancellationToken::new();
        let reaper = state.spawn_session_reaper(cancel.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(state.session_count(), 1);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(state.session_count(), 0);

        cancel.cancel();
        reaper.await.unwrap();
    }

    #[test]
    fn no_reaper_without_idle_timeout() {
        assert!(state().spawn_session_reaper(CancellationToken::new()).is_none());
    }

    #[test]
    fn unknown_session_is_not_found() {
        let err = state().membership(&SessionId::from("nope")).unwrap_err();
        assert!(matches!(err, ChanlinkError::NotFound { kind: "session", .. }));
    }
}
