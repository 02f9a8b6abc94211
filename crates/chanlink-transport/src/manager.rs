// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport manager: the application-facing session surface.
//!
//! One manager serves many sessions. Each session owns its own runtime task,
//! watermarks and active transport; the manager only keeps the handles needed
//! to route sends and to tear sessions down.

use std::sync::Arc;

use chanlink_config::ChanlinkConfig;
use chanlink_core::{
    ChanlinkError, ChannelId, ChannelLink, Membership, MessageBody, PullTransport, PushTransport,
    SequencePosition, SessionId, StateUpdate, Watermarks,
};
use chanlink_security::Validator;
use chanlink_sync::{ChannelHub, LocalTransport};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{Delivery, SessionEvent, SessionStatus};
use crate::reconnect::ReconnectPolicy;
use crate::session::{SessionHandle, SessionRuntime, SessionShared};

struct SessionEntry {
    handle: SessionHandle,
    membership: Membership,
    task: JoinHandle<()>,
}

/// Builder for a [`TransportManager`].
pub struct TransportManagerBuilder {
    link: Arc<dyn ChannelLink>,
    pull: Arc<dyn PullTransport>,
    push: Option<Arc<dyn PushTransport>>,
    validator: Validator,
    policy: ReconnectPolicy,
}

impl TransportManagerBuilder {
    /// Push transport to try first. Without one, sessions poll from the start.
    pub fn push(mut self, push: Arc<dyn PushTransport>) -> Self {
        self.push = Some(push);
        self
    }

    /// Validator used for synchronous send-side rejection.
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Take policy and validation settings from a loaded configuration.
    pub fn config(mut self, config: &ChanlinkConfig) -> Result<Self, ChanlinkError> {
        self.validator = Validator::from_config(config)?;
        self.policy = ReconnectPolicy::from_config(&config.delivery);
        Ok(self)
    }

    pub fn build(self) -> TransportManager {
        TransportManager {
            link: self.link,
            pull: self.pull,
            push: self.push,
            validator: self.validator,
            policy: self.policy,
            sessions: DashMap::new(),
        }
    }
}

/// Attaches sessions to channels and routes their traffic.
pub struct TransportManager {
    link: Arc<dyn ChannelLink>,
    pull: Arc<dyn PullTransport>,
    push: Option<Arc<dyn PushTransport>>,
    validator: Validator,
    policy: ReconnectPolicy,
    sessions: DashMap<SessionId, SessionEntry>,
}

impl TransportManager {
    pub fn builder(
        link: Arc<dyn ChannelLink>,
        pull: Arc<dyn PullTransport>,
    ) -> TransportManagerBuilder {
        TransportManagerBuilder {
            link,
            pull,
            push: None,
            validator: Validator::default(),
            policy: ReconnectPolicy::default(),
        }
    }

    /// A manager whose three transports run in-process against `hub`.
    pub fn local(hub: Arc<ChannelHub>, policy: ReconnectPolicy) -> Self {
        let validator = hub.validator().clone();
        let transport = Arc::new(LocalTransport::new(hub));
        Self::builder(transport.clone(), transport.clone())
            .push(transport)
            .validator(validator)
            .policy(policy)
            .build()
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Attach to `channel` starting from an empty watermark.
    pub async fn attach(
        &self,
        channel: &ChannelId,
        participant_key: &str,
    ) -> Result<SessionHandle, ChanlinkError> {
        self.attach_with(channel, participant_key, "", Watermarks::ZERO)
            .await
    }

    /// Attach and resume from watermarks the client kept from an earlier session.
    pub async fn attach_from(
        &self,
        channel: &ChannelId,
        participant_key: &str,
        watermarks: Watermarks,
    ) -> Result<SessionHandle, ChanlinkError> {
        self.attach_with(channel, participant_key, "", watermarks)
            .await
    }

    pub async fn attach_with(
        &self,
        channel: &ChannelId,
        participant_key: &str,
        display_name: &str,
        watermarks: Watermarks,
    ) -> Result<SessionHandle, ChanlinkError> {
        self.validator.validate_participant(participant_key)?;
        let membership = self.link.join(channel, participant_key, display_name).await?;

        let shared = Arc::new(SessionShared::new(&membership, watermarks));
        let handle = SessionHandle {
            shared: shared.clone(),
        };
        let runtime = SessionRuntime::new(
            shared,
            membership.clone(),
            self.pull.clone(),
            self.push.clone(),
            self.policy,
            watermarks,
        );
        let task = tokio::spawn(runtime.run());

        info!(
            session_id = %membership.session_id,
            channel = %channel,
            participant = %membership.participant.id,
            "session attached"
        );
        self.sessions.insert(
            membership.session_id.clone(),
            SessionEntry {
                handle: handle.clone(),
                membership,
                task,
            },
        );
        Ok(handle)
    }

    /// Register the delivery sink, replacing any earlier one.
    ///
    /// Deliveries made before a sink exists are held back, not dropped.
    pub fn on_message<F>(&self, handle: &SessionHandle, callback: F) -> Result<(), ChanlinkError>
    where
        F: Fn(Delivery) + Send + Sync + 'static,
    {
        if handle.is_detached() || !self.sessions.contains_key(handle.id()) {
            return Err(ChanlinkError::SessionClosed);
        }
        handle.shared.set_sink(Box::new(callback));
        debug!(session_id = %handle.id(), "sink registered");
        Ok(())
    }

    /// Session events from now on.
    pub fn events(&self, handle: &SessionHandle) -> broadcast::Receiver<SessionEvent> {
        handle.subscribe()
    }

    pub fn status(&self, handle: &SessionHandle) -> SessionStatus {
        handle.status()
    }

    /// Publish a content message.
    ///
    /// Validation failures come back immediately as `InvalidInput` and are
    /// never retried. Escaping happens once, on the server side.
    pub async fn send(
        &self,
        handle: &SessionHandle,
        payload: &str,
    ) -> Result<SequencePosition, ChanlinkError> {
        let membership = self.membership(handle)?;
        self.validator.validate(payload).inspect_err(|reason| {
            debug!(session_id = %handle.id(), %reason, "send rejected");
        })?;
        self.link
            .publish(&membership, MessageBody::Content(payload.to_string()))
            .await
    }

    /// Publish a typed state update on the state lane.
    pub async fn send_state(
        &self,
        handle: &SessionHandle,
        update: StateUpdate,
    ) -> Result<SequencePosition, ChanlinkError> {
        let membership = self.membership(handle)?;
        self.validator.validate_state(&update)?;
        self.link
            .publish(&membership, MessageBody::State(update))
            .await
    }

    /// Stop the session and release its transport. Idempotent.
    ///
    /// When this returns, the session task has finished and the sink will
    /// not be called again.
    pub async fn detach(&self, handle: &SessionHandle) {
        handle.shared.dispose();
        let Some((_, entry)) = self.sessions.remove(handle.id()) else {
            debug!(session_id = %handle.id(), "session already detached");
            return;
        };

        if let Err(e) = entry.task.await
            && e.is_panic()
        {
            warn!(session_id = %handle.id(), "session task panicked");
        }
        if let Err(e) = self.link.leave(&entry.membership).await {
            warn!(session_id = %handle.id(), error = %e, "leave failed");
        }
        info!(session_id = %handle.id(), "session detached");
    }

    /// Detach every session.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.handle.clone())
            .collect();
        info!(count = handles.len(), "detaching all sessions");
        for handle in handles {
            self.detach(&handle).await;
        }
    }

    pub fn session(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.handle.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn membership(&self, handle: &SessionHandle) -> Result<Membership, ChanlinkError> {
        if handle.is_detached() {
            return Err(ChanlinkError::SessionClosed);
        }
        self.sessions
            .get(handle.id())
            .map(|entry| entry.membership.clone())
            .ok_or(ChanlinkError::SessionClosed)
    }
}

impl Drop for TransportManager {
    fn drop(&mut self) {
        for entry in self.sessions.iter() {
            entry.handle.shared.dispose();
        }
    }
}
