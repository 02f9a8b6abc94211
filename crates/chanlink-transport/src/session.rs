// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session runtime task.
//!
//! Each attached session runs one task that owns its watermarks, its
//! reconnection state and exactly one active transport. The task receives
//! push frames or polls on a fixed cadence, hands new messages to the
//! registered sink and only then advances the watermarks. Detaching cancels
//! the task at whatever await point it is parked on.

use std::fmt;
use std::future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use chanlink_core::{
    ChanlinkError, ChannelId, Frame, Membership, Message, ParticipantId, PullTransport,
    PushStream, PushTransport, SessionId, StreamKind, SyncBatch, TransportKind, Watermarks,
};
use chanlink_sync::{Admission, WatermarkStore};
use tokio::sync::{Notify, broadcast, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{Delivery, SessionEvent, SessionStatus};
use crate::reconnect::{LinkState, ReconnectPolicy, Reconnector, RetryDecision};

const EVENT_CAPACITY: usize = 64;

pub(crate) struct Sink(Box<dyn Fn(Delivery) + Send + Sync>);

/// State shared between a session's task and its handles.
pub(crate) struct SessionShared {
    id: SessionId,
    channel: ChannelId,
    participant: ParticipantId,
    disposed: AtomicBool,
    cancel: CancellationToken,
    sink: ArcSwapOption<Sink>,
    sink_registered: Notify,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

impl SessionShared {
    pub(crate) fn new(membership: &Membership, watermarks: Watermarks) -> Self {
        Self {
            id: membership.session_id.clone(),
            channel: membership.channel_id.clone(),
            participant: membership.participant.id.clone(),
            disposed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            sink: ArcSwapOption::empty(),
            sink_registered: Notify::new(),
            events: broadcast::channel(EVENT_CAPACITY).0,
            status: watch::Sender::new(SessionStatus::initial(watermarks)),
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Mark the session disposed and cancel its task. Returns false if it
    /// already was.
    pub(crate) fn dispose(&self) -> bool {
        let first = !self.disposed.swap(true, Ordering::SeqCst);
        self.sink.store(None);
        self.cancel.cancel();
        first
    }

    pub(crate) fn set_sink(&self, callback: Box<dyn Fn(Delivery) + Send + Sync>) {
        self.sink.store(Some(Arc::new(Sink(callback))));
        self.sink_registered.notify_one();
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Application-side handle of an attached session.
///
/// Cheap to clone. Operations that change the session go through the
/// [`TransportManager`](crate::TransportManager).
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.shared.id
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.shared.channel
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.shared.participant
    }

    /// Current connection status.
    pub fn status(&self) -> SessionStatus {
        *self.shared.status.borrow()
    }

    /// Watermarks of everything handed to the sink so far.
    pub fn watermarks(&self) -> Watermarks {
        self.status().watermarks
    }

    /// Watch status changes.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    /// Subscribe to session events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_detached(&self) -> bool {
        self.shared.is_disposed()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.shared.id)
            .field("channel", &self.shared.channel)
            .field("detached", &self.is_detached())
            .finish()
    }
}

enum Next {
    Push(Option<Box<dyn PushStream>>),
    Pull,
    Stop,
}

enum StreamEnd {
    Closed,
    Cancelled,
}

/// The task body of one session.
pub(crate) struct SessionRuntime {
    shared: Arc<SessionShared>,
    membership: Membership,
    pull: Arc<dyn PullTransport>,
    push: Option<Arc<dyn PushTransport>>,
    policy: ReconnectPolicy,
    reconnector: Reconnector,
    marks: WatermarkStore,
    sync_failures: u32,
}

impl SessionRuntime {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        membership: Membership,
        pull: Arc<dyn PullTransport>,
        push: Option<Arc<dyn PushTransport>>,
        policy: ReconnectPolicy,
        watermarks: Watermarks,
    ) -> Self {
        Self {
            shared,
            membership,
            pull,
            push,
            policy,
            reconnector: Reconnector::new(policy),
            marks: WatermarkStore::new(watermarks),
            sync_failures: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        let cancel = self.shared.cancel.clone();
        info!(
            session_id = %self.shared.id,
            channel = %self.shared.channel,
            content = self.marks.get(StreamKind::Content),
            state = self.marks.get(StreamKind::State),
            "session started"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = self.drive() => {}
        }

        self.reconnector.close();
        self.publish_status();
        info!(session_id = %self.shared.id, "session stopped");
    }

    async fn drive(&mut self) {
        let mut next = if self.push.is_some() {
            Next::Push(None)
        } else {
            Next::Pull
        };
        loop {
            next = match next {
                Next::Push(stream) => self.run_push(stream).await,
                Next::Pull => self.run_pull().await,
                Next::Stop => return,
            };
        }
    }

    async fn run_push(&mut self, mut pending: Option<Box<dyn PushStream>>) -> Next {
        let Some(push) = self.push.clone() else {
            return Next::Pull;
        };

        loop {
            let stream = match pending.take() {
                Some(stream) => stream,
                None => {
                    let attempt = self.reconnector.begin_attempt();
                    self.publish_status();
                    debug!(session_id = %self.shared.id, attempt, "connecting push");

                    match push.open(&self.membership, self.marks.current()).await {
                        Ok(stream) => stream,
                        Err(e) => match self.reconnector.on_connect_failed() {
                            RetryDecision::RetryAfter(delay) => {
                                warn!(
                                    session_id = %self.shared.id,
                                    attempt,
                                    delay_ms = delay.as_millis() as u64,
                                    error = %e,
                                    "push connect failed, retrying"
                                );
                                self.publish_status();
                                time::sleep(delay).await;
                                continue;
                            }
                            RetryDecision::FailOver => {
                                warn!(
                                    session_id = %self.shared.id,
                                    attempts = attempt,
                                    error = %e,
                                    "push unavailable, failing over to pull"
                                );
                                self.shared.emit(SessionEvent::FailedOver);
                                return Next::Pull;
                            }
                        },
                    }
                }
            };

            self.reconnector.on_connected();
            self.publish_status();
            info!(session_id = %self.shared.id, "push connected");
            self.shared.emit(SessionEvent::Connected {
                transport: TransportKind::Push,
            });

            match self.consume(stream).await {
                StreamEnd::Cancelled => return Next::Stop,
                StreamEnd::Closed => {
                    self.reconnector.on_push_closed();
                    self.publish_status();
                    self.shared.emit(SessionEvent::Disconnected);
                }
            }
        }
    }

    async fn consume(&mut self, mut stream: Box<dyn PushStream>) -> StreamEnd {
        let shared = self.shared.clone();
        loop {
            let frame = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => {
                    stream.close().await;
                    return StreamEnd::Cancelled;
                }
                _ = shared.sink_registered.notified() => {
                    self.sync_once().await;
                    continue;
                }
                frame = stream.next_frame() => frame,
            };

            match frame {
                Ok(Some(Frame::Message { message })) => self.on_push_message(message).await,
                Ok(Some(Frame::ChannelUpdate { channel })) => {
                    debug!(session_id = %shared.id, channel = %channel.id, "channel updated");
                    shared.emit(SessionEvent::ChannelUpdated(channel));
                }
                Ok(Some(Frame::SystemStatus { status })) => {
                    debug!(session_id = %shared.id, %status, "system status");
                    shared.emit(SessionEvent::SystemStatus(status));
                }
                Ok(Some(Frame::Error { message })) => {
                    warn!(session_id = %shared.id, %message, "server reported an error");
                    shared.emit(SessionEvent::RemoteError(message));
                }
                Ok(None) => {
                    info!(session_id = %shared.id, "push stream closed by peer");
                    return StreamEnd::Closed;
                }
                Err(ChanlinkError::ProtocolViolation(detail)) => {
                    warn!(session_id = %shared.id, %detail, "dropping malformed frame");
                }
                Err(e) => {
                    warn!(session_id = %shared.id, error = %e, "push stream failed");
                    stream.close().await;
                    return StreamEnd::Closed;
                }
            }
        }
    }

    async fn on_push_message(&mut self, message: Message) {
        if message.channel_id != self.membership.channel_id {
            warn!(
                session_id = %self.shared.id,
                channel = %message.channel_id,
                "dropping message for another channel"
            );
            return;
        }

        match self.marks.admit(&message) {
            Admission::Duplicate => {
                debug!(
                    session_id = %self.shared.id,
                    position = message.position,
                    kind = %message.kind(),
                    "skipping already delivered message"
                );
            }
            Admission::Next => {
                let mut watermarks = self.marks.current();
                watermarks.advance(message.kind(), message.position);
                let (content, state) = match message.kind() {
                    StreamKind::Content => (vec![message], Vec::new()),
                    StreamKind::State => (Vec::new(), vec![message]),
                };
                self.hand_off(content, state, watermarks, TransportKind::Push);
            }
            Admission::Gap { expected } => {
                debug!(
                    session_id = %self.shared.id,
                    expected,
                    received = message.position,
                    "gap in push stream, catching up"
                );
                self.sync_once().await;
            }
        }
    }

    async fn run_pull(&mut self) -> Next {
        self.reconnector.enter_pull();
        self.publish_status();
        info!(
            session_id = %self.shared.id,
            interval_ms = self.policy.poll_interval.as_millis() as u64,
            "polling"
        );
        self.shared.emit(SessionEvent::Connected {
            transport: TransportKind::Pull,
        });

        let mut ticker = time::interval(self.policy.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reprobe = match (&self.push, self.policy.reprobe_interval) {
            (Some(_), Some(every)) => Some(time::interval_at(Instant::now() + every, every)),
            _ => None,
        };

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sync_once().await,
                _ = tick_optional(&mut reprobe) => {
                    if let Some(stream) = self.reprobe().await {
                        return Next::Push(Some(stream));
                    }
                }
            }
        }
    }

    async fn reprobe(&mut self) -> Option<Box<dyn PushStream>> {
        let push = self.push.clone()?;
        debug!(session_id = %self.shared.id, "re-probing push");
        match push.open(&self.membership, self.marks.current()).await {
            Ok(stream) => {
                info!(session_id = %self.shared.id, "push reachable again, leaving pull");
                Some(stream)
            }
            Err(e) => {
                debug!(session_id = %self.shared.id, error = %e, "push still unavailable");
                None
            }
        }
    }

    /// One sync call through the pull transport, delivering whatever is new.
    async fn sync_once(&mut self) {
        match self.pull.poll(&self.membership, self.marks.current()).await {
            Ok(batch) => {
                self.sync_succeeded();
                self.deliver_batch(batch);
            }
            Err(e) => self.sync_failed(e),
        }
    }

    fn deliver_batch(&mut self, mut batch: SyncBatch) {
        self.marks.filter_fresh(&mut batch);
        if batch.is_empty() {
            return;
        }
        let SyncBatch {
            content,
            state,
            watermarks,
            truncated,
        } = batch;
        if self.hand_off(content, state, watermarks, TransportKind::Pull) {
            for kind in StreamKind::ALL {
                let lane_truncated = match kind {
                    StreamKind::Content => truncated.content,
                    StreamKind::State => truncated.state,
                };
                if lane_truncated {
                    info!(session_id = %self.shared.id, %kind, "older history truncated");
                    self.shared.emit(SessionEvent::Truncated { kind });
                }
            }
        }
    }

    /// Give messages to the sink and advance the watermarks.
    ///
    /// Without a sink, or once disposed, nothing is handed over and the
    /// watermarks stay put so the messages are fetched again later.
    fn hand_off(
        &mut self,
        content: Vec<Message>,
        state: Vec<Message>,
        watermarks: Watermarks,
        transport: TransportKind,
    ) -> bool {
        if self.shared.is_disposed() {
            return false;
        }
        let Some(sink) = self.shared.sink.load_full() else {
            debug!(session_id = %self.shared.id, "no sink registered, holding delivery");
            return false;
        };

        debug!(
            session_id = %self.shared.id,
            content = content.len(),
            state = state.len(),
            %transport,
            "delivering"
        );
        (sink.0)(Delivery {
            session_id: self.shared.id.clone(),
            channel_id: self.shared.channel.clone(),
            content,
            state,
            watermarks,
            transport,
        });
        self.marks = WatermarkStore::new(self.marks.current().max(watermarks));
        self.publish_status();
        true
    }

    fn sync_succeeded(&mut self) {
        if self.sync_failures >= self.policy.sync_failure_threshold {
            info!(session_id = %self.shared.id, "sync recovered");
            self.shared.emit(SessionEvent::Recovered);
        }
        if self.sync_failures > 0 {
            self.sync_failures = 0;
            self.publish_status();
        }
    }

    fn sync_failed(&mut self, error: ChanlinkError) {
        self.sync_failures += 1;
        warn!(
            session_id = %self.shared.id,
            consecutive_failures = self.sync_failures,
            error = %error,
            "sync failed"
        );
        if self.sync_failures == self.policy.sync_failure_threshold {
            warn!(session_id = %self.shared.id, "session degraded");
            self.shared.emit(SessionEvent::Degraded {
                consecutive_failures: self.sync_failures,
                error: error.to_string(),
            });
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let link_state = self.reconnector.state();
        let transport = match link_state {
            LinkState::Push => Some(TransportKind::Push),
            LinkState::Pull => Some(TransportKind::Pull),
            _ => None,
        };
        let watermarks = self.marks.current();
        let retry_count = self.reconnector.failures();
        let sync_failures = self.sync_failures;
        self.shared.status.send_modify(|status| {
            status.link_state = link_state;
            status.transport = transport;
            status.retry_count = retry_count;
            status.watermarks = watermarks;
            status.consecutive_sync_failures = sync_failures;
        });
    }
}

async fn tick_optional(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use chanlink_test_utils::{ManualPushTransport, TestHarness};
    use tracing_test::traced_test;

    use super::*;
    use crate::TransportManager;

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn malformed_frames_are_dropped_without_closing_the_stream() {
        let harness = TestHarness::new().await.unwrap();
        let local = Arc::new(harness.transport());
        let (manual, controller) = ManualPushTransport::new();
        let manager = TransportManager::builder(local.clone(), local)
            .push(Arc::new(manual))
            .build();

        let handle = manager.attach(&harness.channel, "agent-a").await.unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        manager
            .on_message(&handle, move |d: Delivery| {
                sink.lock().unwrap().extend(d.content.into_iter().map(|m| m.position));
            })
            .unwrap();
        controller.wait_for_opens(1).await;

        controller.send_error(ChanlinkError::ProtocolViolation("expected value".into()));
        harness.post("still flowing").await.unwrap();
        let message = harness
            .hub
            .sync(&harness.channel, Watermarks::ZERO)
            .await
            .unwrap()
            .content
            .remove(0);
        controller.send_frame(Frame::Message { message });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(controller.opens(), 1);
        assert_eq!(handle.status().link_state, LinkState::Push);
        assert!(logs_contain("dropping malformed frame"));
        manager.detach(&handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn deliveries_wait_for_a_sink() {
        let harness = TestHarness::new().await.unwrap();
        let local = Arc::new(harness.transport());
        let manager = TransportManager::builder(local.clone(), local).build();
        harness.post_many(2).await.unwrap();

        let handle = manager.attach(&harness.channel, "agent-a").await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.watermarks(), Watermarks::ZERO);

        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        manager
            .on_message(&handle, move |d: Delivery| *sink.lock().unwrap() += d.len())
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(*seen.lock().unwrap(), 2);
        assert_eq!(handle.watermarks(), Watermarks::new(2, 0));
        manager.detach(&handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn server_frames_become_session_events() {
        let harness = TestHarness::new().await.unwrap();
        let local = Arc::new(harness.transport());
        let (manual, controller) = ManualPushTransport::new();
        let manager = TransportManager::builder(local.clone(), local)
            .push(Arc::new(manual))
            .build();
        let handle = manager.attach(&harness.channel, "agent-a").await.unwrap();
        let mut events = manager.events(&handle);
        controller.wait_for_opens(1).await;

        controller.send_frame(Frame::SystemStatus {
            status: "maintenance".into(),
        });
        controller.send_frame(Frame::Error {
            message: "slow down".into(),
        });

        let mut seen = Vec::new();
        while seen.len() < 2 {
            match events.recv().await.unwrap() {
                e @ (SessionEvent::SystemStatus(_) | SessionEvent::RemoteError(_)) => seen.push(e),
                _ => {}
            }
        }
        assert_eq!(
            seen,
            vec![
                SessionEvent::SystemStatus("maintenance".into()),
                SessionEvent::RemoteError("slow down".into()),
            ]
        );
        manager.detach(&handle).await;
    }
}
