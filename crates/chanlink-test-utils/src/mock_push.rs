// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push transports with scripted behavior for deterministic testing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chanlink_core::{ChanlinkError, Frame, Membership, PushStream, PushTransport, Watermarks};
use tokio::sync::{Notify, mpsc};

/// A push transport that refuses a scripted number of connects.
///
/// Successful connects are forwarded to the wrapped transport. Without one,
/// every connect fails.
pub struct ScriptedPushTransport {
    inner: Option<Arc<dyn PushTransport>>,
    failures_remaining: AtomicU32,
    unreachable: AtomicBool,
    attempts: AtomicU32,
}

impl ScriptedPushTransport {
    /// Fail the first `failures` connects, then delegate to `inner`.
    pub fn failing(failures: u32, inner: Arc<dyn PushTransport>) -> Self {
        Self {
            inner: Some(inner),
            failures_remaining: AtomicU32::new(failures),
            unreachable: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
        }
    }

    /// Never connects.
    pub fn unreachable() -> Self {
        Self {
            inner: None,
            failures_remaining: AtomicU32::new(0),
            unreachable: AtomicBool::new(true),
            attempts: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` connects regardless of earlier scripting.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Toggle whether connects can succeed at all.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Number of connect attempts seen so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        if self.unreachable.load(Ordering::SeqCst) {
            return true;
        }
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PushTransport for ScriptedPushTransport {
    async fn open(
        &self,
        membership: &Membership,
        since: Watermarks,
    ) -> Result<Box<dyn PushStream>, ChanlinkError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.take_failure() {
            return Err(ChanlinkError::transport(format!(
                "scripted connect failure (attempt {attempt})"
            )));
        }
        match &self.inner {
            Some(inner) => inner.open(membership, since).await,
            None => Err(ChanlinkError::transport("no push endpoint")),
        }
    }
}

type Item = Result<Frame, ChanlinkError>;

/// A push transport whose streams are fed by a [`PushController`].
///
/// Every successful open replaces the controller's current stream.
pub struct ManualPushTransport {
    current: Arc<Mutex<Option<mpsc::UnboundedSender<Item>>>>,
    opens: Arc<AtomicU32>,
    since: Arc<Mutex<Vec<Watermarks>>>,
    opened: Arc<Notify>,
}

/// Test-side handle of a [`ManualPushTransport`].
#[derive(Clone)]
pub struct PushController {
    current: Arc<Mutex<Option<mpsc::UnboundedSender<Item>>>>,
    opens: Arc<AtomicU32>,
    since: Arc<Mutex<Vec<Watermarks>>>,
    opened: Arc<Notify>,
}

impl ManualPushTransport {
    pub fn new() -> (Self, PushController) {
        let current = Arc::new(Mutex::new(None));
        let opens = Arc::new(AtomicU32::new(0));
        let since = Arc::new(Mutex::new(Vec::new()));
        let opened = Arc::new(Notify::new());
        let controller = PushController {
            current: current.clone(),
            opens: opens.clone(),
            since: since.clone(),
            opened: opened.clone(),
        };
        (
            Self {
                current,
                opens,
                since,
                opened,
            },
            controller,
        )
    }
}

#[async_trait]
impl PushTransport for ManualPushTransport {
    async fn open(
        &self,
        _membership: &Membership,
        since: Watermarks,
    ) -> Result<Box<dyn PushStream>, ChanlinkError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        self.since
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(since);
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.opened.notify_waiters();
        Ok(Box::new(ManualPushStream { rx }))
    }
}

impl PushController {
    /// Queue a frame on the current stream. Returns false if no stream is open.
    pub fn send_frame(&self, frame: Frame) -> bool {
        self.push(Ok(frame))
    }

    /// Queue an error on the current stream.
    pub fn send_error(&self, error: ChanlinkError) -> bool {
        self.push(Err(error))
    }

    /// Close the current stream from the server side.
    pub fn close(&self) {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Number of streams opened so far.
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Watermarks passed to each open, oldest first.
    pub fn opened_from(&self) -> Vec<Watermarks> {
        self.since.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Wait until at least `count` streams have been opened.
    pub async fn wait_for_opens(&self, count: u32) {
        loop {
            let notified = self.opened.notified();
            if self.opens() >= count {
                return;
            }
            notified.await;
        }
    }

    fn push(&self, item: Item) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|tx| tx.send(item).is_ok())
    }
}

struct ManualPushStream {
    rx: mpsc::UnboundedReceiver<Item>,
}

#[async_trait]
impl PushStream for ManualPushStream {
    async fn next_frame(&mut self) -> Result<Option<Frame>, ChanlinkError> {
        match self.rx.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlink_core::{ChannelId, Participant, ParticipantId, SessionId};

    fn membership() -> Membership {
        Membership {
            session_id: SessionId::from("s"),
            channel_id: ChannelId::from("c"),
            participant: Participant {
                id: ParticipantId::from("p"),
                external_key: "p".into(),
                display_name: "p".into(),
                channels: Default::default(),
                sequence: 0,
                active: true,
            },
        }
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let (manual, _controller) = ManualPushTransport::new();
        let push = ScriptedPushTransport::failing(2, Arc::new(manual));
        assert!(push.open(&membership(), Watermarks::ZERO).await.is_err());
        assert!(push.open(&membership(), Watermarks::ZERO).await.is_err());
        assert!(push.open(&membership(), Watermarks::ZERO).await.is_ok());
        assert_eq!(push.attempts(), 3);
    }

    #[tokio::test]
    async fn unreachable_never_connects() {
        let push = ScriptedPushTransport::unreachable();
        for _ in 0..3 {
            assert!(push.open(&membership(), Watermarks::ZERO).await.is_err());
        }
        assert_eq!(push.attempts(), 3);
    }

    #[tokio::test]
    async fn controller_feeds_and_closes_the_stream() {
        let (manual, controller) = ManualPushTransport::new();
        let mut stream = manual
            .open(&membership(), Watermarks::new(2, 0))
            .await
            .unwrap();
        assert!(controller.send_frame(Frame::SystemStatus {
            status: "hello".into()
        }));
        assert!(matches!(
            stream.next_frame().await,
            Ok(Some(Frame::SystemStatus { .. }))
        ));
        controller.close();
        assert!(matches!(stream.next_frame().await, Ok(None)));
        assert!(!controller.send_frame(Frame::Error {
            message: "late".into()
        }));
        assert_eq!(controller.opened_from(), vec![Watermarks::new(2, 0)]);
    }
}
