// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery properties of the sync protocol under arbitrary interleavings.

use std::sync::Arc;

use chanlink_core::{
    ChannelId, ChannelKind, Frame, MessageBody, Participant, PullTransport, PushTransport,
    ChannelLink, StateUpdate, Watermarks,
};
use chanlink_security::Validator;
use chanlink_storage::MemoryRegistry;
use chanlink_sync::{ChannelHub, LocalTransport, SyncOptions, WatermarkStore, sync};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn fixture() -> (Arc<ChannelHub>, ChannelId, Participant) {
    let hub = Arc::new(ChannelHub::new(
        Arc::new(MemoryRegistry::new()),
        Validator::default(),
    ));
    let channel = hub.create_channel("props", ChannelKind::General).await.unwrap();
    let p = hub.join(&channel, "agent-1", "").await.unwrap();
    (hub, channel, p)
}

fn body(is_state: bool, i: usize) -> MessageBody {
    if is_state {
        MessageBody::State(StateUpdate::Typing { active: i % 2 == 0 })
    } else {
        MessageBody::Content(format!("m{i}"))
    }
}

proptest! {
    /// Appends interleaved with syncs at arbitrary points deliver every
    /// message exactly once, in position order, per lane.
    #[test]
    fn no_loss_no_reorder_under_arbitrary_chunking(
        ops in prop::collection::vec((any::<bool>(), any::<bool>()), 1..60)
    ) {
        runtime().block_on(async {
            let (hub, channel, p) = fixture().await;
            let mut store = WatermarkStore::default();
            let (mut content, mut state) = (Vec::new(), Vec::new());
            let mut appended = (0u64, 0u64);

            for (i, (is_state, sync_now)) in ops.iter().copied().enumerate() {
                hub.post(&channel, &p.id, body(is_state, i)).await.unwrap();
                if is_state { appended.1 += 1 } else { appended.0 += 1 }
                if sync_now {
                    let batch = hub.sync(&channel, store.current()).await.unwrap();
                    store.commit_batch(&batch);
                    content.extend(batch.content.iter().map(|m| m.position));
                    state.extend(batch.state.iter().map(|m| m.position));
                }
            }
            let batch = hub.sync(&channel, store.current()).await.unwrap();
            content.extend(batch.content.iter().map(|m| m.position));
            state.extend(batch.state.iter().map(|m| m.position));

            prop_assert_eq!(content, (1..=appended.0).collect::<Vec<_>>());
            prop_assert_eq!(state, (1..=appended.1).collect::<Vec<_>>());
            Ok(())
        })?;
    }

    /// Syncing again with the returned watermarks is an empty no-op.
    #[test]
    fn sync_is_idempotent(count in 0usize..30, wm in 0u64..40) {
        runtime().block_on(async {
            let (hub, channel, p) = fixture().await;
            for i in 0..count {
                hub.post(&channel, &p.id, body(false, i)).await.unwrap();
            }
            let registry = hub.registry().as_ref();
            let since = Watermarks::new(wm, 0);
            let first = sync(registry, &channel, since, &SyncOptions::default()).await.unwrap();
            let again = sync(registry, &channel, first.watermarks, &SyncOptions::default()).await.unwrap();
            prop_assert!(again.is_empty());
            prop_assert_eq!(again.watermarks, first.watermarks);
            prop_assert!(first.watermarks.content >= wm);
            Ok(())
        })?;
    }

    /// Switching from push to pull mid-stream neither drops nor repeats messages.
    #[test]
    fn push_to_pull_failover_is_exact(total in 1usize..25, cut in 0usize..25) {
        runtime().block_on(async {
            let (hub, channel, _) = fixture().await;
            let transport = LocalTransport::new(hub.clone());
            let membership = transport.join(&channel, "agent-2", "").await.unwrap();
            for i in 0..total {
                transport.publish(&membership, body(false, i)).await.unwrap();
            }

            let mut store = WatermarkStore::default();
            let mut delivered = Vec::new();
            let mut stream = transport.open(&membership, Watermarks::ZERO).await.unwrap();
            while delivered.len() < cut.min(total) {
                match stream.next_frame().await.unwrap() {
                    Some(Frame::Message { message }) => {
                        store.commit(&message);
                        delivered.push(message.position);
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            stream.close().await;

            let batch = transport.poll(&membership, store.current()).await.unwrap();
            delivered.extend(batch.content.iter().map(|m| m.position));
            prop_assert_eq!(delivered, (1..=total as u64).collect::<Vec<_>>());
            Ok(())
        })?;
    }
}
