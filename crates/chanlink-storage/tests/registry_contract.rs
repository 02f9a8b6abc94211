// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The same behavioral checks run against every registry backend.

use std::sync::Arc;

use chanlink_core::{
    ChanlinkError, ChannelKind, MessageBody, PresenceStatus, Registry, StateUpdate, StreamKind,
};
use chanlink_storage::{MemoryRegistry, SqliteRegistry};
use tempfile::tempdir;

async fn lanes_are_independent_and_ordered(registry: &dyn Registry) {
    let channel = registry
        .create_channel("ops", ChannelKind::Topic)
        .await
        .unwrap();
    let alice = registry
        .create_or_get_participant("tok-alice", "Alice")
        .await
        .unwrap();
    registry.add_member(&alice.id, &channel).await.unwrap();
    // Second add is a no-op.
    registry.add_member(&alice.id, &channel).await.unwrap();

    for i in 1..=3 {
        let pos = registry
            .append_message(&channel, &alice.id, MessageBody::Content(format!("m{i}")))
            .await
            .unwrap();
        assert_eq!(pos, i);
    }
    let state_pos = registry
        .append_message(
            &channel,
            &alice.id,
            MessageBody::State(StateUpdate::Presence {
                status: PresenceStatus::Online,
            }),
        )
        .await
        .unwrap();
    assert_eq!(state_pos, 1);

    let content = registry
        .fetch_since(&channel, StreamKind::Content, 1)
        .await
        .unwrap();
    let positions: Vec<_> = content.iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![2, 3]);
    assert_eq!(content[1].body, MessageBody::Content("m3".into()));

    let state = registry
        .fetch_since(&channel, StreamKind::State, 0)
        .await
        .unwrap();
    assert_eq!(state.len(), 1);
    assert_eq!(state[0].sender_seq, 4);

    assert_eq!(
        registry
            .latest_position(&channel, StreamKind::Content)
            .await
            .unwrap(),
        3
    );

    let members = registry.members(&channel).await.unwrap();
    assert_eq!(members.len(), 1);
    assert!(members[0].channels.contains(&channel));

    let listed = registry.channel(&channel).await.unwrap().unwrap();
    assert_eq!(listed.kind, ChannelKind::Topic);
    assert!(listed.members.contains(&alice.id));
}

async fn lifecycle_rules(registry: &dyn Registry) {
    let channel = registry
        .create_channel("general", ChannelKind::General)
        .await
        .unwrap();
    let bob = registry
        .create_or_get_participant("tok-bob", "Bob")
        .await
        .unwrap();
    let again = registry
        .create_or_get_participant("tok-bob", "Robert")
        .await
        .unwrap();
    assert_eq!(bob.id, again.id);

    let err = registry
        .append_message(&channel, &bob.id, MessageBody::Content("x".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ChanlinkError::NotFound { kind: "membership", .. }));

    registry.add_member(&bob.id, &channel).await.unwrap();
    registry.deactivate_participant(&bob.id).await.unwrap();
    let err = registry
        .append_message(&channel, &bob.id, MessageBody::Content("x".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ChanlinkError::NotFound { kind: "participant", .. }));

    registry.retire_channel(&channel).await.unwrap();
    assert!(
        registry
            .list_channels()
            .await
            .unwrap()
            .iter()
            .all(|c| c.id != channel)
    );
    let carol = registry
        .create_or_get_participant("tok-carol", "Carol")
        .await
        .unwrap();
    let err = registry.add_member(&carol.id, &channel).await.unwrap_err();
    assert!(matches!(err, ChanlinkError::NotFound { kind: "channel", .. }));
}

#[tokio::test]
async fn memory_registry_contract() {
    let registry = MemoryRegistry::new();
    lanes_are_independent_and_ordered(&registry).await;
    lifecycle_rules(&registry).await;
}

#[tokio::test]
async fn sqlite_registry_contract() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/chanlink.db");
    let registry = SqliteRegistry::open(path.to_str().unwrap()).await.unwrap();
    lanes_are_independent_and_ordered(&registry).await;
    lifecycle_rules(&registry).await;
    registry.close().await.unwrap();
}

#[tokio::test]
async fn sqlite_history_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chanlink.db");
    let path = path.to_str().unwrap();

    let (channel, pid) = {
        let registry = SqliteRegistry::open(path).await.unwrap();
        let channel = registry
            .create_channel("durable", ChannelKind::General)
            .await
            .unwrap();
        let p = registry.create_or_get_participant("k", "K").await.unwrap();
        registry.add_member(&p.id, &channel).await.unwrap();
        registry
            .append_message(&channel, &p.id, MessageBody::Content("kept".into()))
            .await
            .unwrap();
        registry.close().await.unwrap();
        (channel, p.id)
    };

    let registry = SqliteRegistry::open(path).await.unwrap();
    let history = registry
        .fetch_since(&channel, StreamKind::Content, 0)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sender, pid);
    let next = registry
        .append_message(&channel, &pid, MessageBody::Content("next".into()))
        .await
        .unwrap();
    assert_eq!(next, 2);
}

#[tokio::test]
async fn concurrent_appends_get_distinct_positions() {
    let registry = Arc::new(SqliteRegistry::open_in_memory().await.unwrap());
    let channel = registry
        .create_channel("busy", ChannelKind::General)
        .await
        .unwrap();
    let p = registry.create_or_get_participant("k", "K").await.unwrap();
    registry.add_member(&p.id, &channel).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let (registry, channel, pid) = (registry.clone(), channel.clone(), p.id.clone());
        tasks.push(tokio::spawn(async move {
            registry
                .append_message(&channel, &pid, MessageBody::Content(format!("{i}")))
                .await
                .unwrap()
        }));
    }
    let mut positions = Vec::new();
    for t in tasks {
        positions.push(t.await.unwrap());
    }
    positions.sort_unstable();
    assert_eq!(positions, (1..=20).collect::<Vec<_>>());
}
