// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use starling_types::PlainNodeId;
use starling_types::cluster::GossipEvent;

use crate::MembershipView;

use super::scheduler::SyncScheduler;

/// Subscriber to the membership feed.
///
/// Divergence is detected purely through schema-version advertisement: a
/// changed version key and a peer coming back alive with a version already
/// set are the only events acted upon. Every other liveness transition is a
/// deliberate no-op, as are events about the local node itself.
pub struct GossipWatcher {
    scheduler: SyncScheduler,
    membership: Arc<dyn MembershipView>,
    my_node_id: PlainNodeId,
    events: mpsc::Receiver<GossipEvent>,
}

impl GossipWatcher {
    /// The returned sender is handed to the membership feed; the watcher runs
    /// until the last sender is dropped.
    pub fn new(
        scheduler: SyncScheduler,
        membership: Arc<dyn MembershipView>,
        queue_length: usize,
    ) -> (mpsc::Sender<GossipEvent>, Self) {
        let (events_sender, events) = mpsc::channel(queue_length);
        let my_node_id = membership.my_node_id();
        (
            events_sender,
            GossipWatcher {
                scheduler,
                membership,
                my_node_id,
                events,
            },
        )
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        debug!("Gossip watcher started");
        while let Some(event) = self.events.recv().await {
            self.on_event(event);
        }
        debug!("Gossip watcher stopped");
        Ok(())
    }

    fn on_event(&self, event: GossipEvent) {
        match event {
            GossipEvent::VersionChanged { node, version } => {
                // own advertisements loop back through the feed
                if node == self.my_node_id {
                    return;
                }
                self.scheduler.maybe_sync(node, version);
            }
            GossipEvent::Alive { node } => {
                if node == self.my_node_id {
                    return;
                }
                // a peer coming back may have changed its definitions while
                // it was unreachable
                if let Some(version) = self
                    .membership
                    .peer_state(node)
                    .and_then(|state| state.schema_version)
                {
                    self.scheduler.maybe_sync(node, version);
                }
            }
            // endpoint lifecycle alone says nothing about definitions
            GossipEvent::Dead { .. }
            | GossipEvent::Restarted { .. }
            | GossipEvent::Removed { .. }
            | GossipEvent::Joined { .. } => {}
        }
    }
}
