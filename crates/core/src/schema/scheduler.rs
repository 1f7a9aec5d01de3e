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
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use starling_types::{PlainNodeId, SchemaVersion};

use crate::MembershipView;
use crate::options::SchemaOptions;

use super::local::LocalSchema;
use super::manager::{Command, CommandSender};

/// Decides, per divergence signal, whether to pull a peer's definitions now
/// or after the migration delay.
#[derive(Clone)]
pub struct SyncScheduler {
    local: LocalSchema,
    membership: Arc<dyn MembershipView>,
    submit: CommandSender,
    started_at: Instant,
    migration_delay: Duration,
}

impl SyncScheduler {
    pub(super) fn new(
        local: LocalSchema,
        membership: Arc<dyn MembershipView>,
        submit: CommandSender,
        options: &SchemaOptions,
    ) -> Self {
        SyncScheduler {
            local,
            membership,
            submit,
            started_at: Instant::now(),
            migration_delay: *options.migration_delay,
        }
    }

    /// Called with every schema version a peer advertises.
    ///
    /// Must never block: it runs on the event-delivery context, and a
    /// synchronous wait here deadlocks against a peer doing the same. Task
    /// submission is a channel send, and the task's result is deliberately
    /// not observed.
    pub fn maybe_sync(&self, node: PlainNodeId, their_version: SchemaVersion) {
        if their_version == self.local.version() {
            return;
        }
        if !self.should_pull_from(node) {
            trace!(peer = %node, "Ignoring schema version of ineligible peer");
            return;
        }

        if self.local.version().is_empty() || self.started_at.elapsed() < self.migration_delay {
            // bootstrapping or recently started; pull right away
            self.submit_migration_task(node);
        } else {
            // Several peers announcing overlapping changes in quick
            // succession would each trigger a pull; recheck once the dust
            // settles and pull at most once.
            debug!(
                peer = %node,
                version = %their_version,
                delay = ?self.migration_delay,
                "Deferring definitions pull",
            );
            let scheduler = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(scheduler.migration_delay).await;
                scheduler.recheck(node);
            });
        }
    }

    /// Deferred half of [`SyncScheduler::maybe_sync`]. Both sides may have
    /// moved while the delay ran, so only the current advertised and local
    /// versions count.
    fn recheck(&self, node: PlainNodeId) {
        let Some(state) = self.membership.peer_state(node) else {
            trace!(peer = %node, "Peer is gone, skipping deferred definitions pull");
            return;
        };
        let Some(their_version) = state.schema_version else {
            return;
        };
        if their_version == self.local.version() {
            trace!(peer = %node, "Already converged, skipping deferred definitions pull");
            return;
        }
        self.submit_migration_task(node);
    }

    fn should_pull_from(&self, node: PlainNodeId) -> bool {
        self.membership
            .peer_state(node)
            .is_some_and(|state| state.eligible_for_pull())
    }

    fn submit_migration_task(&self, node: PlainNodeId) {
        debug!(peer = %node, "Submitting migration task");
        let _ = self.submit.send(Command::PullFrom(node, None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use starling_types::net::ProtocolVersion;

    use super::super::test_util::{TestEnv, keyspace_batch, schema_of, version_of};

    #[test_log::test(tokio::test(start_paused = true))]
    async fn bootstrap_pull_is_immediate() {
        let env = TestEnv::spawn(PlainNodeId::new(1));
        let peer = PlainNodeId::new(2);
        let batch = keyspace_batch("ks1", 100);
        let expected = version_of(&batch);
        env.add_live_peer(peer, Some(expected));
        env.network.set_definitions(peer, batch);

        assert_eq!(SchemaVersion::EMPTY, env.local.version());
        env.scheduler.maybe_sync(peer, expected);

        let mut watch = env.local.watch();
        watch.wait_for(|version| *version == expected).await.unwrap();
        assert_eq!(1, env.network.pull_count());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn recently_started_node_pulls_immediately() {
        let env = TestEnv::spawn(PlainNodeId::new(1));
        let local = keyspace_batch("ks1", 100);
        env.push_from_peer(PlainNodeId::new(9), local.clone()).await;
        let mut watch = env.local.watch();
        watch.wait_for(|version| !version.is_empty()).await.unwrap();

        // uptime is still within the grace window
        let peer = PlainNodeId::new(2);
        let peer_schema = schema_of(&[local, keyspace_batch("ks2", 200)]);
        env.add_live_peer(peer, Some(peer_schema.version()));
        env.network.set_definitions(peer, peer_schema.to_mutations());

        env.scheduler.maybe_sync(peer, peer_schema.version());
        watch
            .wait_for(|version| *version == peer_schema.version())
            .await
            .unwrap();
        assert_eq!(1, env.network.pull_count());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn equal_versions_are_a_no_op() {
        let env = TestEnv::spawn(PlainNodeId::new(1));
        let peer = PlainNodeId::new(2);
        env.add_live_peer(peer, Some(SchemaVersion::EMPTY));

        env.scheduler.maybe_sync(peer, SchemaVersion::EMPTY);
        env.settle().await;
        assert_eq!(0, env.network.pull_count());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn ineligible_peers_are_ignored() {
        let env = TestEnv::spawn(PlainNodeId::new(1));
        let batch = keyspace_batch("ks1", 100);
        let version = version_of(&batch);

        let newer = PlainNodeId::new(2);
        env.add_peer_with(newer, Some(version), ProtocolVersion::V3, false);
        env.scheduler.maybe_sync(newer, version);

        let observer = PlainNodeId::new(3);
        env.add_peer_with(observer, Some(version), ProtocolVersion::V2, true);
        env.scheduler.maybe_sync(observer, version);

        let unknown = PlainNodeId::new(4);
        env.scheduler.maybe_sync(unknown, version);

        env.settle().await;
        assert_eq!(0, env.network.pull_count());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn debounced_pull_fires_when_still_diverged() {
        let env = TestEnv::spawn(PlainNodeId::new(1));
        let local = keyspace_batch("ks1", 100);
        env.push_from_peer(PlainNodeId::new(9), local.clone()).await;
        let mut watch = env.local.watch();
        watch.wait_for(|version| !version.is_empty()).await.unwrap();

        // move past the startup grace window
        tokio::time::advance(Duration::from_secs(120)).await;

        let peer = PlainNodeId::new(2);
        let peer_schema = schema_of(&[local, keyspace_batch("ks2", 200)]);
        env.add_live_peer(peer, Some(peer_schema.version()));
        env.network.set_definitions(peer, peer_schema.to_mutations());

        env.scheduler.maybe_sync(peer, peer_schema.version());
        env.settle().await;
        assert_eq!(0, env.network.pull_count(), "pull must be deferred");

        // the recheck fires after the migration delay and still sees skew
        tokio::time::sleep(Duration::from_secs(61)).await;
        watch
            .wait_for(|version| *version == peer_schema.version())
            .await
            .unwrap();
        assert_eq!(1, env.network.pull_count());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn debounced_pull_collapses_once_converged() {
        let env = TestEnv::spawn(PlainNodeId::new(1));
        let local = keyspace_batch("ks1", 100);
        env.push_from_peer(PlainNodeId::new(9), local.clone()).await;
        let mut watch = env.local.watch();
        watch.wait_for(|version| !version.is_empty()).await.unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;

        let peer = PlainNodeId::new(2);
        let peer_schema = schema_of(&[local, keyspace_batch("ks2", 200)]);
        env.add_live_peer(peer, Some(peer_schema.version()));

        env.scheduler.maybe_sync(peer, peer_schema.version());

        // another path (a push from the peer) brings us to its version before
        // the recheck fires
        env.push_from_peer(peer, peer_schema.to_mutations()).await;
        watch
            .wait_for(|version| *version == peer_schema.version())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        env.settle().await;
        assert_eq!(0, env.network.pull_count());
    }
}
