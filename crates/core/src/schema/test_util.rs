// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};

use starling_types::cluster::{GossipEvent, NodeLiveness, PeerSchemaState};
use starling_types::net::{CURRENT_PROTOCOL_VERSION, MessageEnvelope, ProtocolVersion, SchemaMessage};
use starling_types::schema::Schema;
use starling_types::schema::definitions::KeyspaceDef;
use starling_types::schema::mutation::{MutationBatch, SchemaMutation};
use starling_types::time::MicrosSinceEpoch;
use starling_types::{PlainNodeId, SchemaVersion};

use crate::options::SchemaOptions;
use crate::{MembershipView, NetworkSendError, NetworkSender, SchemaStorage, StorageError};

use super::announce::SchemaWriter;
use super::gossip::GossipWatcher;
use super::listener::{SchemaListener, SchemaListeners};
use super::local::LocalSchema;
use super::manager::{SchemaManager, spawn_schema_manager};
use super::scheduler::SyncScheduler;

pub(crate) fn keyspace_batch(name: &str, ts: u64) -> MutationBatch {
    MutationBatch::new(vec![SchemaMutation::create_keyspace(
        MicrosSinceEpoch::new(ts),
        &KeyspaceDef::new(name),
    )])
}

pub(crate) fn schema_of(batches: &[MutationBatch]) -> Schema {
    let mut schema = Schema::default();
    for batch in batches {
        schema.merge(batch).expect("test batches are well-formed");
    }
    schema
}

pub(crate) fn version_of(batch: &MutationBatch) -> SchemaVersion {
    schema_of(std::slice::from_ref(batch)).version()
}

pub(crate) struct MockNetworkSender {
    sent: Mutex<Vec<(PlainNodeId, SchemaMessage)>>,
    definitions: Mutex<ahash::HashMap<PlainNodeId, MutationBatch>>,
    pull_count: AtomicUsize,
    hold: AtomicBool,
    gate: Semaphore,
}

impl Default for MockNetworkSender {
    fn default() -> Self {
        MockNetworkSender {
            sent: Mutex::default(),
            definitions: Mutex::default(),
            pull_count: AtomicUsize::new(0),
            hold: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }
}

impl MockNetworkSender {
    /// Register the batch a peer serves on pull requests.
    pub fn set_definitions(&self, node: PlainNodeId, batch: MutationBatch) {
        self.definitions.lock().insert(node, batch);
    }

    pub fn sent(&self) -> Vec<(PlainNodeId, SchemaMessage)> {
        self.sent.lock().clone()
    }

    pub fn pull_count(&self) -> usize {
        self.pull_count.load(Ordering::SeqCst)
    }

    /// Make `send` block until [`MockNetworkSender::release_sends`].
    pub fn hold_sends(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_sends(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.gate.add_permits(1024);
    }

    pub async fn wait_for_sent(&self, count: usize) -> Vec<(PlainNodeId, SchemaMessage)> {
        for _ in 0..1000 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} sent messages, got {:?}", self.sent());
    }
}

#[async_trait]
impl NetworkSender for MockNetworkSender {
    async fn send(
        &self,
        to: PlainNodeId,
        message: &SchemaMessage,
    ) -> Result<(), NetworkSendError> {
        if self.hold.load(Ordering::SeqCst) {
            let _permit = self.gate.acquire().await.expect("gate never closes");
        }
        self.sent.lock().push((to, message.clone()));
        Ok(())
    }

    async fn request_definitions(
        &self,
        from: PlainNodeId,
    ) -> Result<MutationBatch, NetworkSendError> {
        self.pull_count.fetch_add(1, Ordering::SeqCst);
        self.definitions
            .lock()
            .get(&from)
            .cloned()
            .ok_or_else(|| NetworkSendError::Unreachable(from, "no definitions registered".into()))
    }
}

pub(crate) struct MockMembership {
    my_node_id: PlainNodeId,
    peers: Mutex<BTreeMap<PlainNodeId, PeerSchemaState>>,
    advertised: Mutex<Vec<SchemaVersion>>,
}

impl MockMembership {
    pub fn new(my_node_id: PlainNodeId) -> Self {
        MockMembership {
            my_node_id,
            peers: Mutex::new(BTreeMap::new()),
            advertised: Mutex::new(Vec::new()),
        }
    }

    pub fn upsert_peer(&self, state: PeerSchemaState) {
        self.peers.lock().insert(state.node_id, state);
    }

    /// Every version this node advertised, in order.
    pub fn advertised(&self) -> Vec<SchemaVersion> {
        self.advertised.lock().clone()
    }
}

impl MembershipView for MockMembership {
    fn my_node_id(&self) -> PlainNodeId {
        self.my_node_id
    }

    fn live_members(&self) -> Vec<PlainNodeId> {
        let mut members = vec![self.my_node_id];
        members.extend(
            self.peers
                .lock()
                .values()
                .filter(|state| state.liveness.is_alive())
                .map(|state| state.node_id),
        );
        members
    }

    fn peer_state(&self, node: PlainNodeId) -> Option<PeerSchemaState> {
        self.peers.lock().get(&node).cloned()
    }

    fn advertise_schema_version(&self, version: SchemaVersion) {
        self.advertised.lock().push(version);
    }
}

#[derive(Default)]
pub(crate) struct MockStorage {
    fail: bool,
    truncations: AtomicUsize,
}

impl MockStorage {
    pub fn failing() -> Self {
        MockStorage {
            fail: true,
            truncations: AtomicUsize::new(0),
        }
    }

    pub fn truncations(&self) -> usize {
        self.truncations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaStorage for MockStorage {
    async fn truncate_definitions(&self) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "definition tables are not writable",
            )));
        }
        self.truncations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl SchemaListener for RecordingListener {
    fn on_create_keyspace(&self, keyspace: &str) {
        self.record(format!("create keyspace {keyspace}"));
    }
    fn on_update_keyspace(&self, keyspace: &str) {
        self.record(format!("update keyspace {keyspace}"));
    }
    fn on_drop_keyspace(&self, keyspace: &str) {
        self.record(format!("drop keyspace {keyspace}"));
    }
    fn on_create_table(&self, keyspace: &str, table: &str) {
        self.record(format!("create table {keyspace}.{table}"));
    }
    fn on_update_table(&self, keyspace: &str, table: &str) {
        self.record(format!("update table {keyspace}.{table}"));
    }
    fn on_drop_table(&self, keyspace: &str, table: &str) {
        self.record(format!("drop table {keyspace}.{table}"));
    }
    fn on_create_user_type(&self, keyspace: &str, name: &str) {
        self.record(format!("create user type {keyspace}.{name}"));
    }
    fn on_update_user_type(&self, keyspace: &str, name: &str) {
        self.record(format!("update user type {keyspace}.{name}"));
    }
    fn on_drop_user_type(&self, keyspace: &str, name: &str) {
        self.record(format!("drop user type {keyspace}.{name}"));
    }
}

/// A schema manager wired to mocks, already running.
pub(crate) struct TestEnv {
    pub network: Arc<MockNetworkSender>,
    pub membership: Arc<MockMembership>,
    pub local: LocalSchema,
    pub writer: SchemaWriter,
    pub scheduler: SyncScheduler,
    pub listeners: SchemaListeners,
    pub network_inbound: mpsc::Sender<MessageEnvelope>,
}

impl TestEnv {
    pub fn spawn(my_node_id: PlainNodeId) -> Self {
        let network = Arc::new(MockNetworkSender::default());
        let membership = Arc::new(MockMembership::new(my_node_id));
        let manager = SchemaManager::build(
            network.clone(),
            membership.clone(),
            SchemaOptions::default(),
        );
        let env = TestEnv {
            network,
            membership,
            local: manager.local_schema(),
            writer: manager.writer(),
            scheduler: manager.scheduler(),
            listeners: manager.listeners(),
            network_inbound: manager.network_inbound_sender(),
        };
        spawn_schema_manager(manager);
        env
    }

    pub fn add_live_peer(&self, node: PlainNodeId, version: Option<SchemaVersion>) {
        self.add_peer_with(node, version, CURRENT_PROTOCOL_VERSION, false);
    }

    pub fn add_peer_with(
        &self,
        node: PlainNodeId,
        version: Option<SchemaVersion>,
        protocol_version: ProtocolVersion,
        is_observer: bool,
    ) {
        self.membership.upsert_peer(PeerSchemaState {
            node_id: node,
            schema_version: version,
            liveness: NodeLiveness::Alive,
            protocol_version,
            is_observer,
        });
    }

    pub async fn push_from_peer(&self, peer: PlainNodeId, batch: MutationBatch) {
        self.network_inbound
            .send(MessageEnvelope::new(
                peer,
                SchemaMessage::DefinitionsUpdate(batch),
            ))
            .await
            .expect("schema manager is running");
    }

    pub fn spawn_watcher(&self) -> mpsc::Sender<GossipEvent> {
        let (events, watcher) =
            GossipWatcher::new(self.scheduler.clone(), self.membership.clone(), 16);
        tokio::spawn(watcher.run());
        events
    }

    /// Give spawned tasks a chance to run without advancing time.
    pub async fn settle(&self) {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }
}
