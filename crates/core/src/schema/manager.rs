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

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use starling_types::net::codec::CodecError;
use starling_types::net::{MessageEnvelope, SchemaMessage};
use starling_types::schema::Schema;
use starling_types::schema::mutation::MutationBatch;
use starling_types::{PlainNodeId, SchemaVersion};

use crate::options::SchemaOptions;
use crate::{MembershipView, NetworkSender};

use super::announce::SchemaWriter;
use super::listener::SchemaListeners;
use super::local::LocalSchema;
use super::migration::MigrationTask;
use super::scheduler::SyncScheduler;

pub(super) type CommandSender = mpsc::UnboundedSender<Command>;
pub(super) type CommandReceiver = mpsc::UnboundedReceiver<Command>;

pub(super) enum Command {
    /// Merge a batch into the local set; ack with the resulting version.
    ApplyBatch(
        MutationBatch,
        Option<oneshot::Sender<Result<SchemaVersion, CodecError>>>,
    ),
    /// Pull the full definition set from a peer and merge it.
    PullFrom(PlainNodeId, Option<oneshot::Sender<()>>),
    /// Drop every definition and return to the empty sentinel.
    Clear(oneshot::Sender<()>),
}

/// The single concurrency domain through which every definition batch passes.
///
/// A long-running task owning the local definition set. Locally announced
/// batches, batches pushed by peers, and migration pulls are all commands
/// handled one at a time, so no two batches are ever merged concurrently and
/// the derived version is never computed over a half-applied state. After a
/// merge that changed anything, the new version is re-advertised on the
/// membership feed and listeners are notified.
pub struct SchemaManager {
    local: LocalSchema,
    listeners: SchemaListeners,
    networking: Arc<dyn NetworkSender>,
    membership: Arc<dyn MembershipView>,
    options: SchemaOptions,
    self_sender: CommandSender,
    inbound: CommandReceiver,
    // Inbound network messages: pushed definition batches to merge, and pull
    // requests from peers to respond to.
    network_inbound: mpsc::Receiver<MessageEnvelope>,
    network_inbound_sender: mpsc::Sender<MessageEnvelope>,
}

impl SchemaManager {
    pub fn build(
        networking: Arc<dyn NetworkSender>,
        membership: Arc<dyn MembershipView>,
        options: SchemaOptions,
    ) -> Self {
        let (self_sender, inbound) = mpsc::unbounded_channel();
        let (network_inbound_sender, network_inbound) =
            mpsc::channel(options.network_queue_length);

        Self {
            local: LocalSchema::new(),
            listeners: SchemaListeners::default(),
            networking,
            membership,
            options,
            self_sender,
            inbound,
            network_inbound,
            network_inbound_sender,
        }
    }

    pub fn local_schema(&self) -> LocalSchema {
        self.local.clone()
    }

    pub fn listeners(&self) -> SchemaListeners {
        self.listeners.clone()
    }

    pub fn writer(&self) -> SchemaWriter {
        SchemaWriter::new(
            self.local.clone(),
            self.self_sender.clone(),
            self.networking.clone(),
            self.membership.clone(),
        )
    }

    /// Scheduler bound to this manager. The construction instant becomes the
    /// node's start time for the startup grace window.
    pub fn scheduler(&self) -> SyncScheduler {
        SyncScheduler::new(
            self.local.clone(),
            self.membership.clone(),
            self.self_sender.clone(),
            &self.options,
        )
    }

    pub fn network_inbound_sender(&self) -> mpsc::Sender<MessageEnvelope> {
        self.network_inbound_sender.clone()
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("Schema manager started");

        loop {
            tokio::select! {
                Some(cmd) = self.inbound.recv() => {
                    self.handle_command(cmd).await;
                }
                Some(envelope) = self.network_inbound.recv() => {
                    self.handle_network_message(envelope);
                }
                else => break,
            }
        }
        info!("Schema manager stopped");
        Ok(())
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::ApplyBatch(batch, callback) => {
                self.merge_batch(&batch, callback);
            }
            Command::PullFrom(target, callback) => {
                MigrationTask::new(target).run(self).await;
                if let Some(callback) = callback {
                    let _ = callback.send(());
                }
            }
            Command::Clear(callback) => {
                self.clear();
                let _ = callback.send(());
            }
        }
    }

    fn handle_network_message(&mut self, envelope: MessageEnvelope) {
        let (peer, message) = envelope.split();
        match message {
            SchemaMessage::DefinitionsRequest => {
                debug!(%peer, "Received definitions request");
                self.send_definitions(peer);
            }
            SchemaMessage::DefinitionsUpdate(batch) => {
                trace!(%peer, records = batch.len(), "Received definitions update");
                self.merge_batch(&batch, None);
            }
        }
    }

    /// Reply to a pull request with the full definition set, tombstones
    /// included, so that the puller reproduces this node's exact version.
    fn send_definitions(&self, to: PlainNodeId) {
        let batch = self.local.snapshot().to_mutations();
        debug!(peer = %to, version = %self.local.version(), "Sending definitions to peer");
        let networking = self.networking.clone();
        tokio::spawn(async move {
            if let Err(err) = networking
                .send(to, &SchemaMessage::DefinitionsUpdate(batch))
                .await
            {
                debug!(peer = %to, "Failed to send definitions to peer: {err}");
            }
        });
    }

    pub(super) fn merge_batch(
        &mut self,
        batch: &MutationBatch,
        callback: Option<oneshot::Sender<Result<SchemaVersion, CodecError>>>,
    ) {
        let mut next = Schema::clone(&self.local.snapshot());
        let result = match next.merge(batch) {
            Ok(outcome) if outcome.changed() => {
                let version = outcome.version();
                self.local.store(Arc::new(next));
                debug!(
                    %version,
                    previous = %outcome.previous_version(),
                    records = batch.len(),
                    "Merged definition batch",
                );
                self.membership.advertise_schema_version(version);
                // strictly after the change committed
                self.listeners.notify(&outcome);
                Ok(version)
            }
            Ok(outcome) => {
                trace!(version = %outcome.version(), "Definition batch was already applied");
                Ok(outcome.version())
            }
            Err(err) => {
                warn!("Discarding corrupt definition batch: {err}");
                Err(err)
            }
        };

        if let Some(callback) = callback {
            let _ = callback.send(result);
        }
    }

    fn clear(&mut self) {
        info!("Clearing local definitions");
        self.local.store(Arc::new(Schema::default()));
        self.membership.advertise_schema_version(SchemaVersion::EMPTY);
    }

    pub(super) fn networking(&self) -> &Arc<dyn NetworkSender> {
        &self.networking
    }

    pub(super) fn options(&self) -> &SchemaOptions {
        &self.options
    }
}

pub fn spawn_schema_manager(manager: SchemaManager) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(manager.run())
}
