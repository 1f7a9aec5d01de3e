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

use tokio::sync::oneshot;
use tracing::{debug, info, trace};

use starling_types::errors::SchemaError;
use starling_types::net::SchemaMessage;
use starling_types::net::codec::CodecError;
use starling_types::schema::definitions::{KeyspaceDef, TableDef, TypeDef};
use starling_types::schema::mutation::{MutationBatch, ObjectKind, SchemaMutation};
use starling_types::time::MicrosSinceEpoch;
use starling_types::{PlainNodeId, SchemaVersion};

use crate::{MembershipView, NetworkSender, SchemaStorage, ShutdownError, StorageError};

use super::local::LocalSchema;
use super::manager::{Command, CommandSender};

#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("definition batch failed to apply: {0}")]
    Apply(#[from] CodecError),
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("failed truncating definition storage: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Originates definition changes on this node.
///
/// Every operation validates against the current local set before anything is
/// built or transmitted, merges through the schema manager, and only then
/// fans the batch out to live peers. The call returns once the local merge
/// completes; cluster-wide convergence is eventual.
#[derive(Clone)]
pub struct SchemaWriter {
    local: LocalSchema,
    sender: CommandSender,
    networking: Arc<dyn NetworkSender>,
    membership: Arc<dyn MembershipView>,
}

impl SchemaWriter {
    pub(super) fn new(
        local: LocalSchema,
        sender: CommandSender,
        networking: Arc<dyn NetworkSender>,
        membership: Arc<dyn MembershipView>,
    ) -> Self {
        SchemaWriter {
            local,
            sender,
            networking,
            membership,
        }
    }

    pub async fn create_keyspace(&self, def: KeyspaceDef) -> Result<SchemaVersion, AnnounceError> {
        let schema = self.local.snapshot();
        if schema.keyspace(&def.name).is_some() {
            return Err(SchemaError::already_exists(ObjectKind::Keyspace, def.name.as_str()).into());
        }
        info!("Create new keyspace: {}", def.name);
        let timestamp = MicrosSinceEpoch::now();
        self.announce(vec![SchemaMutation::create_keyspace(timestamp, &def)])
            .await
    }

    pub async fn update_keyspace(&self, def: KeyspaceDef) -> Result<SchemaVersion, AnnounceError> {
        let schema = self.local.snapshot();
        let Some(old) = schema.keyspace(&def.name) else {
            return Err(SchemaError::not_found(ObjectKind::Keyspace, def.name.as_str()).into());
        };
        old.validate_update(&def)?;
        info!("Update keyspace '{}'", def.name);
        let timestamp = MicrosSinceEpoch::now();
        self.announce(vec![SchemaMutation::update_keyspace(timestamp, &def)])
            .await
    }

    /// A keyspace takes its tables and types with it, all in one batch under
    /// one timestamp.
    pub async fn drop_keyspace(&self, name: &str) -> Result<SchemaVersion, AnnounceError> {
        let schema = self.local.snapshot();
        if schema.keyspace(name).is_none() {
            return Err(SchemaError::not_found(ObjectKind::Keyspace, name).into());
        }
        info!("Drop keyspace '{name}'");
        let timestamp = MicrosSinceEpoch::now();
        let mut mutations = Vec::new();
        for table in schema.tables_of(name) {
            mutations.push(SchemaMutation::drop_table(timestamp, &table.keyspace, &table.name));
        }
        for user_type in schema.user_types_of(name) {
            mutations.push(SchemaMutation::drop_type(
                timestamp,
                &user_type.keyspace,
                &user_type.name,
            ));
        }
        mutations.push(SchemaMutation::drop_keyspace(timestamp, name));
        self.announce(mutations).await
    }

    pub async fn create_table(&self, def: TableDef) -> Result<SchemaVersion, AnnounceError> {
        let schema = self.local.snapshot();
        if schema.keyspace(&def.keyspace).is_none() {
            return Err(SchemaError::not_found(ObjectKind::Keyspace, def.keyspace.as_str()).into());
        }
        if schema.table(&def.keyspace, &def.name).is_some() {
            return Err(SchemaError::already_exists(
                ObjectKind::Table,
                format!("{}.{}", def.keyspace, def.name),
            )
            .into());
        }
        info!("Create new table: {}.{}", def.keyspace, def.name);
        let timestamp = MicrosSinceEpoch::now();
        self.announce(vec![SchemaMutation::create_table(timestamp, &def)])
            .await
    }

    pub async fn update_table(&self, def: TableDef) -> Result<SchemaVersion, AnnounceError> {
        let schema = self.local.snapshot();
        let Some(old) = schema.table(&def.keyspace, &def.name) else {
            return Err(SchemaError::not_found(
                ObjectKind::Table,
                format!("{}.{}", def.keyspace, def.name),
            )
            .into());
        };
        old.validate_update(&def)?;
        info!("Update table '{}.{}'", def.keyspace, def.name);
        let timestamp = MicrosSinceEpoch::now();
        self.announce(vec![SchemaMutation::update_table(timestamp, &def)])
            .await
    }

    pub async fn drop_table(&self, keyspace: &str, name: &str) -> Result<SchemaVersion, AnnounceError> {
        let schema = self.local.snapshot();
        if schema.table(keyspace, name).is_none() {
            return Err(
                SchemaError::not_found(ObjectKind::Table, format!("{keyspace}.{name}")).into(),
            );
        }
        info!("Drop table '{keyspace}.{name}'");
        let timestamp = MicrosSinceEpoch::now();
        self.announce(vec![SchemaMutation::drop_table(timestamp, keyspace, name)])
            .await
    }

    pub async fn create_type(&self, def: TypeDef) -> Result<SchemaVersion, AnnounceError> {
        let schema = self.local.snapshot();
        if schema.user_type(&def.keyspace, &def.name).is_some() {
            return Err(SchemaError::already_exists(
                ObjectKind::UserType,
                format!("{}.{}", def.keyspace, def.name),
            )
            .into());
        }
        info!("Create new user type: {}.{}", def.keyspace, def.name);
        let timestamp = MicrosSinceEpoch::now();
        self.announce(vec![SchemaMutation::create_type(timestamp, &def)])
            .await
    }

    pub async fn update_type(&self, def: TypeDef) -> Result<SchemaVersion, AnnounceError> {
        let schema = self.local.snapshot();
        let Some(old) = schema.user_type(&def.keyspace, &def.name) else {
            return Err(SchemaError::not_found(
                ObjectKind::UserType,
                format!("{}.{}", def.keyspace, def.name),
            )
            .into());
        };
        old.validate_update(&def)?;
        info!("Update user type '{}.{}'", def.keyspace, def.name);
        let timestamp = MicrosSinceEpoch::now();
        self.announce(vec![SchemaMutation::update_type(timestamp, &def)])
            .await
    }

    pub async fn drop_type(&self, keyspace: &str, name: &str) -> Result<SchemaVersion, AnnounceError> {
        let schema = self.local.snapshot();
        if schema.user_type(keyspace, name).is_none() {
            return Err(
                SchemaError::not_found(ObjectKind::UserType, format!("{keyspace}.{name}")).into(),
            );
        }
        info!("Drop user type '{keyspace}.{name}'");
        let timestamp = MicrosSinceEpoch::now();
        self.announce(vec![SchemaMutation::drop_type(timestamp, keyspace, name)])
            .await
    }

    /// Merge locally, then fan out. Blocks on the local application only.
    async fn announce(
        &self,
        mutations: Vec<SchemaMutation>,
    ) -> Result<SchemaVersion, AnnounceError> {
        let batch = MutationBatch::new(mutations);
        let (ack, on_applied) = oneshot::channel();
        self.sender
            .send(Command::ApplyBatch(batch.clone(), Some(ack)))
            .map_err(|_| ShutdownError)?;
        let version = on_applied.await.map_err(|_| ShutdownError)??;
        self.push_to_live_peers(batch);
        Ok(version)
    }

    /// Best-effort fan-out of a freshly applied batch.
    ///
    /// The member snapshot is taken at announce time; peers that join later,
    /// are on an older protocol, or are unreachable detect the version skew
    /// through gossip and pull instead. Remote outcomes are never awaited by
    /// the announcing caller.
    fn push_to_live_peers(&self, batch: MutationBatch) {
        let my_node_id = self.membership.my_node_id();
        let peers: Vec<PlainNodeId> = self
            .membership
            .live_members()
            .into_iter()
            .filter(|node| *node != my_node_id)
            .filter(|node| match self.membership.peer_state(*node) {
                Some(state) if state.eligible_for_push() => true,
                Some(state) => {
                    trace!(
                        peer = %node,
                        protocol = %state.protocol_version,
                        "Not pushing definitions to peer on an older protocol",
                    );
                    false
                }
                None => false,
            })
            .collect();
        if peers.is_empty() {
            return;
        }

        let networking = self.networking.clone();
        tokio::spawn(async move {
            let message = SchemaMessage::DefinitionsUpdate(batch);
            for peer in peers {
                if let Err(err) = networking.send(peer, &message).await {
                    debug!(%peer, "Failed to push definitions: {err}");
                }
            }
        });
    }

    /// Operator-invoked: wipe the local definitions and resync from the first
    /// eligible live peer, if any is around.
    ///
    /// Truncation failure aborts the reset. Truncation and the in-memory
    /// clear are not transactional; a node that clears but finds no peer
    /// stays at the empty sentinel until the next divergence signal.
    pub async fn reset_local_schema(
        &self,
        storage: &dyn SchemaStorage,
    ) -> Result<(), ResetError> {
        info!("Starting local schema reset");

        debug!("Truncating definition tables");
        storage.truncate_definitions().await?;

        debug!("Clearing local definitions");
        let (ack, on_cleared) = oneshot::channel();
        self.sender
            .send(Command::Clear(ack))
            .map_err(|_| ShutdownError)?;
        on_cleared.await.map_err(|_| ShutdownError)?;

        let my_node_id = self.membership.my_node_id();
        for node in self.membership.live_members() {
            if node == my_node_id {
                continue;
            }
            let eligible = self
                .membership
                .peer_state(node)
                .is_some_and(|state| state.eligible_for_pull());
            if !eligible {
                continue;
            }
            debug!(peer = %node, "Requesting definitions from peer");
            let (ack, on_pulled) = oneshot::channel();
            self.sender
                .send(Command::PullFrom(node, Some(ack)))
                .map_err(|_| ShutdownError)?;
            on_pulled.await.map_err(|_| ShutdownError)?;
            break;
        }

        info!("Local schema reset is complete");
        Ok(())
    }
}
