// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_trait::async_trait;

use starling_types::PlainNodeId;
use starling_types::net::SchemaMessage;
use starling_types::schema::mutation::MutationBatch;

use crate::ShutdownError;

#[derive(Debug, thiserror::Error)]
pub enum NetworkSendError {
    #[error("unknown node: {0}")]
    UnknownNode(PlainNodeId),
    #[error("peer {0} is unreachable: {1}")]
    Unreachable(PlainNodeId, String),
    #[error("request to peer {0} timed out")]
    Timeout(PlainNodeId),
    #[error("operation aborted, node is shutting down")]
    Shutdown(#[from] ShutdownError),
}

/// Access to node-to-node networking infrastructure.
///
/// Delivery guarantees, retries, and framing below the message payload belong
/// to the transport implementing this trait.
#[async_trait]
pub trait NetworkSender: Send + Sync + 'static {
    /// One-way, best-effort delivery of a message to a peer.
    async fn send(&self, to: PlainNodeId, message: &SchemaMessage)
    -> Result<(), NetworkSendError>;

    /// Ask a peer for its full definition set and wait for the reply.
    async fn request_definitions(
        &self,
        from: PlainNodeId,
    ) -> Result<MutationBatch, NetworkSendError>;
}
