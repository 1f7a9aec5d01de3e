// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

pub mod codec;

use std::fmt;

use crate::PlainNodeId;
use crate::schema::mutation::MutationBatch;

use self::codec::Targeted;

/// Major version of the inter-node protocol a node speaks, advertised on the
/// membership feed. Definitions are never pulled from a node with a newer
/// major nor pushed to a node with an older one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(u8)]
pub enum ProtocolVersion {
    V1 = 1,
    V2 = 2,
    /// Next major; nodes may advertise it during a rolling upgrade before it
    /// becomes the default.
    V3 = 3,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", *self as u8)
    }
}

pub static MIN_SUPPORTED_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V1;
pub static CURRENT_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V2;

/// Routing target of a message going through the inter-node transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TargetName {
    SchemaDefinitions,
}

/// Messages exchanged by the schema subsystem.
///
/// Delivery guarantees, retries and framing below the message payload belong
/// to the transport.
#[derive(Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
pub enum SchemaMessage {
    /// Ask a peer for its full definition set. Carries no payload.
    DefinitionsRequest,
    /// A batch of definition changes: pushed to live peers after a local
    /// change, or returned in response to [`SchemaMessage::DefinitionsRequest`].
    DefinitionsUpdate(MutationBatch),
}

impl Targeted for SchemaMessage {
    const TARGET: TargetName = TargetName::SchemaDefinitions;

    fn kind(&self) -> &'static str {
        self.into()
    }
}

/// A message paired with the peer it came from.
#[derive(Debug)]
pub struct MessageEnvelope {
    peer: PlainNodeId,
    message: SchemaMessage,
}

impl MessageEnvelope {
    pub fn new(peer: PlainNodeId, message: SchemaMessage) -> Self {
        MessageEnvelope { peer, message }
    }

    pub fn peer(&self) -> PlainNodeId {
        self.peer
    }

    pub fn split(self) -> (PlainNodeId, SchemaMessage) {
        (self.peer, self.message)
    }
}
