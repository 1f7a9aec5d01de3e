// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! What the membership feed tells the schema subsystem about its peers.

use crate::net::{CURRENT_PROTOCOL_VERSION, ProtocolVersion};
use crate::{PlainNodeId, SchemaVersion};

/// Liveness of a peer as judged by the failure detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum NodeLiveness {
    Alive,
    Suspect,
    Dead,
}

impl NodeLiveness {
    pub fn is_alive(&self) -> bool {
        matches!(self, NodeLiveness::Alive)
    }
}

/// What the membership feed currently says about one peer.
///
/// Rebuilt entirely from feed events; never persisted.
#[derive(Debug, Clone)]
pub struct PeerSchemaState {
    pub node_id: PlainNodeId,
    /// Last schema version the peer advertised, if it advertised one yet.
    pub schema_version: Option<SchemaVersion>,
    pub liveness: NodeLiveness,
    pub protocol_version: ProtocolVersion,
    /// Non-voting members observe the cluster but never serve definitions.
    pub is_observer: bool,
}

impl PeerSchemaState {
    /// A peer on a newer major may hold definitions this node cannot decode,
    /// and observers never serve definitions.
    pub fn eligible_for_pull(&self) -> bool {
        self.protocol_version <= CURRENT_PROTOCOL_VERSION && !self.is_observer
    }

    /// A peer on an older major cannot decode the current batch format.
    pub fn eligible_for_push(&self) -> bool {
        self.protocol_version >= CURRENT_PROTOCOL_VERSION
    }
}

/// Membership feed event, one variant per liveness/application-state change
/// kind. Only version advertisements and peers coming back alive carry
/// behavior in the schema subsystem; the remaining kinds exist so that
/// subscribers match the feed exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GossipEvent {
    /// A peer advertised a schema version, either for the first time or
    /// because it changed.
    VersionChanged {
        node: PlainNodeId,
        version: SchemaVersion,
    },
    Alive { node: PlainNodeId },
    Dead { node: PlainNodeId },
    Restarted { node: PlainNodeId },
    Removed { node: PlainNodeId },
    Joined { node: PlainNodeId },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(protocol_version: ProtocolVersion, is_observer: bool) -> PeerSchemaState {
        PeerSchemaState {
            node_id: PlainNodeId::new(2),
            schema_version: None,
            liveness: NodeLiveness::Alive,
            protocol_version,
            is_observer,
        }
    }

    #[test]
    fn pull_eligibility() {
        assert!(peer(ProtocolVersion::V1, false).eligible_for_pull());
        assert!(peer(CURRENT_PROTOCOL_VERSION, false).eligible_for_pull());
        assert!(!peer(ProtocolVersion::V3, false).eligible_for_pull());
        assert!(!peer(CURRENT_PROTOCOL_VERSION, true).eligible_for_pull());
    }

    #[test]
    fn push_eligibility() {
        assert!(!peer(ProtocolVersion::V1, false).eligible_for_push());
        assert!(peer(CURRENT_PROTOCOL_VERSION, false).eligible_for_push());
        assert!(peer(ProtocolVersion::V3, false).eligible_for_push());
    }
}
