// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use starling_types::cluster::PeerSchemaState;
use starling_types::{PlainNodeId, SchemaVersion};

/// Read/write surface of the membership feed.
///
/// The gossip protocol and failure detector behind this trait are their own
/// subsystem. The schema components read one application-state key per peer
/// (its advertised schema version) and publish the local one; liveness and
/// protocol versions come along for eligibility decisions.
pub trait MembershipView: Send + Sync + 'static {
    /// The local node's identity on the feed.
    fn my_node_id(&self) -> PlainNodeId;

    /// Weakly-consistent snapshot of the members currently considered alive,
    /// the local node included.
    fn live_members(&self) -> Vec<PlainNodeId>;

    /// Last known state of one peer, rebuilt entirely from feed events.
    fn peer_state(&self, node: PlainNodeId) -> Option<PeerSchemaState>;

    /// Publish the local node's schema version as application state.
    fn advertise_schema_version(&self, version: SchemaVersion);
}
