// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

/// Unique identifier of a cluster member, assigned when the node first joins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
#[display("N{_0}")]
pub struct PlainNodeId(u32);

impl PlainNodeId {
    pub const fn new(id: u32) -> PlainNodeId {
        PlainNodeId(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}
