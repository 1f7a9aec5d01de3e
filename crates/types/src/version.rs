// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;
use std::str::FromStr;

use xxhash_rust::xxh3::Xxh3;

/// Content fingerprint of a node's full definition set.
///
/// Derived deterministically from the sorted set of definitions a node holds,
/// tombstones included: two nodes holding the same set always compute the same
/// version. That is what lets divergence be detected by comparing advertised
/// versions instead of exchanging full state. Only equality is meaningful;
/// versions carry no order.
///
/// The membership feed carries versions string-encoded in uuid form, which is
/// also how they render in logs.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(u128);

impl SchemaVersion {
    /// Advertised by nodes that have not loaded or received any definitions.
    pub const EMPTY: SchemaVersion = SchemaVersion(0);

    pub const fn from_u128(value: u128) -> Self {
        SchemaVersion(value)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0).hyphenated())
    }
}

impl fmt::Debug for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaVersion({self})")
    }
}

impl FromStr for SchemaVersion {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SchemaVersion(uuid::Uuid::from_str(s)?.as_u128()))
    }
}

/// Streaming digest used to fingerprint a definition set.
///
/// Variable-length fields are length-framed so that adjacent fields cannot
/// alias each other.
#[derive(Default)]
pub struct SchemaVersionDigest(Xxh3);

impl SchemaVersionDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.0.update(&[value]);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.0.update(&value.to_be_bytes());
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_u64(value.len() as u64);
        self.0.update(value);
    }

    pub fn finish(self) -> SchemaVersion {
        SchemaVersion(self.0.digest128())
    }
}
