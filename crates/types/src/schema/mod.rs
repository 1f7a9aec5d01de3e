// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The merged definition set a node holds and the merge that grows it.
//!
//! The merge is idempotent and commutative: records are keyed by object and
//! combined last-write-wins by timestamp, and drops leave tombstones behind so
//! that a drop observed late still beats the stale create it follows. Nodes
//! that receive the same records in any order, any number of times, end up
//! with the same set and therefore the same [`SchemaVersion`].

pub mod definitions;
pub mod mutation;

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::net::codec::CodecError;
use crate::time::MicrosSinceEpoch;
use crate::{SchemaVersion, SchemaVersionDigest};

use self::definitions::{KeyspaceDef, TableDef, TypeDef};
use self::mutation::{ChangeKind, MutationBatch, ObjectKind, QualifiedName, SchemaMutation, SchemaOp};

/// A decoded definition held in the merged set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaObject {
    Keyspace(KeyspaceDef),
    Table(TableDef),
    UserType(TypeDef),
}

/// One slot of the merged set.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DefEntry {
    Tombstone {
        timestamp: MicrosSinceEpoch,
    },
    Live {
        timestamp: MicrosSinceEpoch,
        payload: Bytes,
        object: SchemaObject,
    },
}

impl DefEntry {
    fn timestamp(&self) -> MicrosSinceEpoch {
        match self {
            DefEntry::Tombstone { timestamp } | DefEntry::Live { timestamp, .. } => *timestamp,
        }
    }

    fn is_tombstone(&self) -> bool {
        matches!(self, DefEntry::Tombstone { .. })
    }

    fn payload(&self) -> &[u8] {
        match self {
            DefEntry::Tombstone { .. } => &[],
            DefEntry::Live { payload, .. } => payload,
        }
    }
}

/// Which of two records for the same object survives. Timestamps decide;
/// ties resolve deterministically (tombstone first, then greater payload) so
/// that every node picks the same winner.
fn entry_wins(candidate: &DefEntry, current: &DefEntry) -> bool {
    (
        candidate.timestamp(),
        candidate.is_tombstone(),
        candidate.payload(),
    ) > (current.timestamp(), current.is_tombstone(), current.payload())
}

/// What one merge changed.
#[derive(Debug)]
pub struct MergeOutcome {
    previous_version: SchemaVersion,
    version: SchemaVersion,
    applied: Vec<AppliedChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub kind: ChangeKind,
    pub target: QualifiedName,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }

    pub fn previous_version(&self) -> SchemaVersion {
        self.previous_version
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// The records that took effect, in batch order. Records that lost the
    /// merge (already applied, or beaten by a newer one) are absent.
    pub fn applied(&self) -> &[AppliedChange] {
        &self.applied
    }
}

/// The merged set of definitions this node currently holds, together with the
/// version derived from it.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entries: BTreeMap<(ObjectKind, QualifiedName), DefEntry>,
    version: SchemaVersion,
}

impl Schema {
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn keyspace(&self, name: &str) -> Option<&KeyspaceDef> {
        match self.entries.get(&(ObjectKind::Keyspace, QualifiedName::of_keyspace(name))) {
            Some(DefEntry::Live {
                object: SchemaObject::Keyspace(def),
                ..
            }) => Some(def),
            _ => None,
        }
    }

    pub fn table(&self, keyspace: &str, name: &str) -> Option<&TableDef> {
        match self.entries.get(&(ObjectKind::Table, QualifiedName::of(keyspace, name))) {
            Some(DefEntry::Live {
                object: SchemaObject::Table(def),
                ..
            }) => Some(def),
            _ => None,
        }
    }

    pub fn user_type(&self, keyspace: &str, name: &str) -> Option<&TypeDef> {
        match self.entries.get(&(ObjectKind::UserType, QualifiedName::of(keyspace, name))) {
            Some(DefEntry::Live {
                object: SchemaObject::UserType(def),
                ..
            }) => Some(def),
            _ => None,
        }
    }

    pub fn tables_of<'a>(&'a self, keyspace: &'a str) -> impl Iterator<Item = &'a TableDef> + 'a {
        self.entries.iter().filter_map(move |((kind, target), entry)| {
            match (kind, entry) {
                (
                    ObjectKind::Table,
                    DefEntry::Live {
                        object: SchemaObject::Table(def),
                        ..
                    },
                ) if target.keyspace == keyspace => Some(def),
                _ => None,
            }
        })
    }

    pub fn user_types_of<'a>(&'a self, keyspace: &'a str) -> impl Iterator<Item = &'a TypeDef> + 'a {
        self.entries.iter().filter_map(move |((kind, target), entry)| {
            match (kind, entry) {
                (
                    ObjectKind::UserType,
                    DefEntry::Live {
                        object: SchemaObject::UserType(def),
                        ..
                    },
                ) if target.keyspace == keyspace => Some(def),
                _ => None,
            }
        })
    }

    /// Number of live definitions, tombstones excluded.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_tombstone())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge a batch into this set.
    ///
    /// Every record is decoded up front so a corrupt batch is rejected as a
    /// whole and the set stays untouched. The version is recomputed only when
    /// at least one record took effect.
    pub fn merge(&mut self, batch: &MutationBatch) -> Result<MergeOutcome, CodecError> {
        let mut decoded = Vec::with_capacity(batch.len());
        for mutation in batch.iter() {
            decoded.push(decode_entry(mutation)?);
        }

        let previous_version = self.version;
        let mut applied = Vec::new();
        for (mutation, entry) in batch.iter().zip(decoded) {
            let key = (mutation.kind.object, mutation.target.clone());
            let wins = match self.entries.get(&key) {
                None => true,
                Some(current) => entry_wins(&entry, current),
            };
            if wins {
                self.entries.insert(key, entry);
                applied.push(AppliedChange {
                    kind: mutation.kind,
                    target: mutation.target.clone(),
                });
            }
        }

        if !applied.is_empty() {
            self.version = self.compute_version();
        }
        Ok(MergeOutcome {
            previous_version,
            version: self.version,
            applied,
        })
    }

    /// Re-emit the full set, tombstones included, preserving the original
    /// timestamps and payload bytes. Serving a pull with this batch reproduces
    /// this node's exact version on the puller.
    pub fn to_mutations(&self) -> MutationBatch {
        let mutations = self
            .entries
            .iter()
            .map(|((kind, target), entry)| match entry {
                DefEntry::Tombstone { timestamp } => SchemaMutation {
                    kind: ChangeKind::new(SchemaOp::Drop, *kind),
                    target: target.clone(),
                    timestamp: *timestamp,
                    payload: Bytes::new(),
                },
                DefEntry::Live {
                    timestamp, payload, ..
                } => SchemaMutation {
                    kind: ChangeKind::new(SchemaOp::Create, *kind),
                    target: target.clone(),
                    timestamp: *timestamp,
                    payload: payload.clone(),
                },
            })
            .collect();
        MutationBatch::new(mutations)
    }

    /// Drop everything, tombstones included, returning to the empty sentinel.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.version = SchemaVersion::EMPTY;
    }

    fn compute_version(&self) -> SchemaVersion {
        if self.entries.is_empty() {
            return SchemaVersion::EMPTY;
        }
        let mut digest = SchemaVersionDigest::new();
        for ((kind, target), entry) in &self.entries {
            digest.write_u8(*kind as u8);
            digest.write_str(&target.keyspace);
            digest.write_str(&target.name);
            digest.write_u64(entry.timestamp().as_u64());
            digest.write_u8(entry.is_tombstone() as u8);
            digest.write_bytes(entry.payload());
        }
        digest.finish()
    }
}

fn decode_entry(mutation: &SchemaMutation) -> Result<DefEntry, CodecError> {
    Ok(match mutation.kind.op {
        SchemaOp::Drop => DefEntry::Tombstone {
            timestamp: mutation.timestamp,
        },
        SchemaOp::Create | SchemaOp::Update => {
            let object = match mutation.kind.object {
                ObjectKind::Keyspace => SchemaObject::Keyspace(mutation.keyspace_def()?),
                ObjectKind::Table => SchemaObject::Table(mutation.table_def()?),
                ObjectKind::UserType => SchemaObject::UserType(mutation.type_def()?),
            };
            DefEntry::Live {
                timestamp: mutation.timestamp,
                payload: mutation.payload.clone(),
                object,
            }
        }
    })
}
