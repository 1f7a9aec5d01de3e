// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Definition-change records and the batches they travel in.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::net::codec::CodecError;
use crate::time::MicrosSinceEpoch;

use super::definitions::{KeyspaceDef, TableDef, TypeDef};

/// What a definition change does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SchemaOp {
    Create,
    Update,
    Drop,
}

/// What a definition change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum ObjectKind {
    #[strum(serialize = "keyspace")]
    Keyspace,
    #[strum(serialize = "table")]
    Table,
    #[strum(serialize = "user type")]
    UserType,
}

/// The closed set of change kinds. Every mutation carries exactly one, and a
/// single generic routine applies them all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeKind {
    pub op: SchemaOp,
    pub object: ObjectKind,
}

impl ChangeKind {
    pub const fn new(op: SchemaOp, object: ObjectKind) -> Self {
        ChangeKind { op, object }
    }

    pub(crate) fn wire_tag(&self) -> u8 {
        let object = match self.object {
            ObjectKind::Keyspace => 0,
            ObjectKind::Table => 1,
            ObjectKind::UserType => 2,
        };
        let op = match self.op {
            SchemaOp::Create => 0,
            SchemaOp::Update => 1,
            SchemaOp::Drop => 2,
        };
        object * 3 + op
    }

    pub(crate) fn from_wire_tag(tag: u8) -> Option<ChangeKind> {
        let object = match tag / 3 {
            0 => ObjectKind::Keyspace,
            1 => ObjectKind::Table,
            2 => ObjectKind::UserType,
            _ => return None,
        };
        let op = match tag % 3 {
            0 => SchemaOp::Create,
            1 => SchemaOp::Update,
            2 => SchemaOp::Drop,
            _ => unreachable!(),
        };
        Some(ChangeKind::new(op, object))
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.object)
    }
}

/// Fully-qualified name of a definition. Keyspaces leave `name` empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    pub keyspace: String,
    pub name: String,
}

impl QualifiedName {
    pub fn of_keyspace(keyspace: impl Into<String>) -> Self {
        QualifiedName {
            keyspace: keyspace.into(),
            name: String::new(),
        }
    }

    pub fn of(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        QualifiedName {
            keyspace: keyspace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.keyspace)
        } else {
            write!(f, "{}.{}", self.keyspace, self.name)
        }
    }
}

/// One atomic definition-change record.
///
/// The payload carries the serialized definition for creates and updates and
/// stays empty for drops. Records merge last-write-wins by timestamp;
/// delivering one twice is harmless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMutation {
    pub kind: ChangeKind,
    pub target: QualifiedName,
    pub timestamp: MicrosSinceEpoch,
    pub payload: Bytes,
}

impl SchemaMutation {
    pub fn create_keyspace(timestamp: MicrosSinceEpoch, def: &KeyspaceDef) -> Self {
        SchemaMutation {
            kind: ChangeKind::new(SchemaOp::Create, ObjectKind::Keyspace),
            target: QualifiedName::of_keyspace(def.name.as_str()),
            timestamp,
            payload: encode_payload(def),
        }
    }

    pub fn update_keyspace(timestamp: MicrosSinceEpoch, def: &KeyspaceDef) -> Self {
        SchemaMutation {
            kind: ChangeKind::new(SchemaOp::Update, ObjectKind::Keyspace),
            target: QualifiedName::of_keyspace(def.name.as_str()),
            timestamp,
            payload: encode_payload(def),
        }
    }

    pub fn drop_keyspace(timestamp: MicrosSinceEpoch, name: &str) -> Self {
        SchemaMutation {
            kind: ChangeKind::new(SchemaOp::Drop, ObjectKind::Keyspace),
            target: QualifiedName::of_keyspace(name),
            timestamp,
            payload: Bytes::new(),
        }
    }

    pub fn create_table(timestamp: MicrosSinceEpoch, def: &TableDef) -> Self {
        SchemaMutation {
            kind: ChangeKind::new(SchemaOp::Create, ObjectKind::Table),
            target: QualifiedName::of(def.keyspace.as_str(), def.name.as_str()),
            timestamp,
            payload: encode_payload(def),
        }
    }

    pub fn update_table(timestamp: MicrosSinceEpoch, def: &TableDef) -> Self {
        SchemaMutation {
            kind: ChangeKind::new(SchemaOp::Update, ObjectKind::Table),
            target: QualifiedName::of(def.keyspace.as_str(), def.name.as_str()),
            timestamp,
            payload: encode_payload(def),
        }
    }

    pub fn drop_table(timestamp: MicrosSinceEpoch, keyspace: &str, name: &str) -> Self {
        SchemaMutation {
            kind: ChangeKind::new(SchemaOp::Drop, ObjectKind::Table),
            target: QualifiedName::of(keyspace, name),
            timestamp,
            payload: Bytes::new(),
        }
    }

    pub fn create_type(timestamp: MicrosSinceEpoch, def: &TypeDef) -> Self {
        SchemaMutation {
            kind: ChangeKind::new(SchemaOp::Create, ObjectKind::UserType),
            target: QualifiedName::of(def.keyspace.as_str(), def.name.as_str()),
            timestamp,
            payload: encode_payload(def),
        }
    }

    pub fn update_type(timestamp: MicrosSinceEpoch, def: &TypeDef) -> Self {
        SchemaMutation {
            kind: ChangeKind::new(SchemaOp::Update, ObjectKind::UserType),
            target: QualifiedName::of(def.keyspace.as_str(), def.name.as_str()),
            timestamp,
            payload: encode_payload(def),
        }
    }

    pub fn drop_type(timestamp: MicrosSinceEpoch, keyspace: &str, name: &str) -> Self {
        SchemaMutation {
            kind: ChangeKind::new(SchemaOp::Drop, ObjectKind::UserType),
            target: QualifiedName::of(keyspace, name),
            timestamp,
            payload: Bytes::new(),
        }
    }

    pub fn keyspace_def(&self) -> Result<KeyspaceDef, CodecError> {
        decode_payload(&self.payload)
    }

    pub fn table_def(&self) -> Result<TableDef, CodecError> {
        decode_payload(&self.payload)
    }

    pub fn type_def(&self) -> Result<TypeDef, CodecError> {
        decode_payload(&self.payload)
    }
}

fn encode_payload<T: Serialize>(value: &T) -> Bytes {
    flexbuffers::to_vec(value)
        .expect("definition serde can't fail")
        .into()
}

fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CodecError> {
    flexbuffers::from_slice(payload).map_err(|err| CodecError::Payload(err.to_string()))
}

/// An ordered group of definition changes produced by one administrator
/// action and applied to the local set as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    mutations: Vec<SchemaMutation>,
}

impl MutationBatch {
    pub fn new(mutations: Vec<SchemaMutation>) -> Self {
        MutationBatch { mutations }
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaMutation> {
        self.mutations.iter()
    }
}

impl From<Vec<SchemaMutation>> for MutationBatch {
    fn from(mutations: Vec<SchemaMutation>) -> Self {
        MutationBatch::new(mutations)
    }
}
