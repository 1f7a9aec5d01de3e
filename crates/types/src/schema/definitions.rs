// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The definition objects agreed on across the cluster.
//!
//! Structural validation of a definition (replication strategies, column
//! types, ...) belongs to the layers that construct them; what lives here are
//! the backward-compatibility rules the announcer enforces on updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::SchemaError;

/// Definition of a keyspace: replication settings and the durability flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceDef {
    pub name: String,
    pub replication: BTreeMap<String, String>,
    pub durable_writes: bool,
}

impl KeyspaceDef {
    pub fn new(name: impl Into<String>) -> Self {
        KeyspaceDef {
            name: name.into(),
            replication: BTreeMap::new(),
            durable_writes: true,
        }
    }

    /// Replication and durability may change freely; only the identity is
    /// pinned.
    pub fn validate_update(&self, new: &KeyspaceDef) -> Result<(), SchemaError> {
        if self.name != new.name {
            return Err(SchemaError::InvalidChange(format!(
                "keyspace name mismatch: '{}' != '{}'",
                self.name, new.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ColumnKind {
    Partition,
    Clustering,
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnDef {
            name: name.into(),
            type_name: type_name.into(),
            kind,
        }
    }
}

/// Definition of a table within a keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub keyspace: String,
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub comment: Option<String>,
}

impl TableDef {
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        TableDef {
            keyspace: keyspace.into(),
            name: name.into(),
            columns: Vec::new(),
            comment: None,
        }
    }

    pub fn with_column(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        kind: ColumnKind,
    ) -> Self {
        self.columns.push(ColumnDef::new(name, type_name, kind));
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// An update must be a backward-compatible evolution: columns may be added
    /// and regular columns removed, but no existing column may change its type
    /// or kind, and primary key columns must stay.
    pub fn validate_update(&self, new: &TableDef) -> Result<(), SchemaError> {
        if self.keyspace != new.keyspace || self.name != new.name {
            return Err(SchemaError::InvalidChange(format!(
                "table identity mismatch: '{}.{}' != '{}.{}'",
                self.keyspace, self.name, new.keyspace, new.name
            )));
        }
        for column in &self.columns {
            match new.column(&column.name) {
                Some(updated) => {
                    if updated.type_name != column.type_name {
                        return Err(SchemaError::InvalidChange(format!(
                            "cannot change type of column '{}' from {} to {}",
                            column.name, column.type_name, updated.type_name
                        )));
                    }
                    if updated.kind != column.kind {
                        return Err(SchemaError::InvalidChange(format!(
                            "cannot change kind of column '{}' from {} to {}",
                            column.name, column.kind, updated.kind
                        )));
                    }
                }
                None if column.kind == ColumnKind::Regular => {}
                None => {
                    return Err(SchemaError::InvalidChange(format!(
                        "cannot drop {} key column '{}'",
                        column.kind, column.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Definition of a user type within a keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub keyspace: String,
    pub name: String,
    pub field_names: Vec<String>,
    pub field_types: Vec<String>,
}

impl TypeDef {
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeDef {
            keyspace: keyspace.into(),
            name: name.into(),
            field_names: Vec::new(),
            field_types: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.field_names.push(name.into());
        self.field_types.push(type_name.into());
        self
    }

    /// Fields of a user type may only be appended; existing fields keep their
    /// name and type.
    pub fn validate_update(&self, new: &TypeDef) -> Result<(), SchemaError> {
        if self.keyspace != new.keyspace || self.name != new.name {
            return Err(SchemaError::InvalidChange(format!(
                "type identity mismatch: '{}.{}' != '{}.{}'",
                self.keyspace, self.name, new.keyspace, new.name
            )));
        }
        if new.field_names.len() < self.field_names.len() {
            return Err(SchemaError::InvalidChange(format!(
                "cannot remove fields from type '{}.{}'",
                self.keyspace, self.name
            )));
        }
        for (i, (name, type_name)) in self.field_names.iter().zip(&self.field_types).enumerate() {
            if new.field_names[i] != *name || new.field_types[i] != *type_name {
                return Err(SchemaError::InvalidChange(format!(
                    "cannot redefine field '{}' of type '{}.{}'",
                    name, self.keyspace, self.name
                )));
            }
        }
        Ok(())
    }
}
