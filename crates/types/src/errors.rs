// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::schema::mutation::ObjectKind;

/// Validation failures surfaced to the announcing caller before any mutation
/// is built, applied or transmitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ObjectKind, name: String },
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: ObjectKind, name: String },
    #[error("invalid schema change: {0}")]
    InvalidChange(String),
}

impl SchemaError {
    pub fn already_exists(kind: ObjectKind, name: impl Into<String>) -> Self {
        SchemaError::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        SchemaError::NotFound {
            kind,
            name: name.into(),
        }
    }
}
