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

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The persistent storage engine holding the definition tables.
///
/// The schema subsystem never reads through this trait; it only truncates
/// during an operator-invoked local reset.
#[async_trait]
pub trait SchemaStorage: Send + Sync + 'static {
    /// Truncate every persisted definition table.
    async fn truncate_definitions(&self) -> Result<(), StorageError>;
}
