// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The running components of the starling schema subsystem.
//!
//! Every node may originate definition changes independently; the components
//! in this crate make all nodes converge on the same definition set without
//! any coordination beyond the membership feed: local changes are pushed
//! best-effort to live peers, and any version skew observed through gossip is
//! repaired by pulling the diverged peer's definitions. See
//! [`schema::SchemaManager`] for the apply path and [`schema::SyncScheduler`]
//! for the pull decision.

mod membership;
mod network_sender;
pub mod options;
pub mod schema;
mod storage;

pub use membership::MembershipView;
pub use network_sender::{NetworkSendError, NetworkSender};
pub use storage::{SchemaStorage, StorageError};

/// A component a caller depends on is gone because the node is shutting down.
#[derive(Debug, Clone, Copy, Default, thiserror::Error)]
#[error("system is shutting down")]
pub struct ShutdownError;
