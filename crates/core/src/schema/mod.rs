// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Cluster-wide agreement on the definition set.
//!
//! The moving parts, wired together at node startup:
//!
//! - [`SchemaManager`] owns the local definition set and is the single
//!   concurrency domain every mutation batch passes through, whether it was
//!   announced locally, pushed by a peer, or pulled.
//! - [`SchemaWriter`] originates changes: validate, merge locally, fan out to
//!   live peers without waiting for them.
//! - [`GossipWatcher`] and [`SyncScheduler`] turn schema-version
//!   advertisements on the membership feed into pulls, immediately while
//!   bootstrapping and debounced otherwise.
//! - [`SchemaListeners`] tells external observers about committed changes.
//!
//! There is no coordination protocol on top: convergence falls out of the
//! merge being idempotent and commutative plus divergence being re-detected
//! on every advertisement.

mod announce;
mod gossip;
mod listener;
mod local;
mod manager;
mod migration;
mod scheduler;

#[cfg(test)]
mod test_util;

pub use announce::{AnnounceError, ResetError, SchemaWriter};
pub use gossip::GossipWatcher;
pub use listener::{SchemaListener, SchemaListeners};
pub use local::LocalSchema;
pub use manager::{SchemaManager, spawn_schema_manager};
pub use scheduler::SyncScheduler;
