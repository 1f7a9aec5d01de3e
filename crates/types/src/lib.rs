// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! This crate contains the core types used by the starling schema subsystem.

mod node_id;
mod version;

pub mod cluster;
pub mod errors;
pub mod net;
pub mod schema;
pub mod time;

pub use node_id::PlainNodeId;
pub use version::{SchemaVersion, SchemaVersionDigest};
