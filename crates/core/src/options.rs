// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchemaOptions {
    /// # Migration delay
    ///
    /// How long to wait before pulling definitions from a peer that advertised
    /// a diverging schema version while this node is past its startup window.
    /// Overlapping announcements from several peers collapse into a single
    /// pull once the window passes. Nodes that are still empty or recently
    /// started pull without delay.
    ///
    /// Can be configured using the [`humantime`](https://docs.rs/humantime/latest/humantime/fn.parse_duration.html) format.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub migration_delay: humantime::Duration,

    /// # Pull request timeout
    ///
    /// Abort a definitions pull that received no reply within this duration.
    ///
    /// Can be configured using the [`humantime`](https://docs.rs/humantime/latest/humantime/fn.parse_duration.html) format.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub pull_request_timeout: humantime::Duration,

    /// # Network queue length
    ///
    /// Capacity of the schema manager's inbound network message queue.
    pub network_queue_length: usize,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            migration_delay: Duration::from_secs(60).into(),
            pull_request_timeout: Duration::from_secs(10).into(),
            network_queue_length: 128,
        }
    }
}
