// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tokio::time::Instant;
use tracing::{debug, warn};

use starling_types::PlainNodeId;

use super::manager::SchemaManager;

/// One-shot pull of a peer's full definition set.
///
/// Created by the scheduler (or the local reset path), run once on the schema
/// manager, and discarded. A failed or timed-out pull is not retried here:
/// convergence resumes when the membership feed delivers the next divergence
/// signal, which restarts the whole cycle with a fresh task. A pulled batch
/// that is already reflected locally merges as a no-op.
pub(super) struct MigrationTask {
    target: PlainNodeId,
    created_at: Instant,
}

impl MigrationTask {
    pub(super) fn new(target: PlainNodeId) -> Self {
        MigrationTask {
            target,
            created_at: Instant::now(),
        }
    }

    pub(super) async fn run(self, manager: &mut SchemaManager) {
        debug!(peer = %self.target, "Pulling definitions from peer");
        let networking = manager.networking().clone();
        let timeout = *manager.options().pull_request_timeout;

        let batch = match tokio::time::timeout(
            timeout,
            networking.request_definitions(self.target),
        )
        .await
        {
            Ok(Ok(batch)) => batch,
            Ok(Err(err)) => {
                warn!(
                    peer = %self.target,
                    "Definitions pull failed, waiting for the next divergence signal: {err}",
                );
                return;
            }
            Err(_) => {
                warn!(
                    peer = %self.target,
                    elapsed = ?self.created_at.elapsed(),
                    "Definitions pull timed out, waiting for the next divergence signal",
                );
                return;
            }
        };

        manager.merge_batch(&batch, None);
    }
}
