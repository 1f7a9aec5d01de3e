// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use starling_types::SchemaVersion;
use starling_types::schema::Schema;

/// Handle to the definition set this node currently holds.
///
/// Constructed once at startup by [`super::SchemaManager`] and passed by
/// reference to collaborators. Reads are lock-free snapshots; every write
/// goes through the manager, which fully serializes mutation.
#[derive(Clone)]
pub struct LocalSchema {
    inner: Arc<Inner>,
}

struct Inner {
    schema: ArcSwap<Schema>,
    version_watch: watch::Sender<SchemaVersion>,
}

impl LocalSchema {
    pub(super) fn new() -> Self {
        LocalSchema {
            inner: Arc::new(Inner {
                schema: ArcSwap::from_pointee(Schema::default()),
                version_watch: watch::Sender::new(SchemaVersion::EMPTY),
            }),
        }
    }

    /// Version of the current definition set; [`SchemaVersion::EMPTY`] until
    /// this node loads or receives definitions.
    pub fn version(&self) -> SchemaVersion {
        self.inner.schema.load().version()
    }

    pub fn snapshot(&self) -> Arc<Schema> {
        self.inner.schema.load_full()
    }

    /// Watch for version changes.
    ///
    /// The returned receiver is primed to notify with the current value as
    /// well.
    pub fn watch(&self) -> watch::Receiver<SchemaVersion> {
        let mut recv = self.inner.version_watch.subscribe();
        recv.mark_changed();
        recv
    }

    pub(super) fn store(&self, schema: Arc<Schema>) {
        let version = schema.version();
        self.inner.schema.store(schema);
        self.inner.version_watch.send_replace(version);
    }
}
