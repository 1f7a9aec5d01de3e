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

use parking_lot::RwLock;

use starling_types::schema::MergeOutcome;
use starling_types::schema::mutation::{ObjectKind, QualifiedName, SchemaOp};

/// Observer of committed definition changes.
///
/// All methods default to no-ops; implement the ones of interest. Callbacks
/// fire on the schema manager, so they should be quick.
pub trait SchemaListener: Send + Sync {
    fn on_create_keyspace(&self, _keyspace: &str) {}
    fn on_update_keyspace(&self, _keyspace: &str) {}
    fn on_drop_keyspace(&self, _keyspace: &str) {}
    fn on_create_table(&self, _keyspace: &str, _table: &str) {}
    fn on_update_table(&self, _keyspace: &str, _table: &str) {}
    fn on_drop_table(&self, _keyspace: &str, _table: &str) {}
    fn on_create_user_type(&self, _keyspace: &str, _name: &str) {}
    fn on_update_user_type(&self, _keyspace: &str, _name: &str) {}
    fn on_drop_user_type(&self, _keyspace: &str, _name: &str) {}
}

/// Registry of change observers.
///
/// Registration and removal are safe concurrently with delivery: notification
/// walks a snapshot taken at fire time, synchronously and in registration
/// order, strictly after the corresponding change committed. Failed or no-op
/// merges never notify.
#[derive(Clone, Default)]
pub struct SchemaListeners {
    listeners: Arc<RwLock<Vec<Arc<dyn SchemaListener>>>>,
}

impl SchemaListeners {
    pub fn register(&self, listener: Arc<dyn SchemaListener>) {
        self.listeners.write().push(listener);
    }

    pub fn unregister(&self, listener: &Arc<dyn SchemaListener>) {
        self.listeners
            .write()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    pub(super) fn notify(&self, outcome: &MergeOutcome) {
        let snapshot = self.listeners.read().clone();
        if snapshot.is_empty() {
            return;
        }
        for change in outcome.applied() {
            for listener in &snapshot {
                dispatch(listener.as_ref(), change.kind.op, change.kind.object, &change.target);
            }
        }
    }
}

fn dispatch(listener: &dyn SchemaListener, op: SchemaOp, object: ObjectKind, target: &QualifiedName) {
    match (op, object) {
        (SchemaOp::Create, ObjectKind::Keyspace) => listener.on_create_keyspace(&target.keyspace),
        (SchemaOp::Update, ObjectKind::Keyspace) => listener.on_update_keyspace(&target.keyspace),
        (SchemaOp::Drop, ObjectKind::Keyspace) => listener.on_drop_keyspace(&target.keyspace),
        (SchemaOp::Create, ObjectKind::Table) => {
            listener.on_create_table(&target.keyspace, &target.name)
        }
        (SchemaOp::Update, ObjectKind::Table) => {
            listener.on_update_table(&target.keyspace, &target.name)
        }
        (SchemaOp::Drop, ObjectKind::Table) => {
            listener.on_drop_table(&target.keyspace, &target.name)
        }
        (SchemaOp::Create, ObjectKind::UserType) => {
            listener.on_create_user_type(&target.keyspace, &target.name)
        }
        (SchemaOp::Update, ObjectKind::UserType) => {
            listener.on_update_user_type(&target.keyspace, &target.name)
        }
        (SchemaOp::Drop, ObjectKind::UserType) => {
            listener.on_drop_user_type(&target.keyspace, &target.name)
        }
    }
}
