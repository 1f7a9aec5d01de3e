// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;
use std::fmt::Display;
use std::time::SystemTime;

/// Microseconds since the unix epoch.
///
/// The logical clock stamped on definition changes; the last-write-wins merge
/// compares these values, so every record of one announced batch carries the
/// same one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct MicrosSinceEpoch(u64);

impl MicrosSinceEpoch {
    pub const UNIX_EPOCH: MicrosSinceEpoch = MicrosSinceEpoch::new(0);

    pub const fn new(micros_since_epoch: u64) -> Self {
        MicrosSinceEpoch(micros_since_epoch)
    }

    pub fn now() -> Self {
        SystemTime::now().into()
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for MicrosSinceEpoch {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<SystemTime> for MicrosSinceEpoch {
    fn from(value: SystemTime) -> Self {
        MicrosSinceEpoch::new(
            u64::try_from(
                value
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .expect("duration since Unix epoch should be well-defined")
                    .as_micros(),
            )
            .expect("micros since Unix epoch should fit in u64"),
        )
    }
}

impl Display for MicrosSinceEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} us since epoch", self.0)
    }
}
