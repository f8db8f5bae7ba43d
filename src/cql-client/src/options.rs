// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-statement execution options and their layering rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The number and distribution of replica acknowledgments required for an
/// operation to be considered successful.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    #[default]
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

/// The consistency level for the serial (Paxos) phase of conditional writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerialConsistency {
    #[default]
    Serial,
    LocalSerial,
}

/// Configuration attached to a statement, a prepared statement, a batch, or
/// a whole session.
///
/// Every field is optional; unset fields fall through to the next layer when
/// options are resolved via [`ExecutionOptions::overlay`]. Call-site options
/// win over target-attached options, which win over session defaults.
///
/// Values are immutable once constructed; the `with_*` constructors return a
/// new value rather than mutating in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionOptions {
    consistency: Option<Consistency>,
    serial_consistency: Option<SerialConsistency>,
    page_size: Option<i32>,
    timestamp: Option<i64>,
    timeout: Option<Duration>,
    tracing: Option<bool>,
    idempotent: Option<bool>,
}

impl ExecutionOptions {
    /// Returns a copy with the given consistency level.
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    /// Returns a copy with the given serial consistency level.
    pub fn with_serial_consistency(mut self, serial_consistency: SerialConsistency) -> Self {
        self.serial_consistency = Some(serial_consistency);
        self
    }

    /// Returns a copy with the given page size.
    ///
    /// The size must be positive; the execution engine rejects other values
    /// at submission time. Unset means the server's default.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Returns a copy with the given timestamp override, in microseconds
    /// since the epoch.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns a copy with the given per-call timeout.
    ///
    /// The timeout bounds the entire logical operation, including retries
    /// and transparent re-preparation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns a copy with tracing enabled or disabled.
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = Some(tracing);
        self
    }

    /// Returns a copy with the idempotency flag set.
    ///
    /// Only idempotent operations are retried automatically. The flag is
    /// never inferred from statement text: `UPDATE t SET x = x + 1` is not
    /// idempotent even though the text alone cannot tell you so.
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = Some(idempotent);
        self
    }

    pub fn consistency(&self) -> Option<Consistency> {
        self.consistency
    }

    pub fn serial_consistency(&self) -> Option<SerialConsistency> {
        self.serial_consistency
    }

    pub fn page_size(&self) -> Option<i32> {
        self.page_size
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn tracing(&self) -> Option<bool> {
        self.tracing
    }

    pub fn idempotent(&self) -> Option<bool> {
        self.idempotent
    }

    /// Resolves `over` on top of `self`, field by field: fields set in
    /// `over` win, unset fields keep `self`'s value.
    pub fn overlay(&self, over: &ExecutionOptions) -> ExecutionOptions {
        ExecutionOptions {
            consistency: over.consistency.or(self.consistency),
            serial_consistency: over.serial_consistency.or(self.serial_consistency),
            page_size: over.page_size.or(self.page_size),
            timestamp: over.timestamp.or(self.timestamp),
            timeout: over.timeout.or(self.timeout),
            tracing: over.tracing.or(self.tracing),
            idempotent: over.idempotent.or(self.idempotent),
        }
    }
}
