// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Retry policy: error classification and backoff.
//!
//! Each logical call moves through `Attempting -> {Success, RetryScheduled,
//! Failed}`. Only transient outcomes of idempotent operations are ever
//! resubmitted: a transient failure of a non-idempotent operation surfaces
//! immediately, because resubmission could apply a duplicate side effect.
//! Terminal outcomes fail fast regardless of idempotency.

use std::cmp;
use std::time::Duration;

use crate::transport::TransportError;

/// How the retry policy treats a [`TransportError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth resubmitting, but only if the operation is idempotent: the
    /// original attempt may have been applied server-side.
    Transient,
    /// Never retried; resubmission cannot succeed.
    Terminal,
    /// The server no longer knows the statement id. Not a retry in the
    /// policy's sense: the engine evicts the cache entry, re-prepares, and
    /// resubmits once.
    Unprepared,
}

/// Classifies a transport outcome for the retry policy.
pub fn classify(err: &TransportError) -> ErrorClass {
    match err {
        TransportError::Unreachable(_)
        | TransportError::Broken(_)
        | TransportError::ServerTimeout(_)
        | TransportError::Overloaded(_)
        | TransportError::Unavailable { .. } => ErrorClass::Transient,
        TransportError::Auth(_)
        | TransportError::Syntax(_)
        | TransportError::Invalid(_)
        | TransportError::SchemaMismatch(_) => ErrorClass::Terminal,
        TransportError::Unprepared { .. } => ErrorClass::Unprepared,
    }
}

/// Parameters for the retry loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryParameters {
    /// Total attempt ceiling, counting the initial attempt.
    pub max_attempts: usize,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single backoff.
    pub clamp_backoff: Duration,
}

impl Default for RetryParameters {
    fn default() -> RetryParameters {
        RetryParameters {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            clamp_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryParameters {
    /// Starts a retry series.
    pub fn stream(&self) -> RetryStream {
        RetryStream {
            params: *self,
            attempt: 0,
            next: cmp::min(self.initial_backoff, self.clamp_backoff),
        }
    }
}

/// An exponential backoff series: each sleep doubles the previous one, up to
/// the clamp.
#[derive(Debug)]
pub struct RetryStream {
    params: RetryParameters,
    attempt: usize,
    next: Duration,
}

impl RetryStream {
    /// How many times [`RetryStream::sleep`] has completed.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// The duration of the next sleep.
    pub fn next_sleep(&self) -> Duration {
        self.next
    }

    /// Executes the next sleep in the series.
    ///
    /// Consumes and returns self so a partially executed sleep cannot be
    /// reused after cancellation.
    pub async fn sleep(self) -> RetryStream {
        tokio::time::sleep(self.next).await;
        RetryStream {
            params: self.params,
            attempt: self.attempt + 1,
            next: cmp::min(self.next * 2, self.params.clamp_backoff),
        }
    }
}
