// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Prometheus monitoring metrics.

use prometheus::{Counter, IntCounter, IntCounterVec, Opts, Registry};

/// Prometheus metrics for one session.
///
/// Intentionally not Clone; the session shares it behind an `Arc`.
pub struct Metrics {
    /// Metrics for the statement cache.
    pub prepare: PrepareMetrics,
    /// Metrics for the execution engine.
    pub execute: ExecuteMetrics,
    /// Metrics for the retry loop.
    pub retry: RetryMetrics,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Returns a new [`Metrics`] instance registered on `registry`.
    pub fn new(registry: &Registry) -> Result<Metrics, prometheus::Error> {
        let metrics = Metrics::build()?;
        metrics.register(registry)?;
        Ok(metrics)
    }

    /// Returns a [`Metrics`] instance that records but is not exported
    /// anywhere, for sessions configured without a registry.
    pub(crate) fn detached() -> Metrics {
        Metrics::build().expect("statically valid metric names")
    }

    fn build() -> Result<Metrics, prometheus::Error> {
        Ok(Metrics {
            prepare: PrepareMetrics {
                round_trips: IntCounter::new(
                    "cql_prepare_round_trips_count",
                    "count of prepare round trips issued",
                )?,
                cache_hits: IntCounter::new(
                    "cql_prepare_cache_hits_count",
                    "count of prepares served from the statement cache",
                )?,
                single_flight_waits: IntCounter::new(
                    "cql_prepare_single_flight_waits_count",
                    "count of prepares that waited on another caller's in-flight preparation",
                )?,
                evictions: IntCounter::new(
                    "cql_prepare_evictions_count",
                    "count of cache entries evicted after server-side invalidation",
                )?,
            },
            execute: ExecuteMetrics {
                queries: IntCounter::new(
                    "cql_execute_queries_count",
                    "count of raw-text query executions",
                )?,
                executes: IntCounter::new(
                    "cql_execute_prepared_count",
                    "count of prepared statement executions",
                )?,
                batches: IntCounter::new(
                    "cql_execute_batches_count",
                    "count of batch executions",
                )?,
                pages_fetched: IntCounter::new(
                    "cql_execute_pages_fetched_count",
                    "count of follow-up page fetches",
                )?,
                errors: IntCounterVec::new(
                    Opts::new(
                        "cql_execute_errors_count",
                        "count of failed logical calls, by error class",
                    ),
                    &["class"],
                )?,
            },
            retry: RetryMetrics {
                started: IntCounter::new(
                    "cql_retry_started_count",
                    "count of retry loops started",
                )?,
                retries: IntCounter::new(
                    "cql_retry_retries_count",
                    "count of resubmissions after transient errors",
                )?,
                sleep_seconds: Counter::new(
                    "cql_retry_sleep_seconds",
                    "time spent in retry loop backoff",
                )?,
            },
        })
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.prepare.round_trips.clone()))?;
        registry.register(Box::new(self.prepare.cache_hits.clone()))?;
        registry.register(Box::new(self.prepare.single_flight_waits.clone()))?;
        registry.register(Box::new(self.prepare.evictions.clone()))?;
        registry.register(Box::new(self.execute.queries.clone()))?;
        registry.register(Box::new(self.execute.executes.clone()))?;
        registry.register(Box::new(self.execute.batches.clone()))?;
        registry.register(Box::new(self.execute.pages_fetched.clone()))?;
        registry.register(Box::new(self.execute.errors.clone()))?;
        registry.register(Box::new(self.retry.started.clone()))?;
        registry.register(Box::new(self.retry.retries.clone()))?;
        registry.register(Box::new(self.retry.sleep_seconds.clone()))?;
        Ok(())
    }
}

/// Metrics for the statement cache.
#[derive(Clone, Debug)]
pub struct PrepareMetrics {
    pub round_trips: IntCounter,
    pub cache_hits: IntCounter,
    pub single_flight_waits: IntCounter,
    pub evictions: IntCounter,
}

/// Metrics for the execution engine.
#[derive(Clone, Debug)]
pub struct ExecuteMetrics {
    pub queries: IntCounter,
    pub executes: IntCounter,
    pub batches: IntCounter,
    pub pages_fetched: IntCounter,
    pub errors: IntCounterVec,
}

/// Metrics for the retry loop.
#[derive(Clone, Debug)]
pub struct RetryMetrics {
    pub started: IntCounter,
    pub retries: IntCounter,
    pub sleep_seconds: Counter,
}
