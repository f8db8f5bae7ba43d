// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The per-session statement cache.
//!
//! At most one preparation round trip per distinct query text per session:
//! a cache hit returns the stored handle with zero network activity, and
//! concurrent misses for the same text coalesce into a single in-flight
//! preparation (single-flight). A failed preparation surfaces the error to
//! every waiter and leaves the entry unpopulated, so the next call retries.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::debug;

use crate::error::ClientError;
use crate::metrics::PrepareMetrics;
use crate::statement::PreparedStatement;
use crate::transport::Transport;

type FlightResult = Option<Result<PreparedStatement, ClientError>>;

#[derive(Debug, Clone)]
enum CacheEntry {
    /// Preparation completed; the handle is served without network activity.
    Ready(PreparedStatement),
    /// Preparation is in flight; waiters park on the channel.
    Pending(watch::Receiver<FlightResult>),
}

/// Statements prepared by this session, keyed by exact query text.
///
/// No normalization is applied to the key: two texts differing only in
/// whitespace are two cache entries, matching the server's own view.
#[derive(Debug)]
pub struct PreparedCache {
    entries: Mutex<BTreeMap<String, CacheEntry>>,
    metrics: PrepareMetrics,
}

/// What a `prepare` call found when it consulted the map.
enum Claim {
    Hit(PreparedStatement),
    Wait(watch::Receiver<FlightResult>),
    Lead(watch::Sender<FlightResult>, watch::Receiver<FlightResult>),
}

impl PreparedCache {
    pub(crate) fn new(metrics: PrepareMetrics) -> PreparedCache {
        PreparedCache {
            entries: Mutex::new(BTreeMap::new()),
            metrics,
        }
    }

    /// Returns the prepared statement for `text`, issuing at most one
    /// preparation round trip per distinct text.
    pub async fn prepare(
        &self,
        transport: &dyn Transport,
        text: &str,
    ) -> Result<PreparedStatement, ClientError> {
        loop {
            let claim = {
                let mut entries = self.entries.lock().expect("lock poisoned");
                match entries.get(text) {
                    Some(CacheEntry::Ready(stmt)) => Claim::Hit(stmt.clone()),
                    Some(CacheEntry::Pending(rx)) => Claim::Wait(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        entries.insert(text.to_owned(), CacheEntry::Pending(rx.clone()));
                        Claim::Lead(tx, rx)
                    }
                }
            };
            match claim {
                Claim::Hit(stmt) => {
                    self.metrics.cache_hits.inc();
                    return Ok(stmt);
                }
                Claim::Wait(rx) => {
                    self.metrics.single_flight_waits.inc();
                    match self.await_flight(text, rx).await {
                        Some(res) => return res,
                        // The leader was cancelled before publishing; take
                        // another run at the map.
                        None => continue,
                    }
                }
                Claim::Lead(tx, rx) => return self.lead_flight(transport, text, tx, rx).await,
            }
        }
    }

    /// Drops the entry for `text`, so the next use re-prepares. Called when
    /// the server reports the statement id invalidated by a schema change.
    pub fn evict(&self, text: &str) {
        let mut entries = self.entries.lock().expect("lock poisoned");
        if let Some(CacheEntry::Ready(_)) = entries.get(text) {
            entries.remove(text);
            self.metrics.evictions.inc();
            debug!(%text, "evicted invalidated prepared statement");
        }
    }

    /// The number of populated (ready) entries, for tests and introspection.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("lock poisoned");
        entries
            .values()
            .filter(|e| matches!(e, CacheEntry::Ready(_)))
            .count()
    }

    /// Reports whether the cache holds no populated entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parks on another caller's in-flight preparation. Returns `None` if
    /// the leader was cancelled before publishing a result.
    async fn await_flight(
        &self,
        text: &str,
        mut rx: watch::Receiver<FlightResult>,
    ) -> Option<Result<PreparedStatement, ClientError>> {
        loop {
            if let Some(res) = rx.borrow_and_update().clone() {
                return Some(res);
            }
            if rx.changed().await.is_err() {
                // Leader gone without a result. Clear the stale entry (if it
                // is still ours) before the caller retries.
                let mut entries = self.entries.lock().expect("lock poisoned");
                if let Some(CacheEntry::Pending(cur)) = entries.get(text) {
                    if cur.same_channel(&rx) {
                        entries.remove(text);
                    }
                }
                return None;
            }
        }
    }

    /// Runs the preparation round trip as the single flight for `text` and
    /// publishes the outcome to all waiters.
    async fn lead_flight(
        &self,
        transport: &dyn Transport,
        text: &str,
        tx: watch::Sender<FlightResult>,
        rx: watch::Receiver<FlightResult>,
    ) -> Result<PreparedStatement, ClientError> {
        // If this future is dropped mid-flight, remove the pending entry so
        // waiters and later callers can start a fresh flight.
        let mut guard = FlightGuard {
            cache: self,
            text,
            rx,
            armed: true,
        };
        self.metrics.round_trips.inc();
        let res = match transport.prepare(text).await {
            Ok(info) => Ok(PreparedStatement::new(info, text)),
            Err(err) => Err(ClientError::from(err)),
        };
        {
            let mut entries = self.entries.lock().expect("lock poisoned");
            match &res {
                Ok(stmt) => {
                    entries.insert(text.to_owned(), CacheEntry::Ready(stmt.clone()));
                }
                Err(err) => {
                    entries.remove(text);
                    debug!(%text, %err, "preparation failed; entry not populated");
                }
            }
        }
        guard.armed = false;
        // Waiters may have gone away; a closed channel is fine.
        let _ = tx.send(Some(res.clone()));
        res
    }
}

struct FlightGuard<'a> {
    cache: &'a PreparedCache,
    text: &'a str,
    rx: watch::Receiver<FlightResult>,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut entries = self.cache.entries.lock().expect("lock poisoned");
        if let Some(CacheEntry::Pending(cur)) = entries.get(self.text) {
            if cur.same_channel(&self.rx) {
                entries.remove(self.text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::metrics::Metrics;
    use crate::mock::MockTransport;
    use crate::transport::TransportError;

    use super::*;

    const TEXT: &str = "SELECT id, name FROM users WHERE id = ?";

    #[tokio::test]
    async fn test_hit_serves_without_network() {
        let transport = MockTransport::new();
        let cache = PreparedCache::new(Metrics::detached().prepare);

        let first = cache.prepare(&*transport, TEXT).await.unwrap();
        let second = cache.prepare(&*transport, TEXT).await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(transport.prepare_count(), 1);
        assert_eq!(cache.metrics.cache_hits.get(), 1);

        // A different text is a different entry.
        cache
            .prepare(&*transport, "SELECT 1 FROM system.local")
            .await
            .unwrap();
        assert_eq!(transport.prepare_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_coalesce() {
        let transport = MockTransport::new();
        transport.set_prepare_delay(Duration::from_millis(50));
        let cache = PreparedCache::new(Metrics::detached().prepare);

        let (a, b, c) = futures::join!(
            cache.prepare(&*transport, TEXT),
            cache.prepare(&*transport, TEXT),
            cache.prepare(&*transport, TEXT),
        );
        assert_eq!(a.unwrap().id(), b.unwrap().id());
        c.unwrap();
        assert_eq!(transport.prepare_count(), 1);
        assert_eq!(cache.metrics.single_flight_waits.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_fans_out_and_leaves_entry_unpopulated() {
        let transport = MockTransport::new();
        transport.set_prepare_delay(Duration::from_millis(50));
        transport.enqueue_prepare(Err(TransportError::Syntax("near WHERE".into())));
        let cache = PreparedCache::new(Metrics::detached().prepare);

        let (a, b) = futures::join!(
            cache.prepare(&*transport, TEXT),
            cache.prepare(&*transport, TEXT),
        );
        assert_eq!(a.unwrap_err(), ClientError::Syntax("near WHERE".into()));
        assert_eq!(b.unwrap_err(), ClientError::Syntax("near WHERE".into()));
        assert_eq!(transport.prepare_count(), 1);
        assert!(cache.is_empty());

        // The failure was not cached; the next call starts a fresh flight.
        cache.prepare(&*transport, TEXT).await.unwrap();
        assert_eq!(transport.prepare_count(), 2);
    }

    #[tokio::test]
    async fn test_evict_forces_repreparation() {
        let transport = MockTransport::new();
        let cache = PreparedCache::new(Metrics::detached().prepare);

        cache.prepare(&*transport, TEXT).await.unwrap();
        cache.evict(TEXT);
        assert!(cache.is_empty());
        assert_eq!(cache.metrics.evictions.get(), 1);

        // Evicting an unknown text is a no-op.
        cache.evict("never cached");
        assert_eq!(cache.metrics.evictions.get(), 1);

        cache.prepare(&*transport, TEXT).await.unwrap();
        assert_eq!(transport.prepare_count(), 2);
    }
}
