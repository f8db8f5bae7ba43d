// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Sessions: the owner of the connection pool, the statement cache, and the
//! execution defaults.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::batch::{Batch, BatchStatement};
use crate::cache::PreparedCache;
use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::exec::Template;
use crate::metrics::Metrics;
use crate::options::ExecutionOptions;
use crate::result::{QueryResult, RowPager};
use crate::retry::RetryParameters;
use crate::statement::{PreparedStatement, Statement, Values};
use crate::transport::{BatchEntry, Connector, Request, ResponseBody, Transport};

/// A handle to a connected cluster.
///
/// A session supports many outstanding logical operations at once; calls do
/// not serialize on each other except where the statement cache's
/// single-flight rule applies to identical uncached text. Clones are cheap
/// and share the pool, the cache, and the defaults. Pass the handle to the
/// collaborators that need it; there is deliberately no process-wide
/// implicit session.
///
/// Dropping the last clone releases the connection pool.
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    transport: Arc<dyn Transport>,
    cache: PreparedCache,
    defaults: ExecutionOptions,
    retry: RetryParameters,
    keyspace: tokio::sync::Mutex<Option<String>>,
    metrics: Metrics,
}

impl Session {
    /// Connects to the cluster and returns a ready session.
    ///
    /// Opens the connection pool through `connector` and, if the
    /// configuration names a keyspace, performs the `USE` round trip before
    /// handing the session to the caller.
    pub async fn connect(
        config: SessionConfig,
        connector: &dyn Connector,
    ) -> Result<Session, ClientError> {
        let metrics = match &config.metrics_registry {
            Some(registry) => Metrics::new(registry)
                .map_err(|e| ClientError::Config(format!("metrics registry: {e}")))?,
            None => Metrics::detached(),
        };
        let transport = connector.open(&config.connect).await?;
        debug!(nodes = ?config.connect.nodes, "connection pool open");
        let session = Session {
            inner: Arc::new(SessionInner {
                transport,
                cache: PreparedCache::new(metrics.prepare.clone()),
                defaults: config.defaults,
                retry: config.retry,
                keyspace: tokio::sync::Mutex::new(None),
                metrics,
            }),
        };
        if let Some(keyspace) = &config.keyspace {
            session.use_keyspace(keyspace).await?;
        }
        Ok(session)
    }

    /// Switches the session's authoritative keyspace.
    ///
    /// This is an explicit round trip; the call returns only once the server
    /// has acknowledged the switch. A session has at most one authoritative
    /// keyspace at a time, so concurrent switches serialize.
    pub async fn use_keyspace(&self, keyspace: &str) -> Result<(), ClientError> {
        let mut current = self.inner.keyspace.lock().await;
        let response = self
            .inner
            .transport
            .send(Request::UseKeyspace {
                keyspace: keyspace.to_owned(),
            })
            .await?;
        match response.body {
            ResponseBody::SetKeyspace(name) => {
                debug!(keyspace = %name, "keyspace switched");
                *current = Some(name);
                Ok(())
            }
            other => Err(ClientError::Protocol(format!(
                "unexpected response to USE: {other:?}"
            ))),
        }
    }

    /// The session's current authoritative keyspace, if one has been
    /// selected.
    pub async fn keyspace(&self) -> Option<String> {
        self.inner.keyspace.lock().await.clone()
    }

    /// Prepares `text`, or returns the cached handle.
    ///
    /// At most one preparation round trip is issued per distinct text per
    /// session; concurrent calls for the same uncached text coalesce.
    pub async fn prepare(&self, text: &str) -> Result<PreparedStatement, ClientError> {
        self.inner.cache.prepare(&*self.inner.transport, text).await
    }

    /// Waits up to `timeout` for schema agreement across the cluster.
    pub async fn await_schema_agreement(&self, timeout: Duration) -> Result<bool, ClientError> {
        Ok(self.inner.transport.await_schema_agreement(timeout).await?)
    }

    /// Executes raw query text.
    ///
    /// The full text is shipped on every call; repeated executions should
    /// [`prepare`](Session::prepare) instead. Named values require parameter
    /// metadata and are therefore rejected here.
    pub async fn query<S, V>(&self, statement: S, values: V) -> Result<QueryResult, ClientError>
    where
        S: Into<Statement>,
        V: Into<Values>,
    {
        self.query_with_options(statement, values, ExecutionOptions::default())
            .await
    }

    /// Like [`Session::query`], with call-site options layered on top of the
    /// statement's and the session's.
    pub async fn query_with_options<S, V>(
        &self,
        statement: S,
        values: V,
        options: ExecutionOptions,
    ) -> Result<QueryResult, ClientError>
    where
        S: Into<Statement>,
        V: Into<Values>,
    {
        let statement = statement.into();
        self.inner.metrics.execute.queries.inc();
        let effective = self.effective(statement.options(), &options);
        let mut template = Template::Query {
            text: statement.text().to_owned(),
            values: positional_only(values.into())?,
        };
        let response = self.run(&mut template, &effective, None).await?;
        QueryResult::from_response(response)
    }

    /// Executes a prepared statement, shipping only its id and the bound
    /// values.
    pub async fn execute<V>(
        &self,
        statement: &PreparedStatement,
        values: V,
    ) -> Result<QueryResult, ClientError>
    where
        V: Into<Values>,
    {
        self.execute_with_options(statement, values, ExecutionOptions::default())
            .await
    }

    /// Like [`Session::execute`], with call-site options layered on top.
    pub async fn execute_with_options<V>(
        &self,
        statement: &PreparedStatement,
        values: V,
        options: ExecutionOptions,
    ) -> Result<QueryResult, ClientError>
    where
        V: Into<Values>,
    {
        self.inner.metrics.execute.executes.inc();
        let effective = self.effective(statement.options(), &options);
        let mut template = Template::Execute {
            statement: statement.clone(),
            values: statement.bind(values.into())?,
        };
        let response = self.run(&mut template, &effective, None).await?;
        QueryResult::from_response(response)
    }

    /// Executes a batch as one logical call, with one value set per member
    /// statement, positionally aligned.
    ///
    /// A member-count/value-set-count mismatch is a configuration error
    /// detected here, before anything is sent.
    pub async fn batch(
        &self,
        batch: &Batch,
        values: Vec<Values>,
    ) -> Result<QueryResult, ClientError> {
        self.batch_with_options(batch, values, ExecutionOptions::default())
            .await
    }

    /// Like [`Session::batch`], with call-site options layered on top.
    pub async fn batch_with_options(
        &self,
        batch: &Batch,
        values: Vec<Values>,
        options: ExecutionOptions,
    ) -> Result<QueryResult, ClientError> {
        self.inner.metrics.execute.batches.inc();
        batch.validate()?;
        if batch.len() != values.len() {
            return Err(ClientError::Config(format!(
                "batch has {} statements but {} value sets",
                batch.len(),
                values.len()
            )));
        }
        let mut entries = Vec::with_capacity(batch.len());
        for (statement, values) in batch.statements().iter().zip(values) {
            entries.push(match statement {
                BatchStatement::Prepared(stmt) => BatchEntry::Prepared {
                    id: stmt.id().clone(),
                    values: stmt.bind(values)?,
                },
                BatchStatement::Query(stmt) => BatchEntry::Query {
                    text: stmt.text().to_owned(),
                    values: positional_only(values)?,
                },
            });
        }
        let effective = self.effective(batch.options(), &options);
        let mut template = Template::Batch {
            kind: batch.kind(),
            entries,
        };
        let response = self.run(&mut template, &effective, None).await?;
        QueryResult::from_response(response)
    }

    /// Executes raw query text and returns a pager that transparently
    /// fetches follow-up pages as iteration drains the buffer.
    pub async fn query_iter<S, V>(&self, statement: S, values: V) -> Result<RowPager, ClientError>
    where
        S: Into<Statement>,
        V: Into<Values>,
    {
        let statement = statement.into();
        self.inner.metrics.execute.queries.inc();
        let effective = self.effective(statement.options(), &ExecutionOptions::default());
        let template = Template::Query {
            text: statement.text().to_owned(),
            values: positional_only(values.into())?,
        };
        RowPager::start(self.clone(), template, effective).await
    }

    /// Executes a prepared statement and returns a pager that transparently
    /// fetches follow-up pages as iteration drains the buffer.
    pub async fn execute_iter<V>(
        &self,
        statement: &PreparedStatement,
        values: V,
    ) -> Result<RowPager, ClientError>
    where
        V: Into<Values>,
    {
        self.inner.metrics.execute.executes.inc();
        let effective = self.effective(statement.options(), &ExecutionOptions::default());
        let template = Template::Execute {
            statement: statement.clone(),
            values: statement.bind(values.into())?,
        };
        RowPager::start(self.clone(), template, effective).await
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        &*self.inner.transport
    }

    pub(crate) fn cache(&self) -> &PreparedCache {
        &self.inner.cache
    }

    pub(crate) fn defaults(&self) -> &ExecutionOptions {
        &self.inner.defaults
    }

    pub(crate) fn retry_parameters(&self) -> &RetryParameters {
        &self.inner.retry
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }
}

/// Rejects named values for targets without parameter metadata.
fn positional_only(values: Values) -> Result<Vec<mz_cql_repr::CqlValue>, ClientError> {
    match values {
        Values::Positional(values) => Ok(values),
        Values::Named(_) => Err(ClientError::Config(
            "named values require a prepared statement".into(),
        )),
    }
}
