// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The execution engine: dispatch, outcome classification, and retries.

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, warn};

use mz_cql_repr::CqlValue;

use crate::batch::BatchKind;
use crate::error::ClientError;
use crate::options::ExecutionOptions;
use crate::retry::{classify, ErrorClass};
use crate::session::Session;
use crate::statement::PreparedStatement;
use crate::transport::{BatchEntry, Request, RequestParams, Response};

/// A resubmittable request: everything needed to build the wire request
/// again, for retries, transparent re-preparation, and follow-up page
/// fetches. The original parameter bindings are preserved verbatim across
/// resubmissions.
#[derive(Clone, Debug)]
pub(crate) enum Template {
    Query {
        text: String,
        values: Vec<CqlValue>,
    },
    Execute {
        statement: PreparedStatement,
        values: Vec<CqlValue>,
    },
    Batch {
        kind: BatchKind,
        entries: Vec<BatchEntry>,
    },
}

impl Template {
    fn to_request(&self, params: RequestParams) -> Request {
        match self {
            Template::Query { text, values } => Request::Query {
                text: text.clone(),
                values: values.clone(),
                params,
            },
            Template::Execute { statement, values } => Request::Execute {
                id: statement.id().clone(),
                values: values.clone(),
                params,
            },
            Template::Batch { kind, entries } => Request::Batch {
                kind: *kind,
                entries: entries.clone(),
                params,
            },
        }
    }
}

impl Session {
    /// Resolves the effective options for one call: session defaults at the
    /// bottom, then the target's attached options, then the call-site
    /// options on top.
    pub(crate) fn effective(
        &self,
        target: &ExecutionOptions,
        call: &ExecutionOptions,
    ) -> ExecutionOptions {
        self.defaults().overlay(target).overlay(call)
    }

    /// Runs one logical call to a terminal outcome: submits the request,
    /// classifies failures, applies the retry policy, and transparently
    /// re-prepares invalidated statements.
    ///
    /// The effective timeout, if any, bounds everything this function does,
    /// retries and re-preparations included.
    pub(crate) async fn run(
        &self,
        template: &mut Template,
        effective: &ExecutionOptions,
        paging_state: Option<Bytes>,
    ) -> Result<Response, ClientError> {
        if let Some(size) = effective.page_size() {
            if size <= 0 {
                return Err(ClientError::Config(format!(
                    "page size must be positive, got {size}"
                )));
            }
        }
        let params = RequestParams {
            consistency: effective.consistency().unwrap_or_default(),
            serial_consistency: effective.serial_consistency(),
            page_size: effective.page_size(),
            paging_state,
            timestamp: effective.timestamp(),
            tracing: effective.tracing().unwrap_or(false),
        };
        let deadline = effective.timeout().map(|t| Instant::now() + t);
        let idempotent = effective.idempotent().unwrap_or(false);
        let max_attempts = self.retry_parameters().max_attempts;
        let mut retry = self.retry_parameters().stream();
        self.metrics().retry.started.inc();
        let mut reprepared = false;

        loop {
            let request = template.to_request(params.clone());
            let outcome = self
                .bounded(deadline, effective, self.transport().send(request))
                .await?;
            let err = match outcome {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            match classify(&err) {
                ErrorClass::Terminal => {
                    self.metrics()
                        .execute
                        .errors
                        .with_label_values(&["terminal"])
                        .inc();
                    return Err(err.into());
                }
                ErrorClass::Unprepared => {
                    // A schema change invalidated the statement id. Evict,
                    // re-prepare once, and resubmit with the fresh id; the
                    // caller's logical handle is unaffected.
                    let Template::Execute { statement, .. } = template else {
                        return Err(err.into());
                    };
                    if reprepared {
                        self.metrics()
                            .execute
                            .errors
                            .with_label_values(&["unprepared"])
                            .inc();
                        return Err(ClientError::SchemaMismatch(format!(
                            "statement repeatedly invalidated by schema changes: {}",
                            statement.text()
                        )));
                    }
                    reprepared = true;
                    self.cache().evict(statement.text());
                    debug!(text = statement.text(), "re-preparing invalidated statement");
                    let fresh = self
                        .bounded(
                            deadline,
                            effective,
                            self.cache().prepare(self.transport(), statement.text()),
                        )
                        .await??;
                    let options = statement.options().clone();
                    *statement = fresh.with_options(options);
                }
                ErrorClass::Transient => {
                    let errors = &self.metrics().execute.errors;
                    if !idempotent {
                        // Resubmission could apply a duplicate side effect;
                        // surface immediately.
                        errors.with_label_values(&["transient"]).inc();
                        return Err(err.into());
                    }
                    if retry.attempt() + 1 >= max_attempts {
                        errors.with_label_values(&["transient"]).inc();
                        return Err(err.into());
                    }
                    if let Some(deadline) = deadline {
                        if Instant::now() + retry.next_sleep() >= deadline {
                            errors.with_label_values(&["transient"]).inc();
                            return Err(ClientError::Timeout(format!(
                                "deadline of {:?} leaves no room to retry: {err}",
                                effective.timeout().unwrap_or_default()
                            )));
                        }
                    }
                    warn!(
                        attempt = retry.attempt(),
                        backoff = ?retry.next_sleep(),
                        %err,
                        "transient error; retrying"
                    );
                    self.metrics().retry.retries.inc();
                    self.metrics()
                        .retry
                        .sleep_seconds
                        .inc_by(retry.next_sleep().as_secs_f64());
                    retry = retry.sleep().await;
                }
            }
        }
    }

    /// Awaits `fut`, bounded by the call's deadline if one is set.
    async fn bounded<T>(
        &self,
        deadline: Option<Instant>,
        effective: &ExecutionOptions,
        fut: impl std::future::Future<Output = T>,
    ) -> Result<T, ClientError> {
        match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                Ok(out) => Ok(out),
                Err(_) => Err(ClientError::Timeout(format!(
                    "operation exceeded deadline of {:?}",
                    effective.timeout().unwrap_or_default()
                ))),
            },
            None => Ok(fut.await),
        }
    }
}
