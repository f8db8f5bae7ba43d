// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The error surface of the execution core.

use thiserror::Error;

use mz_cql_repr::ValueError;

use crate::transport::TransportError;

/// An error produced by the execution core.
///
/// One variant per machine-distinguishable kind. Transport-level and
/// transient server errors are absorbed by the retry policy up to its
/// ceiling before they surface here; terminal errors surface on first
/// occurrence.
///
/// A conditional (LWT) write whose condition did not hold is *not* an error:
/// the server reports it through the `[applied]` column, surfaced by
/// [`QueryResult::applied`](crate::result::QueryResult::applied).
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ClientError {
    /// A node was unreachable, a connection broke, or authentication failed.
    #[error("connection error: {0}")]
    Connection(String),
    /// The operation exceeded its deadline, on the client or the server.
    #[error("timeout: {0}")]
    Timeout(String),
    /// The server shed load. Transient; retryable if idempotent.
    #[error("server overloaded: {0}")]
    Overloaded(String),
    /// Not enough live replicas to satisfy the requested consistency.
    /// Transient; retryable if idempotent.
    #[error("not enough live replicas: {0}")]
    Unavailable(String),
    /// The query text failed to parse. Terminal; never retried.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// The query was well-formed but invalid. Terminal; never retried.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// The server's schema no longer matches a prepared statement, and
    /// re-preparation did not resolve it.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// The caller supplied an invalid configuration: mismatched batch value
    /// sets, named values against a raw statement, a non-positive page size.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// `single_row` was called on a result without exactly one row.
    #[error("expected exactly one row, found {0}")]
    NotSingleRow(usize),
    /// The transport returned a malformed response.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// A value could not be converted to the requested type.
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> ClientError {
        match err {
            TransportError::Unreachable(m) => ClientError::Connection(m),
            TransportError::Broken(m) => ClientError::Connection(m),
            TransportError::Auth(m) => ClientError::Connection(format!("authentication: {m}")),
            TransportError::ServerTimeout(m) => ClientError::Timeout(m),
            TransportError::Overloaded(m) => ClientError::Overloaded(m),
            TransportError::Unavailable { required, alive } => ClientError::Unavailable(format!(
                "required {required}, alive {alive}"
            )),
            TransportError::Syntax(m) => ClientError::Syntax(m),
            TransportError::Invalid(m) => ClientError::InvalidQuery(m),
            TransportError::Unprepared { .. } => ClientError::SchemaMismatch(
                "statement invalidated by a schema change".into(),
            ),
            TransportError::SchemaMismatch(m) => ClientError::SchemaMismatch(m),
        }
    }
}
