// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The narrow boundary between the execution core and the wire.
//!
//! Everything below this trait is out of scope for the core: frame encoding,
//! compression, TLS, cluster topology, node health, and load balancing all
//! live inside the [`Transport`] implementation. The core hands it a
//! [`Request`] and gets back a [`Response`] or a classified
//! [`TransportError`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use mz_cql_repr::{ColumnSpec, CqlValue, Row};

use crate::batch::BatchKind;
use crate::config::ConnectConfig;
use crate::options::{Consistency, SerialConsistency};

/// A handle to an open connection pool.
///
/// Implementations own per-node connection accounting, request routing, and
/// reconnection; the core only sends requests and interprets outcomes.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Sends one request and awaits its response.
    async fn send(&self, request: Request) -> Result<Response, TransportError>;

    /// Prepares `text` on the cluster, returning the statement's identity
    /// and column metadata.
    async fn prepare(&self, text: &str) -> Result<PreparedInfo, TransportError>;

    /// Waits up to `timeout` for all nodes to agree on the schema version.
    async fn await_schema_agreement(&self, timeout: Duration) -> Result<bool, TransportError>;
}

/// Opens connection pools. The session calls this exactly once, at
/// construction.
#[async_trait]
pub trait Connector: fmt::Debug + Send + Sync {
    /// Opens a connection pool to the configured nodes.
    async fn open(&self, config: &ConnectConfig) -> Result<Arc<dyn Transport>, TransportError>;
}

/// A request frame, one per logical round trip.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    /// Execute raw query text. Ships the full text every time.
    Query {
        text: String,
        values: Vec<CqlValue>,
        params: RequestParams,
    },
    /// Execute a prepared statement by id.
    Execute {
        id: Bytes,
        values: Vec<CqlValue>,
        params: RequestParams,
    },
    /// Execute a batch as one logical call.
    Batch {
        kind: BatchKind,
        entries: Vec<BatchEntry>,
        params: RequestParams,
    },
    /// Switch the session's authoritative keyspace.
    UseKeyspace { keyspace: String },
}

/// One member of a batch request, positionally aligned with its value set.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchEntry {
    Query { text: String, values: Vec<CqlValue> },
    Prepared { id: Bytes, values: Vec<CqlValue> },
}

/// Wire-level execution parameters, resolved from the effective
/// [`ExecutionOptions`](crate::options::ExecutionOptions).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestParams {
    pub consistency: Consistency,
    pub serial_consistency: Option<SerialConsistency>,
    /// Requested page size; `None` means the server default.
    pub page_size: Option<i32>,
    /// Continuation token from the previous page, for follow-up fetches.
    pub paging_state: Option<Bytes>,
    /// Timestamp override, microseconds since the epoch.
    pub timestamp: Option<i64>,
    pub tracing: bool,
}

/// A decoded response frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub body: ResponseBody,
    pub tracing_id: Option<Uuid>,
    pub warnings: Vec<String>,
}

/// The body of a response frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// The request succeeded and returned no rows.
    Void,
    /// The request returned (one page of) rows.
    Rows(RowsPage),
    /// The keyspace switch was acknowledged.
    SetKeyspace(String),
}

/// One page of a rows result.
#[derive(Clone, Debug, PartialEq)]
pub struct RowsPage {
    pub column_specs: Vec<ColumnSpec>,
    pub rows: Vec<Row>,
    /// Opaque continuation token; present iff more pages exist.
    pub paging_state: Option<Bytes>,
}

/// The metadata returned by a prepare round trip.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedInfo {
    /// The opaque server-assigned statement id.
    pub id: Bytes,
    /// Specs for the bound parameters, in declaration order.
    pub param_specs: Vec<ColumnSpec>,
    /// Specs for the result columns.
    pub result_specs: Vec<ColumnSpec>,
}

/// An error reported by the transport, either transport-level (the request
/// may or may not have reached a node) or decoded from a server error frame.
///
/// The retry policy classifies these; see
/// [`classify`](crate::retry::classify).
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TransportError {
    /// No node could be reached.
    #[error("node unreachable: {0}")]
    Unreachable(String),
    /// A connection dropped mid-request. The request may have been applied.
    #[error("connection broken: {0}")]
    Broken(String),
    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The server reported a coordinator-side timeout.
    #[error("server-side timeout: {0}")]
    ServerTimeout(String),
    /// The server shed load.
    #[error("server overloaded: {0}")]
    Overloaded(String),
    /// Too few live replicas for the requested consistency.
    #[error("unavailable: required {required}, alive {alive}")]
    Unavailable { required: i32, alive: i32 },
    /// The query text failed to parse.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// The query was well-formed but invalid.
    #[error("invalid query: {0}")]
    Invalid(String),
    /// The server no longer knows the statement id; a schema change
    /// invalidated it.
    #[error("unprepared statement")]
    Unprepared { id: Bytes },
    /// The cluster disagrees about the schema version.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}
