// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A client-side session and statement execution core for CQL-style
//! wide-column stores.
//!
//! The entry point is [`Session`]: connect once, share the cheaply cloneable
//! handle, and issue queries through it. Repeatedly executed statements
//! should be [prepared](Session::prepare); the session caches preparations
//! per distinct query text and coalesces concurrent preparations of the same
//! text into a single round trip.
//!
//! Execution options resolve in three layers: session defaults, options
//! attached to a statement or batch, and options passed at the call site,
//! with the call site winning. Transient failures are retried only for
//! calls explicitly marked idempotent, under bounded exponential backoff
//! and the call's deadline.
//!
//! The wire protocol itself lives behind the [`Transport`](transport::Transport)
//! trait; [`mock::MockTransport`] provides a scripted in-memory
//! implementation for tests.

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
mod exec;
pub mod metrics;
pub mod mock;
pub mod options;
pub mod result;
pub mod retry;
pub mod session;
pub mod statement;
pub mod transport;

pub use crate::batch::{Batch, BatchKind, BatchStatement};
pub use crate::config::{Compression, ConnectConfig, Credentials, SessionConfig};
pub use crate::error::ClientError;
pub use crate::options::{Consistency, ExecutionOptions, SerialConsistency};
pub use crate::result::{QueryResult, RowPager};
pub use crate::retry::RetryParameters;
pub use crate::session::Session;
pub use crate::statement::{PreparedStatement, Statement, Values};
