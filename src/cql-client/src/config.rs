// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Session and connection configuration.

use std::time::Duration;

use crate::options::ExecutionOptions;
use crate::retry::RetryParameters;

/// The compression algorithm the transport should negotiate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Lz4,
    Snappy,
}

/// Credentials for password authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keep the password out of logs.
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Configuration handed to [`Connector::open`](crate::transport::Connector).
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectConfig {
    /// Initially known node addresses, `host:port`.
    pub nodes: Vec<String>,
    /// Credentials, if the cluster requires authentication.
    pub credentials: Option<Credentials>,
    /// Connections to open per node.
    pub pool_size_per_node: usize,
    /// Compression to negotiate.
    pub compression: Compression,
    /// Whether to set TCP_NODELAY on connections.
    pub tcp_nodelay: bool,
    /// Timeout for establishing each connection.
    pub connect_timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> ConnectConfig {
        ConnectConfig {
            nodes: Vec::new(),
            credentials: None,
            pool_size_per_node: 1,
            compression: Compression::None,
            tcp_nodelay: true,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for a [`Session`](crate::session::Session).
///
/// A plain value, not a builder: construct it, adjust the fields you care
/// about, and pass it to [`Session::connect`](crate::session::Session::connect).
#[derive(Clone, Default)]
pub struct SessionConfig {
    /// Connection pool configuration.
    pub connect: ConnectConfig,
    /// Keyspace to select before the session is handed to the caller.
    pub keyspace: Option<String>,
    /// Session-default execution options, the bottom layer of option
    /// resolution.
    pub defaults: ExecutionOptions,
    /// Retry policy parameters.
    pub retry: RetryParameters,
    /// Registry to expose the session's metrics on. When unset, metrics are
    /// recorded but not exported.
    pub metrics_registry: Option<prometheus::Registry>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("connect", &self.connect)
            .field("keyspace", &self.keyspace)
            .field("defaults", &self.defaults)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
