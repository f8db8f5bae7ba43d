// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A scripted in-memory transport, for tests.
//!
//! The mock replays queued outcomes in FIFO order and records every request
//! it sees, so tests can assert on exactly what reached the wire: how many
//! round trips, in what order, with which parameters. When a script runs
//! dry the mock answers with a benign default (a void response, an empty
//! prepared statement), keeping incidental calls out of test scripts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use mz_cql_repr::{ColumnSpec, Row};

use crate::config::ConnectConfig;
use crate::transport::{
    Connector, PreparedInfo, Request, Response, ResponseBody, RowsPage, Transport, TransportError,
};

#[derive(Debug, Default)]
struct MockState {
    send_script: VecDeque<Result<Response, TransportError>>,
    prepare_script: VecDeque<Result<PreparedInfo, TransportError>>,
    sent: Vec<Request>,
    prepared: Vec<String>,
    send_delay: Option<Duration>,
    prepare_delay: Option<Duration>,
}

/// A scripted [`Transport`].
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Arc<MockTransport> {
        Arc::new(MockTransport::default())
    }

    /// Queues the outcome of the next unscripted `send`.
    pub fn enqueue_send(&self, outcome: Result<Response, TransportError>) {
        self.state
            .lock()
            .expect("lock poisoned")
            .send_script
            .push_back(outcome);
    }

    /// Queues the outcome of the next unscripted `prepare`.
    pub fn enqueue_prepare(&self, outcome: Result<PreparedInfo, TransportError>) {
        self.state
            .lock()
            .expect("lock poisoned")
            .prepare_script
            .push_back(outcome);
    }

    /// Makes every `send` take `delay` before resolving.
    pub fn set_send_delay(&self, delay: Duration) {
        self.state.lock().expect("lock poisoned").send_delay = Some(delay);
    }

    /// Makes every `prepare` take `delay` before resolving.
    pub fn set_prepare_delay(&self, delay: Duration) {
        self.state.lock().expect("lock poisoned").prepare_delay = Some(delay);
    }

    /// Every request passed to `send`, in order.
    pub fn sent(&self) -> Vec<Request> {
        self.state.lock().expect("lock poisoned").sent.clone()
    }

    /// The number of `send` round trips issued.
    pub fn send_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").sent.len()
    }

    /// Every text passed to `prepare`, in order.
    pub fn prepared(&self) -> Vec<String> {
        self.state.lock().expect("lock poisoned").prepared.clone()
    }

    /// The number of prepare round trips issued.
    pub fn prepare_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").prepared.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let (delay, outcome) = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.sent.push(request);
            (state.send_delay, state.send_script.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome.unwrap_or_else(|| Ok(void_response()))
    }

    async fn prepare(&self, text: &str) -> Result<PreparedInfo, TransportError> {
        let (delay, outcome) = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.prepared.push(text.to_owned());
            (state.prepare_delay, state.prepare_script.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome.unwrap_or_else(|| {
            Ok(PreparedInfo {
                id: Bytes::from_static(b"mock-id"),
                param_specs: vec![],
                result_specs: vec![],
            })
        })
    }

    async fn await_schema_agreement(&self, _timeout: Duration) -> Result<bool, TransportError> {
        Ok(true)
    }
}

/// A [`Connector`] that hands out a shared [`MockTransport`] and records the
/// connect configuration it was opened with.
#[derive(Debug)]
pub struct MockConnector {
    transport: Arc<MockTransport>,
    opened_with: Mutex<Vec<ConnectConfig>>,
}

impl MockConnector {
    pub fn new(transport: Arc<MockTransport>) -> MockConnector {
        MockConnector {
            transport,
            opened_with: Mutex::new(Vec::new()),
        }
    }

    /// The configurations `open` was called with.
    pub fn opened_with(&self) -> Vec<ConnectConfig> {
        self.opened_with.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, config: &ConnectConfig) -> Result<Arc<dyn Transport>, TransportError> {
        self.opened_with
            .lock()
            .expect("lock poisoned")
            .push(config.clone());
        Ok(Arc::clone(&self.transport) as Arc<dyn Transport>)
    }
}

/// A successful response with no rows.
pub fn void_response() -> Response {
    Response {
        body: ResponseBody::Void,
        tracing_id: None,
        warnings: Vec::new(),
    }
}

/// A successful `SetKeyspace` response.
pub fn set_keyspace_response(keyspace: &str) -> Response {
    Response {
        body: ResponseBody::SetKeyspace(keyspace.to_owned()),
        tracing_id: None,
        warnings: Vec::new(),
    }
}

/// A successful rows response.
pub fn rows_response(
    column_specs: Vec<ColumnSpec>,
    rows: Vec<Row>,
    paging_state: Option<Bytes>,
) -> Response {
    Response {
        body: ResponseBody::Rows(RowsPage {
            column_specs,
            rows,
            paging_state,
        }),
        tracing_id: None,
        warnings: Vec::new(),
    }
}
