// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The result and paging model.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::Stream;
use uuid::Uuid;

use mz_cql_repr::{ColumnSpec, CqlValue, Row};

use crate::error::ClientError;
use crate::exec::Template;
use crate::options::ExecutionOptions;
use crate::session::Session;
use crate::transport::{Response, ResponseBody};

/// One page of a query's result: ordered rows plus column specifications.
///
/// Invariant: every row's arity equals the column specification count;
/// [`QueryResult::from_response`] rejects responses that violate it.
///
/// When the server indicates more pages exist, [`QueryResult::paging_state`]
/// holds the opaque continuation token. Callers that want transparent
/// continuation should use the `*_iter` session methods, which return a
/// [`RowPager`] instead.
#[derive(Clone, Debug)]
pub struct QueryResult {
    column_specs: Arc<Vec<ColumnSpec>>,
    rows: Vec<Row>,
    paging_state: Option<Bytes>,
    tracing_id: Option<Uuid>,
    warnings: Vec<String>,
}

impl QueryResult {
    pub(crate) fn from_response(response: Response) -> Result<QueryResult, ClientError> {
        let (column_specs, rows, paging_state) = match response.body {
            ResponseBody::Rows(page) => {
                for row in &page.rows {
                    if row.len() != page.column_specs.len() {
                        return Err(ClientError::Protocol(format!(
                            "row arity {} does not match {} column specs",
                            row.len(),
                            page.column_specs.len()
                        )));
                    }
                }
                (page.column_specs, page.rows, page.paging_state)
            }
            ResponseBody::Void | ResponseBody::SetKeyspace(_) => (Vec::new(), Vec::new(), None),
        };
        Ok(QueryResult {
            column_specs: Arc::new(column_specs),
            rows,
            paging_state,
            tracing_id: response.tracing_id,
            warnings: response.warnings,
        })
    }

    /// The buffered rows, in server order. No client-side reordering is ever
    /// performed.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consumes the result, returning its rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// The first row, if any. An empty result is not an error.
    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// The sole row of the result; errors unless the row count is exactly
    /// one.
    pub fn single_row(&self) -> Result<&Row, ClientError> {
        match self.rows.as_slice() {
            [row] => Ok(row),
            rows => Err(ClientError::NotSingleRow(rows.len())),
        }
    }

    /// The number of buffered rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Reports whether the result has no buffered rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The result's column specifications. Every row's arity equals this
    /// list's length.
    pub fn column_specs(&self) -> &[ColumnSpec] {
        &self.column_specs
    }

    /// The rows converted to name-to-value mappings using the column
    /// specifications.
    pub fn rows_mapped(&self) -> Vec<BTreeMap<String, CqlValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.column_specs
                    .iter()
                    .zip(row.iter())
                    .map(|(spec, value)| (spec.name.clone(), value.clone()))
                    .collect()
            })
            .collect()
    }

    /// The `[applied]` flag of a conditional (LWT) write, if this result
    /// carries one.
    ///
    /// A conditional write whose condition did not hold is a result, not an
    /// error; interpreting the flag is the caller's responsibility, and this
    /// accessor is the supported way to do it.
    pub fn applied(&self) -> Option<bool> {
        let position = self
            .column_specs
            .iter()
            .position(|spec| spec.name == "[applied]")?;
        self.rows.first()?.get(position)?.as_boolean()
    }

    /// The continuation token for the next page, if more pages exist.
    pub fn paging_state(&self) -> Option<&Bytes> {
        self.paging_state.as_ref()
    }

    /// Warnings the server attached to the response.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The tracing identifier, if tracing was requested.
    pub fn tracing_id(&self) -> Option<Uuid> {
        self.tracing_id
    }
}

/// Transparent iteration over a multi-page result.
///
/// The pager buffers one page at a time. [`RowPager::next_row`] is a
/// suspension point: draining the buffer triggers a follow-up fetch with
/// the same statement, the same parameter bindings, and the same effective
/// options, plus the continuation token, under the same retry policy as the
/// original call. Rows are yielded in server delivery order with no
/// duplication or loss; a result spanning N pages issues exactly N - 1
/// follow-up fetches.
#[derive(Debug)]
pub struct RowPager {
    session: Session,
    template: Template,
    effective: ExecutionOptions,
    column_specs: Arc<Vec<ColumnSpec>>,
    buffered: VecDeque<Row>,
    paging_state: Option<Bytes>,
}

impl RowPager {
    pub(crate) async fn start(
        session: Session,
        mut template: Template,
        effective: ExecutionOptions,
    ) -> Result<RowPager, ClientError> {
        let response = session.run(&mut template, &effective, None).await?;
        let page = QueryResult::from_response(response)?;
        Ok(RowPager {
            session,
            template,
            effective,
            column_specs: page.column_specs,
            buffered: page.rows.into(),
            paging_state: page.paging_state,
        })
    }

    /// Returns the next row, fetching the next page if the buffer is empty
    /// and a continuation token is held. Returns `None` once the result is
    /// exhausted.
    pub async fn next_row(&mut self) -> Result<Option<Row>, ClientError> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                return Ok(Some(row));
            }
            let Some(state) = self.paging_state.take() else {
                return Ok(None);
            };
            let response = self
                .session
                .run(&mut self.template, &self.effective, Some(state))
                .await?;
            let page = QueryResult::from_response(response)?;
            self.session.metrics().execute.pages_fetched.inc();
            self.column_specs = page.column_specs;
            self.buffered = page.rows.into();
            self.paging_state = page.paging_state;
        }
    }

    /// The column specifications of the pages seen so far.
    pub fn column_specs(&self) -> &[ColumnSpec] {
        &self.column_specs
    }

    /// Adapts the pager into a [`Stream`] of rows.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row, ClientError>> {
        futures::stream::try_unfold(self, |mut pager| async move {
            Ok(pager.next_row().await?.map(|row| (row, pager)))
        })
    }
}
