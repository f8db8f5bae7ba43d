// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Statements, prepared statements, and bound values.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use mz_cql_repr::{ColumnSpec, CqlValue};

use crate::error::ClientError;
use crate::options::ExecutionOptions;
use crate::transport::PreparedInfo;

/// A raw-text statement with attached execution options.
///
/// Raw-text execution always ships the full query text to the server; the
/// core never auto-prepares. Callers that execute the same text repeatedly
/// should [`prepare`](crate::session::Session::prepare) it instead.
#[derive(Clone, Debug)]
pub struct Statement {
    text: String,
    options: ExecutionOptions,
}

impl Statement {
    /// Constructs a statement from query text.
    pub fn new<T: Into<String>>(text: T) -> Statement {
        Statement {
            text: text.into(),
            options: ExecutionOptions::default(),
        }
    }

    /// Returns a copy with the given attached options.
    pub fn with_options(mut self, options: ExecutionOptions) -> Statement {
        self.options = options;
        self
    }

    /// The query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The attached options.
    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Statement {
        Statement::new(text)
    }
}

impl From<String> for Statement {
    fn from(text: String) -> Statement {
        Statement::new(text)
    }
}

#[derive(Debug)]
struct PreparedInner {
    id: Bytes,
    text: String,
    param_specs: Vec<ColumnSpec>,
    result_specs: Vec<ColumnSpec>,
}

/// A server-prepared statement.
///
/// The identity (the opaque server-assigned id) and the column metadata are
/// immutable and shared; [`PreparedStatement::with_options`] produces a new
/// logical handle with different options but the same identity. Execution
/// ships only the id and the bound values, never the text.
///
/// The id is stable for the lifetime of the session unless the server
/// invalidates it through a schema change, in which case the execution
/// engine transparently re-prepares; the caller's handle keeps working, at
/// the cost of one extra observable round trip.
#[derive(Clone, Debug)]
pub struct PreparedStatement {
    inner: Arc<PreparedInner>,
    options: ExecutionOptions,
}

impl PreparedStatement {
    pub(crate) fn new(info: PreparedInfo, text: &str) -> PreparedStatement {
        PreparedStatement {
            inner: Arc::new(PreparedInner {
                id: info.id,
                text: text.into(),
                param_specs: info.param_specs,
                result_specs: info.result_specs,
            }),
            options: ExecutionOptions::default(),
        }
    }

    /// Returns a new handle sharing this statement's identity, with the
    /// given attached options.
    pub fn with_options(&self, options: ExecutionOptions) -> PreparedStatement {
        PreparedStatement {
            inner: Arc::clone(&self.inner),
            options,
        }
    }

    /// The opaque server-assigned statement id.
    pub fn id(&self) -> &Bytes {
        &self.inner.id
    }

    /// The original query text.
    pub fn text(&self) -> &str {
        &self.inner.text
    }

    /// Column specifications for the bound parameters, in declaration order.
    pub fn param_specs(&self) -> &[ColumnSpec] {
        &self.inner.param_specs
    }

    /// Column specifications for the result columns.
    pub fn result_specs(&self) -> &[ColumnSpec] {
        &self.inner.result_specs
    }

    /// The attached options.
    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Resolves bound values to positional order.
    ///
    /// Named values are resolved using the parameter column specifications:
    /// order is determined by each parameter's declared position in the
    /// query text, not by name. Missing names, unknown names, and positional
    /// arity mismatches are configuration errors.
    pub fn bind(&self, values: Values) -> Result<Vec<CqlValue>, ClientError> {
        let specs = self.param_specs();
        match values {
            Values::Positional(values) => {
                if values.len() != specs.len() {
                    return Err(ClientError::Config(format!(
                        "statement takes {} bind parameters, {} provided",
                        specs.len(),
                        values.len()
                    )));
                }
                Ok(values)
            }
            Values::Named(mut map) => {
                let mut out = Vec::with_capacity(specs.len());
                for spec in specs {
                    match map.remove(&spec.name) {
                        Some(value) => out.push(value),
                        None => {
                            return Err(ClientError::Config(format!(
                                "no value provided for bind parameter {}",
                                spec.name
                            )));
                        }
                    }
                }
                if let Some((name, _)) = map.into_iter().next() {
                    return Err(ClientError::Config(format!(
                        "unknown bind parameter {name}"
                    )));
                }
                Ok(out)
            }
        }
    }
}

/// Values bound to a statement's parameters.
///
/// Positional values are shipped as-is. Named values are a client-side
/// convenience: they are resolved to positional order before transmission,
/// which requires the parameter metadata of a [`PreparedStatement`]. Binding
/// named values to a raw-text statement is a configuration error.
#[derive(Clone, Debug)]
pub enum Values {
    Positional(Vec<CqlValue>),
    Named(BTreeMap<String, CqlValue>),
}

impl Values {
    /// No bound values.
    pub fn empty() -> Values {
        Values::Positional(Vec::new())
    }

    /// Constructs named values from name and value pairs.
    pub fn named<N, V, I>(pairs: I) -> Values
    where
        N: Into<String>,
        V: Into<CqlValue>,
        I: IntoIterator<Item = (N, V)>,
    {
        Values::Named(
            pairs
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Vec<CqlValue>> for Values {
    fn from(values: Vec<CqlValue>) -> Values {
        Values::Positional(values)
    }
}

impl<const N: usize> From<[CqlValue; N]> for Values {
    fn from(values: [CqlValue; N]) -> Values {
        Values::Positional(values.into())
    }
}

impl From<BTreeMap<String, CqlValue>> for Values {
    fn from(map: BTreeMap<String, CqlValue>) -> Values {
        Values::Named(map)
    }
}
