// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The CQL data model.
//!
//! This crate holds the representation shared by everything that touches
//! query results: the type descriptors a server reports for bound parameters
//! and result columns ([`ColumnType`], [`ColumnSpec`]), the values that flow
//! in and out of statements ([`CqlValue`](crate::value::CqlValue)), and the
//! fixed-arity [`Row`](crate::row::Row) that results are made of.

use serde::{Deserialize, Serialize};

pub mod row;
pub mod value;

pub use crate::row::Row;
pub use crate::value::{CqlValue, FromCqlValue, ValueError};

/// The type of a single CQL column, as reported by the server in a prepared
/// statement's metadata or in a rows response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Date,
    Decimal,
    Double,
    Duration,
    Float,
    Inet,
    Int,
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Set(Box<ColumnType>),
    SmallInt,
    Text,
    Time,
    Timestamp,
    TimeUuid,
    TinyInt,
    Tuple(Vec<ColumnType>),
    Uuid,
    Varint,
}

/// The name and type of one column, in declaration order.
///
/// A prepared statement carries one list of these for its bound parameters
/// and one for its result columns; a rows response carries one per result
/// column. Positional order is authoritative everywhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// The column (or bind parameter) name.
    pub name: String,
    /// The column type.
    pub typ: ColumnType,
}

impl ColumnSpec {
    /// Constructs a column specification.
    pub fn new<N: Into<String>>(name: N, typ: ColumnType) -> ColumnSpec {
        ColumnSpec {
            name: name.into(),
            typ,
        }
    }
}
