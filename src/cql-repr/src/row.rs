// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Result rows.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::value::{CqlValue, FromCqlValue, ValueError};

/// One result row: a fixed-arity ordered sequence of values.
///
/// Rows are immutable once constructed and indexable by position. The arity
/// of every row in a result equals the result's column specification count;
/// the result model enforces that invariant at construction time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    values: Vec<CqlValue>,
}

impl Row {
    /// Constructs a row from its values, in column order.
    pub fn new(values: Vec<CqlValue>) -> Row {
        Row { values }
    }

    /// The number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reports whether this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `position`, if there is one.
    pub fn get(&self, position: usize) -> Option<&CqlValue> {
        self.values.get(position)
    }

    /// Returns the value at `position` converted to `T`.
    pub fn get_as<T: FromCqlValue>(&self, position: usize) -> Result<T, ValueError> {
        let value = self
            .values
            .get(position)
            .ok_or(ValueError::NoSuchColumn(position))?;
        T::from_cql(value.clone())
    }

    /// Iterates over the row's values in column order.
    pub fn iter(&self) -> impl Iterator<Item = &CqlValue> {
        self.values.iter()
    }

    /// Consumes the row, returning its values.
    pub fn into_values(self) -> Vec<CqlValue> {
        self.values
    }
}

impl Index<usize> for Row {
    type Output = CqlValue;

    fn index(&self, position: usize) -> &CqlValue {
        &self.values[position]
    }
}

impl IntoIterator for Row {
    type Item = CqlValue;
    type IntoIter = std::vec::IntoIter<CqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl From<Vec<CqlValue>> for Row {
    fn from(values: Vec<CqlValue>) -> Row {
        Row::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_access() {
        let row = Row::new(vec![CqlValue::Int(1), CqlValue::Text("a".into())]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&CqlValue::Int(1)));
        assert_eq!(row.get(2), None);
        assert_eq!(row[1], CqlValue::Text("a".into()));
    }

    #[test]
    fn test_typed_access() {
        let row = Row::new(vec![CqlValue::BigInt(5), CqlValue::Null]);
        assert_eq!(row.get_as::<i64>(0), Ok(5));
        assert_eq!(row.get_as::<Option<i64>>(1), Ok(None));
        assert_eq!(row.get_as::<i64>(9), Err(ValueError::NoSuchColumn(9)));
        assert_eq!(
            row.get_as::<bool>(0),
            Err(ValueError::TypeMismatch {
                target: "bool",
                found: "bigint",
            })
        );
    }
}
