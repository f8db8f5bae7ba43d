// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! CQL values and conversions to and from Rust types.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// An error produced while converting a [`CqlValue`] to a Rust type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The row has no column at the requested position.
    #[error("no column at position {0}")]
    NoSuchColumn(usize),
    /// The value's type does not match the requested Rust type.
    #[error("cannot convert {found} value to {target}")]
    TypeMismatch {
        /// The requested Rust type.
        target: &'static str,
        /// The kind of value actually present.
        found: &'static str,
    },
}

/// A single CQL value.
///
/// One variant per wire type, plus [`CqlValue::Null`] for absent cells.
/// Temporal variants store the server's raw encoding (milliseconds since the
/// epoch for `Timestamp`, days since the epoch for `Date`, nanoseconds since
/// midnight for `Time`); interpretation is left to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CqlValue {
    Ascii(String),
    BigInt(i64),
    Blob(Vec<u8>),
    Boolean(bool),
    Counter(i64),
    Date(u32),
    Decimal {
        unscaled: Vec<u8>,
        scale: i32,
    },
    Double(f64),
    Duration {
        months: i32,
        days: i32,
        nanoseconds: i64,
    },
    Float(f32),
    Inet(IpAddr),
    Int(i32),
    List(Vec<CqlValue>),
    /// Key and value pairs in server order. CQL maps have no client-side
    /// ordering guarantee, so we keep what the server sent.
    Map(Vec<(CqlValue, CqlValue)>),
    Set(Vec<CqlValue>),
    SmallInt(i16),
    Text(String),
    Time(i64),
    Timestamp(i64),
    TimeUuid(Uuid),
    TinyInt(i8),
    /// Tuple members may individually be null.
    Tuple(Vec<Option<CqlValue>>),
    Uuid(Uuid),
    Varint(Vec<u8>),
    Null,
}

impl CqlValue {
    /// Reports whether this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, CqlValue::Null)
    }

    /// Returns the contained string, if this is an `Ascii` or `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CqlValue::Ascii(s) | CqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the contained 64-bit integer, if this is a `BigInt` or
    /// `Counter` value.
    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            CqlValue::BigInt(i) | CqlValue::Counter(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the contained 32-bit integer, if this is an `Int` value.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            CqlValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the contained boolean, if this is a `Boolean` value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            CqlValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the contained double, if this is a `Double` value.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            CqlValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the contained blob, if this is a `Blob` value.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            CqlValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the contained UUID, if this is a `Uuid` or `TimeUuid` value.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            CqlValue::Uuid(u) | CqlValue::TimeUuid(u) => Some(*u),
            _ => None,
        }
    }

    /// A short name for the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CqlValue::Ascii(_) => "ascii",
            CqlValue::BigInt(_) => "bigint",
            CqlValue::Blob(_) => "blob",
            CqlValue::Boolean(_) => "boolean",
            CqlValue::Counter(_) => "counter",
            CqlValue::Date(_) => "date",
            CqlValue::Decimal { .. } => "decimal",
            CqlValue::Double(_) => "double",
            CqlValue::Duration { .. } => "duration",
            CqlValue::Float(_) => "float",
            CqlValue::Inet(_) => "inet",
            CqlValue::Int(_) => "int",
            CqlValue::List(_) => "list",
            CqlValue::Map(_) => "map",
            CqlValue::Set(_) => "set",
            CqlValue::SmallInt(_) => "smallint",
            CqlValue::Text(_) => "text",
            CqlValue::Time(_) => "time",
            CqlValue::Timestamp(_) => "timestamp",
            CqlValue::TimeUuid(_) => "timeuuid",
            CqlValue::TinyInt(_) => "tinyint",
            CqlValue::Tuple(_) => "tuple",
            CqlValue::Uuid(_) => "uuid",
            CqlValue::Varint(_) => "varint",
            CqlValue::Null => "null",
        }
    }
}

impl From<i64> for CqlValue {
    fn from(i: i64) -> CqlValue {
        CqlValue::BigInt(i)
    }
}

impl From<i32> for CqlValue {
    fn from(i: i32) -> CqlValue {
        CqlValue::Int(i)
    }
}

impl From<bool> for CqlValue {
    fn from(b: bool) -> CqlValue {
        CqlValue::Boolean(b)
    }
}

impl From<f64> for CqlValue {
    fn from(d: f64) -> CqlValue {
        CqlValue::Double(d)
    }
}

impl From<String> for CqlValue {
    fn from(s: String) -> CqlValue {
        CqlValue::Text(s)
    }
}

impl From<&str> for CqlValue {
    fn from(s: &str) -> CqlValue {
        CqlValue::Text(s.into())
    }
}

impl From<Vec<u8>> for CqlValue {
    fn from(b: Vec<u8>) -> CqlValue {
        CqlValue::Blob(b)
    }
}

impl From<Uuid> for CqlValue {
    fn from(u: Uuid) -> CqlValue {
        CqlValue::Uuid(u)
    }
}

impl<V: Into<CqlValue>> From<Option<V>> for CqlValue {
    fn from(v: Option<V>) -> CqlValue {
        match v {
            Some(v) => v.into(),
            None => CqlValue::Null,
        }
    }
}

/// A Rust type that a [`CqlValue`] can be converted into.
///
/// `Option<T>` treats `Null` as `None`, so nullable columns can be read
/// without a separate null check.
pub trait FromCqlValue: Sized {
    /// Converts `value`, or reports why it cannot be converted.
    fn from_cql(value: CqlValue) -> Result<Self, ValueError>;
}

macro_rules! from_cql {
    ($t:ty, $target:literal, $($p:pat => $e:expr),+) => {
        impl FromCqlValue for $t {
            fn from_cql(value: CqlValue) -> Result<Self, ValueError> {
                match value {
                    $($p => Ok($e),)+
                    other => Err(ValueError::TypeMismatch {
                        target: $target,
                        found: other.kind(),
                    }),
                }
            }
        }
    };
}

from_cql!(i64, "i64", CqlValue::BigInt(i) => i, CqlValue::Counter(i) => i, CqlValue::Timestamp(i) => i, CqlValue::Time(i) => i);
from_cql!(i32, "i32", CqlValue::Int(i) => i);
from_cql!(i16, "i16", CqlValue::SmallInt(i) => i);
from_cql!(i8, "i8", CqlValue::TinyInt(i) => i);
from_cql!(bool, "bool", CqlValue::Boolean(b) => b);
from_cql!(f64, "f64", CqlValue::Double(d) => d);
from_cql!(f32, "f32", CqlValue::Float(f) => f);
from_cql!(String, "String", CqlValue::Ascii(s) => s, CqlValue::Text(s) => s);
from_cql!(Vec<u8>, "Vec<u8>", CqlValue::Blob(b) => b, CqlValue::Varint(b) => b);
from_cql!(Uuid, "Uuid", CqlValue::Uuid(u) => u, CqlValue::TimeUuid(u) => u);
from_cql!(IpAddr, "IpAddr", CqlValue::Inet(addr) => addr);

impl<T: FromCqlValue> FromCqlValue for Option<T> {
    fn from_cql(value: CqlValue) -> Result<Self, ValueError> {
        match value {
            CqlValue::Null => Ok(None),
            other => T::from_cql(other).map(Some),
        }
    }
}

impl<T: FromCqlValue> FromCqlValue for Vec<T> {
    fn from_cql(value: CqlValue) -> Result<Self, ValueError> {
        match value {
            CqlValue::List(items) | CqlValue::Set(items) => {
                items.into_iter().map(T::from_cql).collect()
            }
            other => Err(ValueError::TypeMismatch {
                target: "Vec<_>",
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(CqlValue::Text("a".into()).as_text(), Some("a"));
        assert_eq!(CqlValue::Ascii("a".into()).as_text(), Some("a"));
        assert_eq!(CqlValue::Int(1).as_text(), None);
        assert_eq!(CqlValue::Counter(7).as_bigint(), Some(7));
        assert!(CqlValue::Null.is_null());
        assert!(!CqlValue::Int(0).is_null());
    }

    #[test]
    fn test_from_cql() {
        assert_eq!(i64::from_cql(CqlValue::BigInt(42)), Ok(42));
        assert_eq!(
            i64::from_cql(CqlValue::Text("x".into())),
            Err(ValueError::TypeMismatch {
                target: "i64",
                found: "text",
            })
        );
        assert_eq!(Option::<i32>::from_cql(CqlValue::Null), Ok(None));
        assert_eq!(Option::<i32>::from_cql(CqlValue::Int(3)), Ok(Some(3)));
        assert_eq!(
            Vec::<String>::from_cql(CqlValue::Set(vec![CqlValue::Text("a".into())])),
            Ok(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_from_rust() {
        assert_eq!(CqlValue::from(3i32), CqlValue::Int(3));
        assert_eq!(CqlValue::from("x"), CqlValue::Text("x".into()));
        assert_eq!(CqlValue::from(None::<i64>), CqlValue::Null);
        assert_eq!(CqlValue::from(Some(3i64)), CqlValue::BigInt(3));
    }
}
