//! Nullable scalar wrappers.
//!
//! [`Nullable<T>`] carries a value plus a validity flag. Unlike a bare field,
//! a nullable field is never treated as "zero" by the reflector: a valid
//! wrapper is always written (even when it holds `0` or `""`), an invalid one
//! never is. That makes the wrappers the way to set a column back to its zero
//! value in an UPDATE.
//!
//! With serde, a valid wrapper serializes as its bare value and an invalid one
//! as `null`.

use crate::scan::{ConvertError, FromSqlValue, SqlValue};
use crate::value::ToColumn;
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

/// A value that may be SQL `NULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nullable<T> {
    pub value: T,
    pub valid: bool,
}

pub type NullString = Nullable<String>;
pub type NullInt64 = Nullable<i64>;
pub type NullFloat64 = Nullable<f64>;
pub type NullBool = Nullable<bool>;
pub type NullTime = Nullable<DateTime<Utc>>;

impl<T> Nullable<T> {
    /// A valid wrapper holding `value`.
    pub fn new(value: T) -> Self {
        Self { value, valid: true }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn as_option(&self) -> Option<&T> {
        self.valid.then_some(&self.value)
    }

    pub fn into_option(self) -> Option<T> {
        self.valid.then_some(self.value)
    }
}

impl<T: Default> Nullable<T> {
    /// An invalid (`NULL`) wrapper.
    pub fn null() -> Self {
        Self {
            value: T::default(),
            valid: false,
        }
    }

    /// `Some` becomes a valid wrapper, `None` an invalid one.
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or_else(Self::null, Self::new)
    }
}

impl NullInt64 {
    /// The held integer as an `isize`, or `0` when `NULL` or out of range.
    pub fn int(&self) -> isize {
        self.as_option()
            .and_then(|v| isize::try_from(*v).ok())
            .unwrap_or_default()
    }
}

impl<T: Default> Default for Nullable<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<T> for Nullable<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl From<&str> for NullString {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

// ─── Reflection ─────────────────────────────────────────────────────────────

impl<T: ToColumn> ToColumn for Nullable<T> {
    fn is_zero(&self) -> bool {
        false
    }

    fn render(&self) -> Option<String> {
        if self.valid {
            self.value.render()
        } else {
            None
        }
    }
}

impl<T: FromSqlValue + Default> FromSqlValue for Nullable<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Null => Ok(Self::null()),
            other => T::from_sql_value(other).map(Self::new),
        }
    }
}

// ─── serde ──────────────────────────────────────────────────────────────────

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.valid {
            serializer.serialize_some(&self.value)
        } else {
            serializer.serialize_none()
        }
    }
}

impl<'de, T: Deserialize<'de> + Default> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from_option)
    }
}

// ─── ToSql / FromSql ────────────────────────────────────────────────────────

impl<T: ToSql> ToSql for Nullable<T> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if self.valid {
            self.value.to_sql(ty, out)
        } else {
            Ok(IsNull::Yes)
        }
    }

    fn accepts(ty: &Type) -> bool {
        T::accepts(ty)
    }

    tokio_postgres::types::to_sql_checked!();
}

impl<'a, T: FromSql<'a> + Default> FromSql<'a> for Nullable<T> {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        T::from_sql(ty, raw).map(Self::new)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self::null())
    }

    fn accepts(ty: &Type) -> bool {
        T::accepts(ty)
    }
}
