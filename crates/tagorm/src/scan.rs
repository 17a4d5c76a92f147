//! Row scanning: result columns back into entity fields.
//!
//! Each result column is matched (case-insensitively) against the entity's
//! resolved tag names, falling back to the field identifier. The driver value
//! is read as a [`SqlValue`] and assigned straight into the field through
//! [`FromSqlValue`]; columns with no matching field are ignored.
//!
//! ```ignore
//! let rows = client.query(&sql, &tagorm::params(&args)).await?;
//! let games: Vec<Game> = rows.iter().map(tagorm::scan_row).collect::<OrmResult<_>>()?;
//! ```

use crate::entity::{DEFAULT_TAG_KEY, Entity, Schema};
use crate::error::{OrmError, OrmResult};
use crate::value::{format_timestamp, parse_bool};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Type};

/// A driver value, detached from the wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Array(Vec<SqlValue>),
}

impl SqlValue {
    fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Decimal(_) => "numeric",
            SqlValue::Json(_) => "json",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Array(_) => "array",
        }
    }

    fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(v) => SqlValue::Bool(v),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(v) => SqlValue::Int(v),
                None => n.as_f64().map_or(SqlValue::Null, SqlValue::Float),
            },
            serde_json::Value::String(s) => SqlValue::Text(s),
            serde_json::Value::Array(items) => {
                SqlValue::Array(items.into_iter().map(SqlValue::from_json).collect())
            }
            object => SqlValue::Json(object),
        }
    }
}

/// A driver value that does not fit the destination field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {found} into {expected}")]
pub struct ConvertError {
    pub expected: &'static str,
    pub found: String,
}

impl ConvertError {
    fn new(expected: &'static str, value: &SqlValue) -> Self {
        let found = match value {
            SqlValue::Text(s) => format!("text {s:?}"),
            SqlValue::Int(v) => format!("integer {v}"),
            SqlValue::Float(v) => format!("float {v}"),
            other => other.kind().to_string(),
        };
        Self { expected, found }
    }
}

/// A field type the scanner can assign from a driver value.
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError>;
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            SqlValue::Int(v) => Ok(v.to_string()),
            SqlValue::Float(v) => Ok(v.to_string()),
            SqlValue::Bool(v) => Ok(v.to_string()),
            SqlValue::Timestamp(v) => Ok(format_timestamp(&v)),
            SqlValue::Decimal(v) => Ok(v.to_string()),
            SqlValue::Json(v) => Ok(v.to_string()),
            SqlValue::Bytes(b) => {
                String::from_utf8(b).map_err(|_| ConvertError {
                    expected: "String",
                    found: "non-utf8 bytes".to_string(),
                })
            }
            other => Err(ConvertError::new("String", &other)),
        }
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            SqlValue::Int(1) => Ok(true),
            SqlValue::Int(0) => Ok(false),
            SqlValue::Text(ref s) => parse_bool(s).ok_or_else(|| ConvertError::new("bool", &value)),
            other => Err(ConvertError::new("bool", &other)),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Int(v) => Ok(v),
            SqlValue::Decimal(ref d) if d.fract().is_zero() => {
                d.to_i64().ok_or_else(|| ConvertError::new("i64", &value))
            }
            SqlValue::Text(ref s) => s.trim().parse().map_err(|_| ConvertError::new("i64", &value)),
            other => Err(ConvertError::new("i64", &other)),
        }
    }
}

macro_rules! narrow_int {
    ($($t:ty),+ $(,)?) => {
        $(impl FromSqlValue for $t {
            fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
                let err = ConvertError::new(stringify!($t), &value);
                i64::from_sql_value(value)
                    .ok()
                    .and_then(|v| <$t>::try_from(v).ok())
                    .ok_or(err)
            }
        })+
    };
}

narrow_int!(i8, i16, i32, isize, u8, u16, u32, u64, usize);

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Float(v) => Ok(v),
            SqlValue::Int(v) => Ok(v as f64),
            SqlValue::Decimal(ref d) => d.to_f64().ok_or_else(|| ConvertError::new("f64", &value)),
            SqlValue::Text(ref s) => s.trim().parse().map_err(|_| ConvertError::new("f64", &value)),
            other => Err(ConvertError::new("f64", &other)),
        }
    }
}

impl FromSqlValue for f32 {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Float(v) => Ok(v as f32),
            SqlValue::Int(v) => Ok(v as f32),
            SqlValue::Decimal(ref d) => d.to_f32().ok_or_else(|| ConvertError::new("f32", &value)),
            SqlValue::Text(ref s) => s.trim().parse().map_err(|_| ConvertError::new("f32", &value)),
            other => Err(ConvertError::new("f32", &other)),
        }
    }
}

impl FromSqlValue for Decimal {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Decimal(v) => Ok(v),
            SqlValue::Int(v) => Ok(Decimal::from(v)),
            SqlValue::Float(v) => Decimal::try_from(v).map_err(|_| ConvertError::new("Decimal", &value)),
            SqlValue::Text(ref s) => s.trim().parse().map_err(|_| ConvertError::new("Decimal", &value)),
            other => Err(ConvertError::new("Decimal", &other)),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Timestamp(v) => Ok(v),
            SqlValue::Text(ref s) => DateTime::parse_from_rfc3339(s)
                .map(|v| v.with_timezone(&Utc))
                .map_err(|_| ConvertError::new("DateTime<Utc>", &value)),
            other => Err(ConvertError::new("DateTime<Utc>", &other)),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Timestamp(v) => Ok(v.naive_utc()),
            SqlValue::Text(ref s) => DateTime::parse_from_rfc3339(s)
                .map(|v| v.naive_utc())
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .map_err(|_| ConvertError::new("NaiveDateTime", &value)),
            other => Err(ConvertError::new("NaiveDateTime", &other)),
        }
    }
}

impl FromSqlValue for uuid::Uuid {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Text(ref s) => {
                uuid::Uuid::parse_str(s).map_err(|_| ConvertError::new("Uuid", &value))
            }
            SqlValue::Bytes(ref b) => {
                uuid::Uuid::from_slice(b).map_err(|_| ConvertError::new("Uuid", &value))
            }
            other => Err(ConvertError::new("Uuid", &other)),
        }
    }
}

impl FromSqlValue for serde_json::Value {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Null => Ok(serde_json::Value::Null),
            SqlValue::Json(v) => Ok(v),
            SqlValue::Bool(v) => Ok(v.into()),
            SqlValue::Int(v) => Ok(v.into()),
            SqlValue::Float(v) => Ok(v.into()),
            SqlValue::Decimal(v) => Ok(serde_json::Value::String(v.to_string())),
            SqlValue::Text(s) => Ok(serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))),
            other => Err(ConvertError::new("serde_json::Value", &other)),
        }
    }
}

/// Collections read from array columns, `bytea` (one element per byte), JSON
/// arrays, and the JSON array text a collection field is written as.
impl<T: FromSqlValue> FromSqlValue for Vec<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        let items = match value {
            SqlValue::Array(items) => items,
            SqlValue::Bytes(bytes) => bytes.into_iter().map(|b| SqlValue::Int(b.into())).collect(),
            SqlValue::Json(serde_json::Value::Array(items)) => {
                items.into_iter().map(SqlValue::from_json).collect()
            }
            SqlValue::Text(ref s) => match serde_json::from_str(s) {
                Ok(serde_json::Value::Array(items)) => {
                    items.into_iter().map(SqlValue::from_json).collect()
                }
                _ => return Err(ConvertError::new("Vec", &value)),
            },
            other => return Err(ConvertError::new("Vec", &other)),
        };
        items.into_iter().map(T::from_sql_value).collect()
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Box<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConvertError> {
        T::from_sql_value(value).map(Box::new)
    }
}

/// A result row the scanner can read.
pub trait RowReader {
    /// Result column names, in select-list order.
    fn column_names(&self) -> Vec<&str>;

    /// The value of the column at `index`.
    fn value(&self, index: usize) -> OrmResult<SqlValue>;
}

/// Read an array column, mapping each non-NULL element.
fn array<'a, T: FromSql<'a>>(
    row: &'a Row,
    index: usize,
    element: impl Fn(T) -> SqlValue,
) -> Result<Option<SqlValue>, tokio_postgres::Error> {
    let items = row.try_get::<_, Option<Vec<Option<T>>>>(index)?;
    Ok(items.map(|items| {
        SqlValue::Array(
            items
                .into_iter()
                .map(|item| item.map_or(SqlValue::Null, &element))
                .collect(),
        )
    }))
}

impl RowReader for Row {
    fn column_names(&self) -> Vec<&str> {
        self.columns().iter().map(|c| c.name()).collect()
    }

    fn value(&self, index: usize) -> OrmResult<SqlValue> {
        let column = self
            .columns()
            .get(index)
            .ok_or_else(|| OrmError::decode(index.to_string(), "column index out of range"))?;
        let decode = |e: tokio_postgres::Error| OrmError::decode(column.name(), e.to_string());

        let value = match *column.type_() {
            Type::BOOL => self
                .try_get::<_, Option<bool>>(index)
                .map_err(decode)?
                .map(SqlValue::Bool),
            Type::INT2 => self
                .try_get::<_, Option<i16>>(index)
                .map_err(decode)?
                .map(|v| SqlValue::Int(v.into())),
            Type::INT4 => self
                .try_get::<_, Option<i32>>(index)
                .map_err(decode)?
                .map(|v| SqlValue::Int(v.into())),
            Type::INT8 => self
                .try_get::<_, Option<i64>>(index)
                .map_err(decode)?
                .map(SqlValue::Int),
            Type::OID => self
                .try_get::<_, Option<u32>>(index)
                .map_err(decode)?
                .map(|v| SqlValue::Int(v.into())),
            Type::FLOAT4 => self
                .try_get::<_, Option<f32>>(index)
                .map_err(decode)?
                .map(|v| SqlValue::Float(v.into())),
            Type::FLOAT8 => self
                .try_get::<_, Option<f64>>(index)
                .map_err(decode)?
                .map(SqlValue::Float),
            Type::NUMERIC => self
                .try_get::<_, Option<Decimal>>(index)
                .map_err(decode)?
                .map(SqlValue::Decimal),
            Type::TIMESTAMPTZ => self
                .try_get::<_, Option<DateTime<Utc>>>(index)
                .map_err(decode)?
                .map(SqlValue::Timestamp),
            Type::TIMESTAMP => self
                .try_get::<_, Option<NaiveDateTime>>(index)
                .map_err(decode)?
                .map(|v| SqlValue::Timestamp(v.and_utc())),
            Type::DATE => self
                .try_get::<_, Option<chrono::NaiveDate>>(index)
                .map_err(decode)?
                .map(|v| SqlValue::Timestamp(v.and_time(NaiveTime::MIN).and_utc())),
            Type::JSON | Type::JSONB => self
                .try_get::<_, Option<serde_json::Value>>(index)
                .map_err(decode)?
                .map(SqlValue::Json),
            Type::UUID => self
                .try_get::<_, Option<uuid::Uuid>>(index)
                .map_err(decode)?
                .map(|v| SqlValue::Text(v.hyphenated().to_string())),
            Type::BYTEA => self
                .try_get::<_, Option<Vec<u8>>>(index)
                .map_err(decode)?
                .map(SqlValue::Bytes),
            Type::BOOL_ARRAY => array(self, index, SqlValue::Bool).map_err(decode)?,
            Type::INT2_ARRAY => array(self, index, |v: i16| SqlValue::Int(v.into())).map_err(decode)?,
            Type::INT4_ARRAY => array(self, index, |v: i32| SqlValue::Int(v.into())).map_err(decode)?,
            Type::INT8_ARRAY => array(self, index, SqlValue::Int).map_err(decode)?,
            Type::FLOAT4_ARRAY => array(self, index, |v: f32| SqlValue::Float(v.into())).map_err(decode)?,
            Type::FLOAT8_ARRAY => array(self, index, SqlValue::Float).map_err(decode)?,
            Type::NUMERIC_ARRAY => array(self, index, SqlValue::Decimal).map_err(decode)?,
            Type::TIMESTAMPTZ_ARRAY => array(self, index, SqlValue::Timestamp).map_err(decode)?,
            Type::UUID_ARRAY => {
                array(self, index, |v: uuid::Uuid| SqlValue::Text(v.hyphenated().to_string()))
                    .map_err(decode)?
            }
            Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
                array(self, index, SqlValue::Text).map_err(decode)?
            }
            _ => self
                .try_get::<_, Option<String>>(index)
                .map_err(decode)?
                .map(SqlValue::Text),
        };
        Ok(value.unwrap_or(SqlValue::Null))
    }
}

/// An in-memory row, for sources other than tokio-postgres.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRow {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl ValueRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column and its value.
    pub fn with(mut self, column: impl Into<String>, value: SqlValue) -> Self {
        self.columns.push(column.into());
        self.values.push(value);
        self
    }
}

impl RowReader for ValueRow {
    fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    fn value(&self, index: usize) -> OrmResult<SqlValue> {
        self.values
            .get(index)
            .cloned()
            .ok_or_else(|| OrmError::decode(index.to_string(), "column index out of range"))
    }
}

/// Scan `row` into a fresh `E`.
pub fn scan_row<E: Entity, R: RowReader + ?Sized>(row: &R) -> OrmResult<E> {
    let mut entity = E::default();
    scan_into(row, &mut entity)?;
    Ok(entity)
}

/// Scan `row` into an existing entity, overwriting matched fields only.
pub fn scan_into<E: Entity, R: RowReader + ?Sized>(row: &R, dest: &mut E) -> OrmResult<()> {
    let schema = Schema::of::<E>(DEFAULT_TAG_KEY)?;
    for (index, column) in row.column_names().into_iter().enumerate() {
        let Some(field) = schema.field_for_column(column) else {
            continue;
        };
        let value = row.value(index)?;
        dest.scan_field(field, value)
            .map_err(|e| OrmError::decode(column, e.to_string()))?;
    }
    Ok(())
}
