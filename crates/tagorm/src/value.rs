//! Field rendering and driver-ready statement arguments.
//!
//! [`ToColumn`] is how the reflector reads an entity field: whether it holds
//! the type's zero value, and its textual rendering. [`Arg`] is what the query
//! builder hands to the driver.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type};

/// Render a UTC timestamp the way every timestamp column value is written.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A field type the reflector knows how to render.
///
/// Timestamps have no zero value: the Unix epoch is written like any other
/// instant. Use `Option<DateTime<Utc>>` or [`crate::NullTime`] for a
/// timestamp that may be absent.
pub trait ToColumn {
    /// Whether the value is the type's zero value (skipped by the reflector).
    fn is_zero(&self) -> bool;

    /// Textual rendering of the value; `None` means "no value to emit".
    fn render(&self) -> Option<String>;
}

impl ToColumn for String {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn render(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl ToColumn for &str {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn render(&self) -> Option<String> {
        Some((*self).to_string())
    }
}

impl ToColumn for bool {
    fn is_zero(&self) -> bool {
        !*self
    }

    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

macro_rules! numeric_column {
    ($($t:ty),+ $(,)?) => {
        $(impl ToColumn for $t {
            fn is_zero(&self) -> bool {
                *self == 0 as $t
            }

            fn render(&self) -> Option<String> {
                Some(self.to_string())
            }
        })+
    };
}

numeric_column!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl ToColumn for Decimal {
    fn is_zero(&self) -> bool {
        Decimal::is_zero(self)
    }

    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ToColumn for DateTime<Utc> {
    fn is_zero(&self) -> bool {
        false
    }

    fn render(&self) -> Option<String> {
        Some(format_timestamp(self))
    }
}

impl ToColumn for NaiveDateTime {
    fn is_zero(&self) -> bool {
        false
    }

    fn render(&self) -> Option<String> {
        Some(format_timestamp(&self.and_utc()))
    }
}

impl ToColumn for uuid::Uuid {
    fn is_zero(&self) -> bool {
        self.is_nil()
    }

    fn render(&self) -> Option<String> {
        Some(self.hyphenated().to_string())
    }
}

impl ToColumn for serde_json::Value {
    fn is_zero(&self) -> bool {
        self.is_null()
    }

    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl<T: ToColumn> ToColumn for Option<T> {
    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn render(&self) -> Option<String> {
        self.as_ref().and_then(ToColumn::render)
    }
}

/// Collections render as a JSON array of their rendered elements, which binds
/// to array, `json`/`jsonb` and text columns. An empty collection is zero.
impl<T: ToColumn> ToColumn for Vec<T> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn render(&self) -> Option<String> {
        let items: Vec<serde_json::Value> = self
            .iter()
            .map(|item| item.render().map_or(serde_json::Value::Null, serde_json::Value::String))
            .collect();
        Some(serde_json::Value::Array(items).to_string())
    }
}

impl<T: ToColumn> ToColumn for Box<T> {
    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }

    fn render(&self) -> Option<String> {
        (**self).render()
    }
}

/// A statement argument.
///
/// Values rendered by the reflector are coerced with [`Arg::coerce`]; caller
/// arguments convert through the `From` impls (usually via [`args!`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Arg {
    /// Turn a rendered field value into an argument: integer first, then
    /// boolean, then plain text.
    ///
    /// Only canonical spellings are coerced (`"75"`, `"true"`), so the
    /// argument always renders back to the exact source text. `"007"`, `"T"`
    /// or `"+5"` stay text and reach text columns unchanged.
    pub fn coerce(rendered: impl Into<String>) -> Self {
        let rendered = rendered.into();
        if let Ok(v) = rendered.parse::<i64>()
            && v.to_string() == rendered
        {
            return Arg::Int(v);
        }
        if let Some(v) = parse_bool(&rendered)
            && v.to_string() == rendered
        {
            return Arg::Bool(v);
        }
        Arg::Text(rendered)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Arg::Null)
    }
}

/// Boolean spellings accepted for text-to-bool coercion.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Build a `Vec<Arg>` from heterogeneous values.
///
/// ```ignore
/// let q = tagorm::build()
///     .updates(&game)
///     .where_raw("game_code = ? AND rate > ?", args![game.code.clone(), 23]);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($value)),+]
    };
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

macro_rules! int_arg {
    ($($t:ty),+ $(,)?) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Int(i64::from(v))
            }
        })+
    };
}

int_arg!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Float(f64::from(v))
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Text(v)
    }
}

impl From<&String> for Arg {
    fn from(v: &String) -> Self {
        Arg::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for Arg {
    fn from(v: DateTime<Utc>) -> Self {
        Arg::Timestamp(v)
    }
}

impl From<uuid::Uuid> for Arg {
    fn from(v: uuid::Uuid) -> Self {
        Arg::Text(v.hyphenated().to_string())
    }
}

impl From<Decimal> for Arg {
    fn from(v: Decimal) -> Self {
        Arg::Text(v.to_string())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        v.map_or(Arg::Null, Into::into)
    }
}

/// Borrow arguments as tokio-postgres parameters.
pub fn params(args: &[Arg]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|a| a as &(dyn ToSql + Sync)).collect()
}

type BoxError = Box<dyn Error + Sync + Send>;

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn mismatch(arg: &Arg, ty: &Type) -> BoxError {
    format!("cannot bind {arg:?} to a column of type {ty}").into()
}

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::INT8 => v.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::OID => u32::try_from(v)?.to_sql(ty, out),
        Type::NUMERIC => Decimal::from(v).to_sql(ty, out),
        _ if is_text(ty) => v.to_string().to_sql(ty, out),
        _ => Err(mismatch(&Arg::Int(v), ty)),
    }
}

fn float_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => v.to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(v)?.to_sql(ty, out),
        _ if is_text(ty) => v.to_string().to_sql(ty, out),
        _ => Err(mismatch(&Arg::Float(v), ty)),
    }
}

fn timestamp_to_sql(
    v: &DateTime<Utc>,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, BoxError> {
    match *ty {
        Type::TIMESTAMPTZ => v.to_sql(ty, out),
        Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
        Type::DATE => v.date_naive().to_sql(ty, out),
        _ if is_text(ty) => format_timestamp(v).to_sql(ty, out),
        _ => Err(mismatch(&Arg::Timestamp(*v), ty)),
    }
}

fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if is_text(ty) {
        return s.to_sql(ty, out);
    }
    if let Kind::Array(_) = ty.kind() {
        // A rendered collection: a JSON array of element texts.
        let items: Vec<Option<String>> = serde_json::from_str(s)?;
        let items: Vec<Arg> = items.into_iter().map(|item| item.map_or(Arg::Null, Arg::Text)).collect();
        return items.to_sql(ty, out);
    }
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => int_to_sql(s.parse()?, ty, out),
        Type::FLOAT4 | Type::FLOAT8 => float_to_sql(s.parse()?, ty, out),
        Type::NUMERIC => s.parse::<Decimal>()?.to_sql(ty, out),
        Type::BYTEA => match serde_json::from_str::<Vec<String>>(s) {
            Ok(items) => items
                .iter()
                .map(|b| b.parse::<u8>())
                .collect::<Result<Vec<u8>, _>>()?
                .to_sql(ty, out),
            Err(_) => ToSql::to_sql(&s.as_bytes(), ty, out),
        },
        Type::BOOL => parse_bool(s)
            .ok_or_else(|| format!("invalid boolean literal {s:?}"))?
            .to_sql(ty, out),
        Type::TIMESTAMPTZ | Type::TIMESTAMP | Type::DATE => {
            let ts = DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc);
            timestamp_to_sql(&ts, ty, out)
        }
        Type::UUID => uuid::Uuid::parse_str(s)?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        _ => Err(mismatch(&Arg::Text(s.to_string()), ty)),
    }
}

impl ToSql for Arg {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Arg::Null => Ok(IsNull::Yes),
            Arg::Bool(v) => match *ty {
                Type::BOOL => v.to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Arg::Int(v) => int_to_sql(*v, ty, out),
            Arg::Float(v) => float_to_sql(*v, ty, out),
            Arg::Text(s) => text_to_sql(s, ty, out),
            Arg::Timestamp(v) => timestamp_to_sql(v, ty, out),
        }
    }

    // The target column type decides the wire encoding in `to_sql`.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}
