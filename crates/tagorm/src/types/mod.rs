//! Value types with SQL `NULL` semantics.

mod null;

pub use null::{NullBool, NullFloat64, NullInt64, NullString, NullTime, Nullable};
