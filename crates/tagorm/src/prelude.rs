//! Convenient imports for typical `tagorm` usage.
//!
//! ```ignore
//! use tagorm::prelude::*;
//! ```

pub use crate::{
    Arg, Entity, GenericClient, NullBool, NullFloat64, NullInt64, NullString, NullTime, Nullable,
    OrmError, OrmResult, Query, args, build, scan_row,
};

#[cfg(feature = "pool")]
pub use crate::{Db, DbConfig, create_pool};
