//! # tagorm
//!
//! A tag-driven PostgreSQL statement builder and row scanner.
//!
//! Entities describe their columns with field tags; the builder turns entity
//! values into positionally-parameterized SQL (`$1, $2, ...`) and the scanner
//! maps result rows back into entities.
//!
//! ```ignore
//! use tagorm::prelude::*;
//!
//! #[derive(Debug, Default, Entity)]
//! #[orm(table = "ref_game")]
//! struct Game {
//!     #[tag(sql = "game_id")]
//!     id: i64,
//!     #[tag(sql = "game_code")]
//!     code: String,
//!     #[tag(sql = "enabled")]
//!     enabled: bool,
//!     #[tag(sql = "rate")]
//!     rate: NullInt64,
//! }
//!
//! let (sql, args) = build()
//!     .from(&Game::default(), "g")
//!     .and(&Game { code: "DOTA2".into(), enabled: true, ..Default::default() }, "g")
//!     .to_sql()?;
//! // SELECT g.* FROM ref_game g WHERE g.enabled = $1 AND g.game_code = $2 LIMIT 100 OFFSET 0
//!
//! let games: Vec<Game> = tagorm::db::fetch_all(&client, &sql, &args).await?;
//! ```
//!
//! ## Tags
//!
//! A tag value is `name[,option...]`. `-` excludes the field; an empty name
//! (`",opt"`) falls back to the field name. Only tagged fields holding a
//! non-zero value are written; use the [`Nullable`] wrappers to write zero
//! values or `NULL`.

// Lets `#[derive(Entity)]` output (which names `::tagorm`) compile inside this crate.
extern crate self as tagorm;

pub mod builder;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod prelude;
pub mod scan;
pub mod tag;
pub mod transaction;
pub mod types;
pub mod value;

pub use builder::{
    CREATE_DATE_COLUMN, DEFAULT_LIMIT, Query, WRITE_DATE_COLUMN, WRITE_DATE_PLACEHOLDER, build,
};
pub use client::GenericClient;
pub use config::DbConfig;
pub use entity::{
    ColumnMap, ColumnValue, DEFAULT_TAG_KEY, Entity, FieldDef, Schema, fields_to_args,
    tags_to_fields,
};
pub use error::{OrmError, OrmResult};
pub use scan::{ConvertError, FromSqlValue, RowReader, SqlValue, ValueRow, scan_into, scan_row};
pub use tag::{TagOptions, is_valid_tag, parse_tag};
pub use types::{NullBool, NullFloat64, NullInt64, NullString, NullTime, Nullable};
pub use value::{Arg, ToColumn, format_timestamp, params};

#[cfg(feature = "pool")]
pub mod db;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use db::Db;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};

#[cfg(feature = "derive")]
pub use tagorm_derive::Entity;
