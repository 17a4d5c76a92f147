//! Derive macros for tagorm
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod entity;

/// Derive the `Entity` descriptor for a struct.
///
/// # Example
///
/// ```ignore
/// use tagorm::{Entity, NullString};
///
/// #[derive(Debug, Default, Entity)]
/// #[orm(table = "ref_game")]
/// struct Game {
///     #[tag(sql = "game_id", json = "id")]
///     id: i64,
///     #[tag(sql = "game_code")]
///     code: String,
///     #[tag(sql = "game_description,opt")]
///     description: NullString,
///     #[orm(skip)]
///     cache: Vec<u8>,
/// }
/// ```
///
/// # Generated
///
/// - `TABLE` - Table name
/// - `FIELDS` - Field identifiers with their raw tag strings, per tag key
/// - `field(index)` / `scan_field(index, value)` - Field accessors by position
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Table name (required)
/// - `#[tag(key = "name,opt,...")]` - Column tag under `key`; any number of keys
/// - `#[orm(skip)]` - Leave the field out of the descriptor entirely
///
/// Fields without a tag for the active key are not persisted, but are still
/// filled by the row scanner when a result column matches their name.
#[proc_macro_derive(Entity, attributes(orm, tag))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
