//! Entity metadata and the reflected schema descriptor.
//!
//! `#[derive(Entity)]` emits a static list of [`FieldDef`]s (field identifier
//! plus raw tag strings per tag key) and accessors by field index. The first
//! time an entity is used with a given tag key, its tags are parsed into a
//! [`Schema`], which is then cached by type identity.

use crate::error::{OrmError, OrmResult};
use crate::scan::{ConvertError, SqlValue};
use crate::tag::{EXCLUDED, TagOptions, is_valid_tag, parse_tag};
use crate::value::{Arg, ToColumn};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, RwLock};

/// Tag key read when none is configured.
pub const DEFAULT_TAG_KEY: &str = "sql";

/// Compile-time description of one entity field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Rust field identifier.
    pub ident: &'static str,
    /// Raw tag values keyed by tag key, e.g. `[("sql", "game_id")]`.
    pub tags: &'static [(&'static str, &'static str)],
}

impl FieldDef {
    pub const fn new(ident: &'static str, tags: &'static [(&'static str, &'static str)]) -> Self {
        Self { ident, tags }
    }

    /// The raw tag for `key`, if the field carries one.
    pub fn tag(&self, key: &str) -> Option<&'static str> {
        self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

/// A record type that maps to a table.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Debug, Default, Entity)]
/// #[orm(table = "ref_game")]
/// struct Game {
///     #[tag(sql = "game_id")]
///     id: i64,
///     #[tag(sql = "game_code")]
///     code: String,
///     #[tag(sql = "rate")]
///     rate: NullInt64,
/// }
/// ```
pub trait Entity: Default + 'static {
    /// Table name.
    const TABLE: &'static str;

    /// Field descriptors, in declaration order.
    const FIELDS: &'static [FieldDef];

    fn table_name(&self) -> &'static str {
        Self::TABLE
    }

    /// The field at `index` in [`Entity::FIELDS`].
    fn field(&self, index: usize) -> Option<&dyn ToColumn>;

    /// Assign a scanned value to the field at `index`.
    fn scan_field(&mut self, index: usize, value: SqlValue) -> Result<(), ConvertError>;
}

/// A tagged column of an entity.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    /// Index into [`Entity::FIELDS`].
    pub field: usize,
    pub options: TagOptions,
}

/// A reflected column value: the rendered field plus its tag options.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    pub value: String,
    pub options: TagOptions,
}

/// Column name to rendered value, iterated in column-name order.
pub type ColumnMap = BTreeMap<String, ColumnValue>;

/// Parsed tag metadata of an entity type for one tag key.
#[derive(Debug)]
pub struct Schema {
    table: &'static str,
    /// Persisted columns sorted by name.
    columns: Vec<Column>,
    id_column: Option<String>,
    /// Lowercased column (or field) name to field index, for scanning.
    lookup: HashMap<String, usize>,
}

type SchemaCache = RwLock<HashMap<(TypeId, String), Arc<Schema>>>;

fn cache() -> &'static SchemaCache {
    static CACHE: OnceLock<SchemaCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

impl Schema {
    /// The cached schema of `E` for `tag_key`, built on first use.
    pub fn of<E: Entity>(tag_key: &str) -> OrmResult<Arc<Schema>> {
        let key = (TypeId::of::<E>(), tag_key.to_string());
        if let Some(schema) = cache()
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(Arc::clone(schema));
        }

        let built = Arc::new(Self::build(
            std::any::type_name::<E>(),
            E::TABLE,
            E::FIELDS,
            tag_key,
        )?);
        let mut map = cache().write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(map.entry(key).or_insert(built)))
    }

    /// Parse the tags of `fields` without touching the cache.
    pub fn build(
        entity: &'static str,
        table: &'static str,
        fields: &'static [FieldDef],
        tag_key: &str,
    ) -> OrmResult<Self> {
        let mut columns = Vec::new();
        let mut id_column = None;
        let mut lookup = HashMap::new();

        for (index, field) in fields.iter().enumerate() {
            let raw = field.tag(tag_key).unwrap_or_default();
            let (name, options) = parse_tag(raw);

            if name == EXCLUDED {
                continue;
            }
            if !name.is_empty() && !is_valid_tag(name) {
                return Err(OrmError::InvalidTag {
                    entity,
                    field: field.ident,
                    tag: raw.to_string(),
                });
            }

            let resolved = if name.is_empty() { field.ident } else { name };
            lookup.entry(resolved.to_lowercase()).or_insert(index);

            if field.ident.eq_ignore_ascii_case("id") {
                id_column = Some(resolved.to_string());
            }
            if !raw.is_empty() {
                columns.push(Column {
                    name: resolved.to_string(),
                    field: index,
                    options,
                });
            }
        }

        columns.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self {
            table,
            columns,
            id_column,
            lookup,
        })
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Tagged columns, sorted by name.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column of the field named `id`, if any.
    pub fn id_column(&self) -> Option<&str> {
        self.id_column.as_deref()
    }

    /// Field index matching a result column name, ignoring case.
    pub fn field_for_column(&self, column: &str) -> Option<usize> {
        self.lookup.get(&column.to_lowercase()).copied()
    }

    /// Render every tagged, non-zero field of `entity`.
    pub fn reflect<E: Entity>(&self, entity: &E) -> ColumnMap {
        let mut map = ColumnMap::new();
        for column in &self.columns {
            let Some(field) = entity.field(column.field) else {
                continue;
            };
            if field.is_zero() {
                continue;
            }
            if let Some(value) = field.render() {
                map.insert(
                    column.name.clone(),
                    ColumnValue {
                        value,
                        options: column.options.clone(),
                    },
                );
            }
        }
        map
    }
}

/// Reflect `entity` through the tags under `tag_key`.
pub fn tags_to_fields<E: Entity>(tag_key: &str, entity: &E) -> OrmResult<ColumnMap> {
    Ok(Schema::of::<E>(tag_key)?.reflect(entity))
}

/// Render the reflected columns of `entity` into SQL fragments.
///
/// `render` receives the column name, the 1-based position the column's
/// argument will take in `args`, and the tag options. An empty fragment drops
/// the column (and its argument); otherwise the coerced value is pushed onto
/// `args`.
pub fn fields_to_args<E, F>(
    tag_key: &str,
    entity: &E,
    args: &mut Vec<Arg>,
    mut render: F,
) -> OrmResult<Vec<String>>
where
    E: Entity,
    F: FnMut(&str, usize, &TagOptions) -> String,
{
    let fields = tags_to_fields(tag_key, entity)?;
    let mut fragments = Vec::with_capacity(fields.len());
    for (column, value) in fields {
        let fragment = render(&column, args.len() + 1, &value.options);
        if fragment.is_empty() {
            continue;
        }
        fragments.push(fragment);
        args.push(Arg::coerce(value.value));
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::FromSqlValue;
    use crate::types::NullInt64;

    #[derive(Debug, Default)]
    struct Player {
        id: i64,
        nick: String,
        score: NullInt64,
        active: bool,
        note: String,
    }

    impl Entity for Player {
        const TABLE: &'static str = "player";
        const FIELDS: &'static [FieldDef] = &[
            FieldDef::new("id", &[("sql", "player_id"), ("json", "id")]),
            FieldDef::new("nick", &[("sql", "nick,opt")]),
            FieldDef::new("score", &[("sql", ",opt")]),
            FieldDef::new("active", &[("sql", "active")]),
            FieldDef::new("note", &[("sql", "-")]),
        ];

        fn field(&self, index: usize) -> Option<&dyn ToColumn> {
            match index {
                0 => Some(&self.id),
                1 => Some(&self.nick),
                2 => Some(&self.score),
                3 => Some(&self.active),
                4 => Some(&self.note),
                _ => None,
            }
        }

        fn scan_field(&mut self, index: usize, value: SqlValue) -> Result<(), ConvertError> {
            match index {
                0 => self.id = FromSqlValue::from_sql_value(value)?,
                1 => self.nick = FromSqlValue::from_sql_value(value)?,
                2 => self.score = FromSqlValue::from_sql_value(value)?,
                3 => self.active = FromSqlValue::from_sql_value(value)?,
                4 => self.note = FromSqlValue::from_sql_value(value)?,
                _ => {}
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Broken {
        name: String,
    }

    impl Entity for Broken {
        const TABLE: &'static str = "broken";
        const FIELDS: &'static [FieldDef] = &[FieldDef::new("name", &[("sql", "bad\"name")])];

        fn field(&self, index: usize) -> Option<&dyn ToColumn> {
            (index == 0).then_some(&self.name as &dyn ToColumn)
        }

        fn scan_field(&mut self, _index: usize, _value: SqlValue) -> Result<(), ConvertError> {
            Ok(())
        }
    }

    #[test]
    fn schema_resolves_columns_and_id() {
        let schema = Schema::of::<Player>(DEFAULT_TAG_KEY).unwrap();
        assert_eq!(schema.table(), "player");
        assert_eq!(schema.id_column(), Some("player_id"));
        let names: Vec<_> = schema.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["active", "nick", "player_id", "score"]);
        assert!(schema.columns()[1].options.contains("opt"));
    }

    #[test]
    fn lookup_ignores_case_and_skips_excluded() {
        let schema = Schema::of::<Player>(DEFAULT_TAG_KEY).unwrap();
        assert_eq!(schema.field_for_column("PLAYER_ID"), Some(0));
        assert_eq!(schema.field_for_column("Score"), Some(2));
        assert_eq!(schema.field_for_column("note"), None);
        assert_eq!(schema.field_for_column("-"), None);
    }

    #[test]
    fn schema_is_cached_per_tag_key() {
        let a = Schema::of::<Player>(DEFAULT_TAG_KEY).unwrap();
        let b = Schema::of::<Player>(DEFAULT_TAG_KEY).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let json = Schema::of::<Player>("json").unwrap();
        assert_eq!(json.id_column(), Some("id"));
        assert_eq!(json.columns().len(), 1);
    }

    #[test]
    fn reflect_skips_zero_values() {
        let player = Player {
            id: 7,
            nick: String::new(),
            score: NullInt64::new(0),
            active: false,
            note: "ignored".into(),
        };
        let map = tags_to_fields(DEFAULT_TAG_KEY, &player).unwrap();
        let cols: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(cols, vec!["player_id", "score"]);
        assert_eq!(map["score"].value, "0");
        assert!(map["score"].options.contains("opt"));
    }

    #[test]
    fn fields_to_args_numbers_from_existing_args() {
        let player = Player {
            id: 3,
            nick: "kai".into(),
            active: true,
            ..Default::default()
        };
        let mut args = vec![Arg::Bool(true)];
        let fragments =
            fields_to_args(DEFAULT_TAG_KEY, &player, &mut args, |col, pos, _| {
                if col == "active" {
                    String::new()
                } else {
                    format!("{col} = ${pos}")
                }
            })
            .unwrap();
        assert_eq!(fragments, vec!["nick = $2", "player_id = $3"]);
        assert_eq!(args, vec![Arg::Bool(true), Arg::Text("kai".into()), Arg::Int(3)]);
    }

    #[test]
    fn invalid_tag_name_is_rejected() {
        let err = Schema::of::<Broken>(DEFAULT_TAG_KEY).unwrap_err();
        assert!(matches!(
            err,
            OrmError::InvalidTag { field: "name", ref tag, .. } if tag == "bad\"name"
        ));
    }
}
