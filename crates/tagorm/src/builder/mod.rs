//! Tag-driven statement builder.
//!
//! A [`Query`] accumulates one statement from entity values and raw
//! fragments, then renders it once with [`Query::to_sql`]:
//!
//! ```ignore
//! let (sql, args) = tagorm::build()
//!     .from(&Game { code: "DOTA2".into(), ..Default::default() }, "g")
//!     .join(&User::default(), "u", &["u.id = g.user_id"])
//!     .where_raw("u.name like ?", args!["%budi%"])
//!     .limit(20)
//!     .page(2)
//!     .to_sql()?;
//! ```
//!
//! Entity fields are reflected through their tags (see [`crate::entity`]):
//! only tagged, non-zero fields participate, always in column-name order, so
//! the output is deterministic.
//!
//! ## Placeholders
//!
//! Fields reflected into WHERE fragments and caller fragments passed to
//! [`Query::where_raw`] use `?`. At render time every `?` is rewritten to a
//! positional `$n` starting after the arguments already collected, so the
//! argument at index `i` always binds to `$(i+1)`.
//!
//! ## Misuse
//!
//! Call-order mistakes (`join`/`and`/`or` without a preceding `from`,
//! `join` without ON fragments, `inserts` with no rows, starting a second
//! statement) panic. Data problems (malformed tags, rows with differing
//! column sets, mismatched `?` counts) are deferred and returned by
//! [`Query::to_sql`].

mod placeholder;

pub use placeholder::renumber;

use crate::entity::{DEFAULT_TAG_KEY, Entity, Schema, fields_to_args};
use crate::error::{OrmError, OrmResult};
use crate::value::Arg;
use chrono::Utc;
use std::sync::Arc;

/// Row cap applied to a SELECT when [`Query::limit`] is not set.
pub const DEFAULT_LIMIT: u64 = 100;

/// Column stamped with the creation time on INSERT.
pub const CREATE_DATE_COLUMN: &str = "create_date";

/// Column stamped with the modification time on INSERT and UPDATE.
pub const WRITE_DATE_COLUMN: &str = "write_date";

/// Placeholder of the write timestamp in an UPDATE. The timestamp is always
/// the first argument; SET columns are numbered from `$2`.
pub const WRITE_DATE_PLACEHOLDER: &str = "$1";

/// Start a new statement.
pub fn build() -> Query {
    Query::new()
}

#[derive(Debug)]
enum Statement {
    Empty,
    Select {
        /// `alias.*` per selected entity.
        columns: Vec<String>,
        /// `table alias` plus any JOIN clauses.
        source: String,
    },
    Insert(String),
    InsertMany(String),
    Update(String),
}

impl Statement {
    fn name(&self) -> &'static str {
        match self {
            Statement::Empty => "nothing",
            Statement::Select { .. } => "SELECT",
            Statement::Insert(_) | Statement::InsertMany(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
        }
    }
}

/// A pending WHERE fragment and the arguments its `?` markers bind to.
#[derive(Debug)]
struct Condition {
    fragment: String,
    args: Vec<Arg>,
}

/// Statement accumulator.
#[derive(Debug)]
pub struct Query {
    statement: Statement,
    args: Vec<Arg>,
    conditions: Vec<Condition>,
    limit: u64,
    page: u64,
    id_column: Option<String>,
    tag_key: String,
    error: Option<OrmError>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            statement: Statement::Empty,
            args: Vec::new(),
            conditions: Vec::new(),
            limit: 0,
            page: 1,
            id_column: None,
            tag_key: DEFAULT_TAG_KEY.to_string(),
            error: None,
        }
    }

    /// Read column names from the tag under `key` instead of `sql`.
    pub fn tag(mut self, key: impl Into<String>) -> Self {
        self.tag_key = key.into();
        self
    }

    /// Row cap of a SELECT; `0` means [`DEFAULT_LIMIT`].
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// 1-based page of a SELECT. Pages below 1 are treated as page 1.
    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    /// `SELECT alias.* FROM table alias`, filtered by the non-zero fields of
    /// `entity` (query by example).
    pub fn from<E: Entity>(mut self, entity: &E, alias: &str) -> Self {
        self.assert_empty("from");
        self.statement = Statement::Select {
            columns: vec![format!("{alias}.*")],
            source: format!("{} {alias}", entity.table_name()),
        };

        let mut args = Vec::new();
        let fields = fields_to_args(&self.tag_key, entity, &mut args, |column, _, _| {
            format!("{alias}.{column} = ?")
        });
        if let Some(fields) = self.record(fields)
            && !fields.is_empty()
        {
            self.conditions.push(Condition {
                fragment: fields.join(" AND "),
                args,
            });
        }
        self
    }

    /// Add `alias.*` to the select list and `JOIN table alias ON ...`.
    ///
    /// Several ON fragments are joined with `AND`.
    ///
    /// # Panics
    ///
    /// When no SELECT was started with [`Query::from`], or `on` is empty.
    pub fn join<E: Entity>(mut self, entity: &E, alias: &str, on: &[&str]) -> Self {
        assert!(!on.is_empty(), "join on `{alias}` needs at least one ON fragment");
        let Statement::Select { columns, source } = &mut self.statement else {
            panic!("join requires a SELECT started with from()");
        };
        columns.push(format!("{alias}.*"));
        source.push_str(&format!(
            " JOIN {} {alias} ON {}",
            entity.table_name(),
            on.join(" AND ")
        ));
        self
    }

    /// AND together `alias.col = ?` for the non-zero fields of `entity`.
    ///
    /// # Panics
    ///
    /// When no SELECT was started with [`Query::from`].
    pub fn and<E: Entity>(self, entity: &E, alias: &str) -> Self {
        self.connect(entity, alias, "AND")
    }

    /// OR together `alias.col = ?` for the non-zero fields of `entity`.
    ///
    /// # Panics
    ///
    /// When no SELECT was started with [`Query::from`].
    pub fn or<E: Entity>(self, entity: &E, alias: &str) -> Self {
        self.connect(entity, alias, "OR")
    }

    fn connect<E: Entity>(mut self, entity: &E, alias: &str, connector: &str) -> Self {
        assert!(
            matches!(self.statement, Statement::Select { .. }),
            "{connector} requires a SELECT started with from()"
        );

        let mut args = Vec::new();
        let fields = fields_to_args(&self.tag_key, entity, &mut args, |column, _, _| {
            format!("{alias}.{column} = ?")
        });
        let Some(fields) = self.record(fields) else {
            return self;
        };
        if fields.is_empty() {
            return self;
        }

        let separator = format!(" {connector} ");
        let mut fragment = if self.conditions.is_empty() {
            String::new()
        } else {
            separator.clone()
        };
        fragment.push_str(&fields.join(&separator));
        self.conditions.push(Condition { fragment, args });
        self
    }

    /// Append a caller-authored WHERE fragment with its own arguments.
    ///
    /// The fragment is ANDed with the previous ones. Each `?` binds to the
    /// next value of `args`; a count mismatch is reported by `to_sql`.
    pub fn where_raw(mut self, fragment: &str, args: Vec<Arg>) -> Self {
        let markers = placeholder::count(fragment);
        if markers != args.len() {
            self.fail(OrmError::validation(format!(
                "fragment {fragment:?} has {markers} '?' but {} values were provided",
                args.len()
            )));
            return self;
        }

        let fragment = if self.conditions.is_empty() {
            fragment.to_string()
        } else {
            format!(" AND {fragment}")
        };
        self.conditions.push(Condition { fragment, args });
        self
    }

    /// `INSERT INTO table (cols..., create_date, write_date) VALUES ($1..$N)`.
    pub fn insert<E: Entity>(mut self, entity: &E) -> Self {
        self.assert_empty("insert");
        let Some(schema) = self.schema::<E>() else {
            return self;
        };
        self.id_column = schema.id_column().map(str::to_string);

        let columns = fields_to_args(&self.tag_key, entity, &mut self.args, |column, _, _| {
            column.to_string()
        });
        let Some(mut columns) = self.record(columns) else {
            return self;
        };
        columns.push(CREATE_DATE_COLUMN.to_string());
        columns.push(WRITE_DATE_COLUMN.to_string());

        let now = Utc::now();
        self.args.push(Arg::Timestamp(now));
        self.args.push(Arg::Timestamp(now));

        let values: Vec<String> = (1..=self.args.len()).map(|n| format!("${n}")).collect();
        self.statement = Statement::Insert(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            entity.table_name(),
            columns.join(", "),
            values.join(", ")
        ));
        self
    }

    /// Multi-row INSERT. The column list comes from the first row; numbering
    /// runs continuously across all rows.
    ///
    /// # Panics
    ///
    /// When `entities` is empty.
    pub fn inserts<E: Entity>(mut self, entities: &[E]) -> Self {
        assert!(!entities.is_empty(), "inserts requires at least one row");
        self.assert_empty("inserts");
        let Some(schema) = self.schema::<E>() else {
            return self;
        };
        self.id_column = schema.id_column().map(str::to_string);

        let now = Utc::now();
        let mut header: Option<Vec<String>> = None;
        let mut rows = Vec::with_capacity(entities.len());
        for (index, entity) in entities.iter().enumerate() {
            let mut columns = Vec::new();
            let values = fields_to_args(&self.tag_key, entity, &mut self.args, |column, n, _| {
                columns.push(column.to_string());
                format!("${n}")
            });
            let Some(mut values) = self.record(values) else {
                return self;
            };

            if let Some(first) = &header {
                if *first != columns {
                    self.fail(OrmError::validation(format!(
                        "inserts row {index} has columns [{}] but row 0 has [{}]",
                        columns.join(", "),
                        first.join(", ")
                    )));
                    return self;
                }
            } else {
                header = Some(columns);
            }

            values.push(format!("${}", self.args.len() + 1));
            values.push(format!("${}", self.args.len() + 2));
            self.args.push(Arg::Timestamp(now));
            self.args.push(Arg::Timestamp(now));
            rows.push(format!("({})", values.join(", ")));
        }

        let mut columns = header.unwrap_or_default();
        columns.push(CREATE_DATE_COLUMN.to_string());
        columns.push(WRITE_DATE_COLUMN.to_string());
        self.statement = Statement::InsertMany(format!(
            "INSERT INTO {} ({}) VALUES {}",
            entities[0].table_name(),
            columns.join(", "),
            rows.join(", ")
        ));
        self
    }

    /// `UPDATE table SET col = $2, ..., write_date = $1` over the non-zero
    /// fields of `entity`, excluding its id column.
    pub fn updates<E: Entity>(mut self, entity: &E) -> Self {
        self.assert_empty("updates");
        let Some(schema) = self.schema::<E>() else {
            return self;
        };
        let id_column = schema.id_column().map(str::to_string);

        self.args.push(Arg::Timestamp(Utc::now()));
        let assignments = fields_to_args(&self.tag_key, entity, &mut self.args, |column, n, _| {
            if id_column.as_deref() == Some(column) {
                String::new()
            } else {
                format!("{column} = ${n}")
            }
        });
        let Some(mut assignments) = self.record(assignments) else {
            return self;
        };
        assignments.push(format!("{WRITE_DATE_COLUMN} = {WRITE_DATE_PLACEHOLDER}"));

        self.id_column = id_column;
        self.statement = Statement::Update(format!(
            "UPDATE {} SET {}",
            entity.table_name(),
            assignments.join(", ")
        ));
        self
    }

    /// Render the statement and its arguments.
    ///
    /// Pending WHERE fragments are renumbered and appended; SELECTs get
    /// `LIMIT`/`OFFSET`, INSERTs and UPDATEs get `RETURNING <id>` when the
    /// entity has an id field. The first deferred error, if any, is returned
    /// instead.
    pub fn to_sql(mut self) -> OrmResult<(String, Vec<Arg>)> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        let mut sql = match &self.statement {
            Statement::Empty => {
                return Err(OrmError::validation(
                    "nothing to render: start with from, insert, inserts or updates",
                ));
            }
            Statement::Select { columns, source } => {
                format!("SELECT {} FROM {source}", columns.join(", "))
            }
            Statement::Insert(sql) | Statement::InsertMany(sql) | Statement::Update(sql) => {
                sql.clone()
            }
        };

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            for condition in std::mem::take(&mut self.conditions) {
                sql.push_str(&renumber(&condition.fragment, self.args.len() + 1));
                self.args.extend(condition.args);
            }
        }

        match self.statement {
            Statement::Select { .. } => {
                let limit = if self.limit > 0 { self.limit } else { DEFAULT_LIMIT };
                let offset = limit.saturating_mul(self.page.saturating_sub(1));
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
            Statement::Insert(_) | Statement::InsertMany(_) | Statement::Update(_) => {
                if let Some(id) = &self.id_column {
                    sql.push_str(&format!(" RETURNING {id}"));
                }
            }
            Statement::Empty => {}
        }

        Ok((sql, self.args))
    }

    fn assert_empty(&self, operation: &str) {
        assert!(
            matches!(self.statement, Statement::Empty),
            "{operation} called after a {} statement; start a new query",
            self.statement.name()
        );
    }

    fn schema<E: Entity>(&mut self) -> Option<Arc<Schema>> {
        let schema = Schema::of::<E>(&self.tag_key);
        self.record(schema)
    }

    fn record<T>(&mut self, result: OrmResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn fail(&mut self, err: OrmError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}
