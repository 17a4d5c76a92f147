//! Database handle: a writer pool and a read-replica pool.
//!
//! Writes (`execute`, `execute_returning`) go to the writer; reads (`query`,
//! `query_row`) go to the reader. Every statement is logged at `debug` under
//! the `tagorm.sql` target and bounded by the configured timeout.
//!
//! ```ignore
//! let db = Db::connect(DbConfig::new("postgres://app@localhost/app")).await?;
//!
//! let (sql, args) = tagorm::build().insert(&game).to_sql()?;
//! let id = db.execute_returning(&sql, &args).await?;
//!
//! let (sql, args) = tagorm::build().from(&Game::default(), "g").limit(10).to_sql()?;
//! let games: Vec<Game> = db.query(&sql, &args).await?;
//! ```
//!
//! [`Db::transaction`] runs a closure in a serializable transaction on the
//! writer. For other isolation levels take a writer connection and use
//! [`crate::transaction!`]; the free functions in this module accept the
//! transaction as a client.

use crate::client::GenericClient;
use crate::config::DbConfig;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::pool::create_pool_with_config;
use crate::scan::{RowReader, SqlValue, scan_row};
use crate::value::{Arg, params};
use deadpool_postgres::Pool;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::IsolationLevel;

/// Base delay between connection-acquisition attempts; grows linearly.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Query `sql` and scan every row into `E`.
pub async fn fetch_all<E, C>(client: &C, sql: &str, args: &[Arg]) -> OrmResult<Vec<E>>
where
    E: Entity,
    C: GenericClient,
{
    let rows = client.query(sql, &params(args)).await?;
    rows.iter().map(|row| scan_row(row)).collect()
}

/// Query `sql` and scan the first row into `E`, if there is one.
pub async fn fetch_opt<E, C>(client: &C, sql: &str, args: &[Arg]) -> OrmResult<Option<E>>
where
    E: Entity,
    C: GenericClient,
{
    let row = client.query_opt(sql, &params(args)).await?;
    row.as_ref().map(|row| scan_row(row)).transpose()
}

/// Run an INSERT/UPDATE carrying a `RETURNING` clause and return the first
/// returned value (usually the id).
pub async fn execute_returning<C: GenericClient>(
    client: &C,
    sql: &str,
    args: &[Arg],
) -> OrmResult<SqlValue> {
    if !sql.to_ascii_uppercase().contains("RETURNING") {
        return Err(OrmError::validation(
            "statement has no RETURNING clause to read an id from",
        ));
    }
    let row = client
        .query_opt(sql, &params(args))
        .await?
        .ok_or_else(|| OrmError::not_found("statement returned no row"))?;
    row.value(0)
}

/// Database handle. Cloning is cheap; clones share the pools.
#[derive(Clone)]
pub struct Db {
    writer: Pool,
    reader: Pool,
    config: DbConfig,
}

impl Db {
    /// Build both pools. Connections are opened lazily; use [`Db::ping`] to
    /// check reachability.
    pub async fn connect(config: DbConfig) -> OrmResult<Self> {
        config.validate()?;
        let writer = create_pool_with_config(&config.writer_url, config.max_connections)?;
        let reader = match &config.reader_url {
            Some(url) => create_pool_with_config(url, config.max_connections)?,
            None => writer.clone(),
        };
        tracing::info!(
            target: "tagorm.sql",
            max_connections = config.max_connections,
            replica = config.reader_url.is_some(),
            "database pools ready"
        );
        Ok(Self {
            writer,
            reader,
            config,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Round-trip `SELECT 1` on the writer, then on the reader.
    pub async fn ping(&self) -> OrmResult<()> {
        for (role, pool) in [("writer", &self.writer), ("reader", &self.reader)] {
            let client = self.acquire(pool, role).await?;
            let result = self
                .timed("SELECT 1", GenericClient::execute(&client, "SELECT 1", &[]))
                .await;
            if let Err(err) = result {
                tracing::error!(target: "tagorm.sql", role, error = %err, "ping failed");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Close both pools. Checked-out connections are dropped when returned.
    pub fn close(&self) {
        self.writer.close();
        self.reader.close();
    }

    /// A connection from the writer pool, e.g. to open a transaction.
    pub async fn writer(&self) -> OrmResult<deadpool_postgres::Client> {
        self.acquire(&self.writer, "writer").await
    }

    /// A connection from the reader pool.
    pub async fn reader(&self) -> OrmResult<deadpool_postgres::Client> {
        self.acquire(&self.reader, "reader").await
    }

    /// Run a statement on the writer and return the number of affected rows.
    pub async fn execute(&self, sql: &str, args: &[Arg]) -> OrmResult<u64> {
        self.log(sql, args);
        let client = self.writer().await?;
        self.timed(sql, GenericClient::execute(&client, sql, &params(args)))
            .await
    }

    /// Run an INSERT/UPDATE with `RETURNING` on the writer and return the id.
    pub async fn execute_returning(&self, sql: &str, args: &[Arg]) -> OrmResult<SqlValue> {
        self.log(sql, args);
        let client = self.writer().await?;
        self.timed(sql, execute_returning(&client, sql, args)).await
    }

    /// Run a query on the reader and scan every row into `E`.
    pub async fn query<E: Entity>(&self, sql: &str, args: &[Arg]) -> OrmResult<Vec<E>> {
        self.log(sql, args);
        let client = self.reader().await?;
        self.timed(sql, fetch_all(&client, sql, args)).await
    }

    /// Run a query on the reader and scan its first row into `E`.
    ///
    /// No rows is not an error: it is logged at `warn` and yields `None`.
    pub async fn query_row<E: Entity>(&self, sql: &str, args: &[Arg]) -> OrmResult<Option<E>> {
        self.log(sql, args);
        let client = self.reader().await?;
        let row = self.timed(sql, fetch_opt(&client, sql, args)).await?;
        if row.is_none() {
            tracing::warn!(
                target: "tagorm.sql",
                sql = %self.truncate_sql(sql),
                "query row: result not found"
            );
        }
        Ok(row)
    }

    /// Run `body` in a serializable transaction on the writer.
    ///
    /// Commits when `body` returns `Ok` and rolls back when it returns `Err`
    /// or outlives the configured timeout. A failed rollback is reported
    /// together with the error that caused it.
    ///
    /// ```ignore
    /// let id = db
    ///     .transaction(async |tx| {
    ///         let (sql, args) = tagorm::build().insert(&game).to_sql()?;
    ///         tagorm::db::execute_returning(tx, &sql, &args).await
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(&self, body: F) -> OrmResult<T>
    where
        F: AsyncFnOnce(&deadpool_postgres::Transaction<'_>) -> OrmResult<T>,
    {
        let mut client = self.writer().await?;
        let tx = client
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await
            .map_err(OrmError::from_db_error)?;
        tracing::debug!(target: "tagorm.sql", "transaction started");

        let result = match self.config.statement_timeout() {
            Some(limit) => match tokio::time::timeout(limit, body(&tx)).await {
                Ok(result) => result,
                Err(_) => Err(OrmError::Timeout(limit)),
            },
            None => body(&tx).await,
        };

        match result {
            Ok(value) => {
                tx.commit().await.map_err(OrmError::from_db_error)?;
                tracing::debug!(target: "tagorm.sql", "transaction committed");
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(target: "tagorm.sql", error = %err, "transaction rolled back");
                match tx.rollback().await {
                    Ok(()) => Err(err),
                    Err(rollback) => Err(OrmError::Other(format!(
                        "{err}; rollback failed: {rollback}"
                    ))),
                }
            }
        }
    }

    async fn acquire(&self, pool: &Pool, role: &'static str) -> OrmResult<deadpool_postgres::Client> {
        let mut attempt = 0;
        loop {
            match pool.get().await {
                Ok(client) => return Ok(client),
                Err(err) if attempt < self.config.retry_count => {
                    attempt += 1;
                    tracing::warn!(
                        target: "tagorm.sql",
                        role,
                        attempt,
                        error = %err,
                        "connection unavailable, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(err) => {
                    tracing::error!(target: "tagorm.sql", role, error = %err, "connection unavailable");
                    return Err(err.into());
                }
            }
        }
    }

    async fn timed<T>(&self, sql: &str, fut: impl Future<Output = OrmResult<T>>) -> OrmResult<T> {
        let result = match self.config.statement_timeout() {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(OrmError::Timeout(limit)),
            },
            None => fut.await,
        };
        match &result {
            Err(err) if err.is_not_found() => {
                tracing::warn!(
                    target: "tagorm.sql",
                    sql = %self.truncate_sql(sql),
                    "statement returned no rows"
                );
            }
            Err(err) if err.is_timeout() => {
                tracing::error!(
                    target: "tagorm.sql",
                    sql = %self.truncate_sql(sql),
                    error = %err,
                    "statement timed out"
                );
            }
            Err(err) => {
                tracing::error!(
                    target: "tagorm.sql",
                    sql = %self.truncate_sql(sql),
                    error = %err,
                    "statement failed"
                );
            }
            Ok(_) => {}
        }
        result
    }

    fn log(&self, sql: &str, args: &[Arg]) {
        tracing::debug!(
            target: "tagorm.sql",
            sql = %self.truncate_sql(sql),
            param_count = args.len(),
            args = ?args,
            "executing statement"
        );
    }

    fn truncate_sql(&self, sql: &str) -> String {
        let max = self.config.max_log_sql_length;
        if max == 0 || sql.len() <= max {
            return sql.to_string();
        }
        let mut end = max;
        while end > 0 && !sql.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &sql[..end])
    }
}
