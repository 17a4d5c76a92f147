//! Transaction helper macro.
//!
//! [`crate::Db::transaction`] covers the common case (serializable, bounded
//! by the configured timeout). The macro opens a transaction with the
//! connection's default isolation level on a client you already hold.
//!
//! Pass the transaction (`tokio_postgres::Transaction` or
//! `deadpool_postgres::Transaction`) to anything that accepts a
//! [`crate::GenericClient`], e.g. [`crate::db::fetch_all`] or
//! [`crate::db::execute_returning`].
//!
//! # Example
//!
//! ```ignore
//! let mut client = db.writer().await?;
//!
//! let id = tagorm::transaction!(client, tx, {
//!     let (sql, args) = tagorm::build().insert(&game).to_sql()?;
//!     let id = tagorm::db::execute_returning(&tx, &sql, &args).await?;
//!
//!     let (sql, args) = tagorm::build()
//!         .updates(&stock)
//!         .where_raw("game_id = ?", tagorm::args![game.id])
//!         .to_sql()?;
//!     tx.execute(&sql, &tagorm::params(&args)).await?;
//!     Ok(id)
//! })?;
//! ```

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$client.transaction().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `tagorm::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let $tx = ($client)
            .transaction()
            .await
            .map_err($crate::OrmError::from_db_error)?;

        let __tagorm_tx_body_result = async { $body }.await;
        match __tagorm_tx_body_result {
            Ok(value) => {
                $tx.commit()
                    .await
                    .map_err($crate::OrmError::from_db_error)?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}
