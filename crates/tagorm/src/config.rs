//! Database handle configuration.

use crate::error::{OrmError, OrmResult};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for [`crate::Db`].
///
/// Loadable from TOML:
///
/// ```toml
/// writer_url = "postgres://app@primary/app"
/// reader_url = "postgres://app@replica/app"
/// max_connections = 32
/// timeout = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Connection URL of the primary (writes, transactions).
    pub writer_url: String,
    /// Connection URL of the read replica; the writer is used when unset.
    pub reader_url: Option<String>,
    /// Maximum connections per pool.
    pub max_connections: usize,
    /// Per-statement timeout, in seconds. `0` disables it.
    pub timeout: u64,
    /// Extra attempts at acquiring a pooled connection.
    pub retry_count: u32,
    /// SQL longer than this is truncated in log events.
    pub max_log_sql_length: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            writer_url: String::new(),
            reader_url: None,
            max_connections: 16,
            timeout: 30,
            retry_count: 3,
            max_log_sql_length: 200,
        }
    }
}

impl DbConfig {
    /// Create a configuration for a single database used for reads and writes.
    pub fn new(writer_url: impl Into<String>) -> Self {
        Self {
            writer_url: writer_url.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> OrmResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the read replica URL.
    pub fn reader_url(mut self, url: impl Into<String>) -> Self {
        self.reader_url = Some(url.into());
        self
    }

    /// Set the pool size.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-statement timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.as_secs();
        self
    }

    /// Set the number of connection-acquisition retries.
    pub fn retry_count(mut self, retries: u32) -> Self {
        self.retry_count = retries;
        self
    }

    /// Set the SQL truncation length for log events.
    pub fn max_log_sql_length(mut self, len: usize) -> Self {
        self.max_log_sql_length = len;
        self
    }

    /// The replica URL, falling back to the writer.
    pub fn effective_reader_url(&self) -> &str {
        self.reader_url.as_deref().unwrap_or(&self.writer_url)
    }

    /// Per-statement timeout, if enabled.
    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.writer_url.is_empty() {
            return Err(OrmError::Config("writer_url is required".to_string()));
        }
        if self.max_connections == 0 {
            return Err(OrmError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let config = DbConfig::from_toml_str(r#"writer_url = "postgres://localhost/app""#).unwrap();
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.statement_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.effective_reader_url(), "postgres://localhost/app");
    }

    #[test]
    fn parses_every_key() {
        let config = DbConfig::from_toml_str(
            r#"
            writer_url = "postgres://primary/app"
            reader_url = "postgres://replica/app"
            max_connections = 4
            timeout = 0
            retry_count = 1
            max_log_sql_length = 80
            "#,
        )
        .unwrap();
        assert_eq!(config.effective_reader_url(), "postgres://replica/app");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.statement_timeout(), None);
        assert_eq!(config.max_log_sql_length, 80);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            DbConfig::from_toml_str("writer_url = ").unwrap_err(),
            OrmError::Config(_)
        ));
        assert!(matches!(
            DbConfig::from_toml_str("max_connections = 2").unwrap_err(),
            OrmError::Config(_)
        ));
    }

    #[test]
    fn builder_setters() {
        let config = DbConfig::new("postgres://a/b")
            .reader_url("postgres://c/d")
            .timeout(Duration::from_secs(5))
            .retry_count(0);
        assert_eq!(config.timeout, 5);
        assert_eq!(config.retry_count, 0);
        assert!(config.validate().is_ok());
    }
}
