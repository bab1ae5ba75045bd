//! Warehouse database connection (async, single connection per run)

use bytes::Bytes;
use futures_util::{SinkExt, pin_mut};
use tokio_postgres::NoTls;

use crate::config::DatabaseConfig;
use crate::error::{EtlError, EtlResult};

/// A validated SQL identifier for a warehouse table
///
/// Table names in this pipeline are fixed, but they still pass through
/// this newtype so they are never concatenated unescaped into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    /// Validate a table name: lowercase identifier characters only
    pub fn new(name: &str) -> EtlResult<Self> {
        let valid = !name.is_empty()
            && name.len() <= 63
            && name.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c == '_')
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(EtlError::Config(format!("invalid table name: '{name}'")))
        }
    }

    /// The bare identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for embedding in SQL text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single warehouse connection owned by the pipeline for the run's lifetime
///
/// Wraps a `tokio_postgres::Client` and the spawned driver task. The
/// connection is autocommitting: each statement commits on completion.
pub struct WarehouseDb {
    client: tokio_postgres::Client,
}

impl WarehouseDb {
    /// Connect to the warehouse database
    ///
    /// The password is passed through `tokio_postgres::Config`, never
    /// interpolated into a connection string, and only the redacted
    /// target is logged.
    pub async fn connect(config: &DatabaseConfig) -> EtlResult<Self> {
        tracing::info!(target_db = %config.redacted(), "Connecting to database");

        let (client, connection) = tokio_postgres::Config::new()
            .host(&config.host)
            .port(config.port)
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.dbname)
            .connect(NoTls)
            .await
            .map_err(|e| EtlError::Connection(e.to_string()))?;

        // Driver task; ends when the client is dropped.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "Database connection task failed");
            }
        });

        Ok(Self { client })
    }

    /// Execute a multi-statement SQL script (DDL)
    pub async fn batch_execute(&self, sql: &str) -> Result<(), tokio_postgres::Error> {
        self.client.batch_execute(sql).await
    }

    /// Execute a single parameterless statement, returning the affected row count
    pub async fn execute(&self, sql: &str) -> Result<u64, tokio_postgres::Error> {
        self.client.execute(sql, &[]).await
    }

    /// Bulk-append CSV-formatted text to a table via `COPY ... FROM STDIN`
    ///
    /// `data` is comma-separated rows with no header; an empty, unquoted
    /// field is the null sentinel. Returns the row count reported by COPY.
    pub async fn copy_in_csv(
        &self,
        table: &TableName,
        columns: &[&str],
        data: Vec<u8>,
    ) -> Result<u64, tokio_postgres::Error> {
        let statement = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '')",
            table.quoted(),
            columns.join(", "),
        );

        let sink = self.client.copy_in(&statement).await?;
        pin_mut!(sink);
        sink.send(Bytes::from(data)).await?;
        sink.finish().await
    }

    /// Row count of a table
    pub async fn count(&self, table: &TableName) -> Result<i64, tokio_postgres::Error> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.quoted());
        let row = self.client.query_one(&sql, &[]).await?;
        Ok(row.get(0))
    }

    /// Close the connection
    ///
    /// Dropping the client ends the spawned driver task; this consumes the
    /// wrapper so no step can retain the connection past the run.
    pub fn close(self) {
        drop(self.client);
        tracing::info!("Database connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_accepts_warehouse_tables() {
        for name in [
            "stage_demo",
            "stage_temp",
            "dim_date",
            "dim_city",
            "fact_demo",
            "fact_temp",
        ] {
            let table = TableName::new(name).unwrap();
            assert_eq!(table.as_str(), name);
            assert_eq!(table.quoted(), format!("\"{name}\""));
        }
    }

    #[test]
    fn test_table_name_rejects_injection() {
        assert!(TableName::new("stage_demo; DROP TABLE fact_demo").is_err());
        assert!(TableName::new("stage_demo\"").is_err());
        assert!(TableName::new("Stage_Demo").is_err());
        assert!(TableName::new("").is_err());
        assert!(TableName::new("1stage").is_err());
    }
}
