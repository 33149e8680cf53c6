//! PostgreSQL sink using `COPY ... FROM STDIN`.
//!
//! Each staged batch is streamed from disk into one COPY statement, which
//! PostgreSQL applies atomically.

use async_trait::async_trait;
use bytes::BytesMut;
use regex::Regex;
use snafu::prelude::*;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::sync::LazyLock;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::config::SinkConfig;
use crate::error::{
    ConnectSnafu, CopyFinishSnafu, CopySendSnafu, CopyStartSnafu, ReadStagedSnafu, RejectedSnafu,
    SinkError,
};

use super::{BulkSink, StagedBatch};

/// Bytes read from the staged file per COPY data message.
const COPY_CHUNK_BYTES: usize = 64 * 1024;

/// Identifiers PostgreSQL accepts without quoting.
static PLAIN_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").expect("identifier pattern is valid"));

/// Bulk sink backed by a single PostgreSQL connection.
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connect eagerly so bad credentials fail before any data is read.
    pub async fn connect(config: &SinkConfig) -> Result<Self, SinkError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.dbname)
            .username(&config.user)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context(ConnectSnafu {
                host: &config.host,
                port: config.port,
                dbname: &config.dbname,
            })?;

        info!(
            "Connected to postgres {}:{}/{} as {}",
            config.host, config.port, config.dbname, config.user
        );
        Ok(Self { pool })
    }
}

#[async_trait]
impl BulkSink for PostgresSink {
    async fn bulk_insert(&self, batch: &StagedBatch) -> Result<u64, SinkError> {
        let table = batch.table_name.as_str();
        let path = batch.path.display().to_string();
        let statement = copy_statement(batch)?;
        debug!("{}", statement);

        let mut file = tokio::fs::File::open(&batch.path)
            .await
            .context(ReadStagedSnafu { path: &path })?;

        let start = Instant::now();
        let mut conn = self
            .pool
            .acquire()
            .await
            .context(CopyStartSnafu { table })?;
        let mut copy = conn
            .copy_in_raw(&statement)
            .await
            .context(CopyStartSnafu { table })?;

        let mut buf = BytesMut::with_capacity(COPY_CHUNK_BYTES);
        loop {
            buf.reserve(COPY_CHUNK_BYTES);
            match file.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    copy.send(buf.split().freeze())
                        .await
                        .context(CopySendSnafu { table })?;
                }
                Err(e) => {
                    // The COPY must not commit a truncated batch.
                    let _ = copy.abort(format!("failed to read {path}")).await;
                    return Err(e).context(ReadStagedSnafu { path });
                }
            }
        }

        let rows = copy.finish().await.context(CopyFinishSnafu { table })?;
        info!(
            "COPY into {} finished: {} rows in {:?}",
            table,
            rows,
            start.elapsed()
        );
        Ok(rows)
    }
}

/// Build the COPY statement for a staged batch.
pub fn copy_statement(batch: &StagedBatch) -> Result<String, SinkError> {
    let table = quote_table(&batch.table_name)?;
    let columns = batch
        .columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let delimiter = batch.separator.to_string().replace('\'', "''");

    // A lone empty field is written quoted; read it back as null.
    let force_null = match batch.columns.as_slice() {
        [only] => format!(", FORCE_NULL ({})", quote_identifier(only)),
        _ => String::new(),
    };

    Ok(format!(
        "COPY {table} ({columns}) FROM STDIN WITH (FORMAT csv, DELIMITER '{delimiter}', HEADER true{force_null})"
    ))
}

/// Quote a possibly schema-qualified table name.
fn quote_table(name: &str) -> Result<String, SinkError> {
    let parts: Vec<&str> = name.split('.').collect();
    ensure!(
        !parts.iter().any(|p| p.is_empty()) && !name.contains('\0'),
        RejectedSnafu {
            table: name,
            message: "invalid table name",
        }
    );
    Ok(parts
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join("."))
}

/// Leave plain lowercase identifiers bare so they keep PostgreSQL's case
/// folding; quote everything else.
fn quote_identifier(ident: &str) -> String {
    if PLAIN_IDENTIFIER.is_match(ident) {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn batch(table: &str, columns: &[&str], separator: char) -> StagedBatch {
        StagedBatch {
            table_name: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            separator,
            path: PathBuf::from("/tmp/users.csv"),
            rows: 0,
            bytes: 0,
        }
    }

    #[test]
    fn test_copy_statement() {
        let statement = copy_statement(&batch("users", &["id", "email"], ',')).unwrap();
        assert_eq!(
            statement,
            "COPY users (id, email) FROM STDIN WITH (FORMAT csv, DELIMITER ',', HEADER true)"
        );
    }

    #[test]
    fn test_copy_statement_quotes_where_needed() {
        let statement =
            copy_statement(&batch("staging.Users", &["Signup Date", "a\"b"], ';')).unwrap();
        assert!(statement.starts_with("COPY staging.\"Users\" (\"Signup Date\", \"a\"\"b\")"));
        assert!(statement.contains("DELIMITER ';'"));
    }

    #[test]
    fn test_single_quote_delimiter_escaped() {
        let statement = copy_statement(&batch("t", &["a"], '\'')).unwrap();
        assert!(statement.contains("DELIMITER ''''"));
        assert!(statement.ends_with("HEADER true, FORCE_NULL (a))"));
    }

    #[test]
    fn test_invalid_table_rejected() {
        assert!(matches!(
            copy_statement(&batch("public.", &["a"], ',')),
            Err(SinkError::Rejected { .. })
        ));
        assert!(matches!(
            copy_statement(&batch("", &["a"], ',')),
            Err(SinkError::Rejected { .. })
        ));
    }
}
