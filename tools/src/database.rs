use std::path::{Path, PathBuf};

use async_trait::async_trait;
use opsgate_core::registry::parse_args;
use opsgate_core::retry::{self, RetryPolicy};
use opsgate_core::{ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use serde::Deserialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row, TypeInfo, ValueRef};

use crate::files::write_output;

#[derive(Debug, Deserialize)]
struct Args {
    db_path: PathBuf,
    query: String,
    file_dest: PathBuf,
}

/// Runs one SQL statement against a SQLite database file.
pub struct QueryDatabase;

#[async_trait]
impl ToolHandler for QueryDatabase {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "query_database",
            "Run a SQL query against a SQLite database file and write the result rows \
             (one per line, columns separated by commas) to a destination file.",
        )
        .required("db_path", ParamType::String, "Path of the SQLite database file")
        .required("query", ParamType::String, "SQL statement to execute")
        .required("file_dest", ParamType::String, "Path to write the result rows to")
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;
        if !args.db_path.is_file() {
            return Err(ToolError::io(
                &args.db_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "database file not found"),
            ));
        }

        // Local work: bounded by the timeout but never retried.
        let policy = RetryPolicy::no_retry(ctx.retry().attempt_timeout);
        let db_path = args.db_path.as_path();
        let query = args.query.as_str();
        let lines = retry::run(&policy, "sqlite query", || query_rows(db_path, query))
            .await
            .map_err(|err| err.for_operation("sqlite query"))?;

        let mut contents = lines.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        write_output(&args.file_dest, &contents).await?;

        Ok(ToolOutput::new(format!(
            "{} row(s) written to {}",
            lines.len(),
            args.file_dest.display()
        )))
    }
}

async fn query_rows(db_path: &Path, query: &str) -> Result<Vec<String>, ToolError> {
    let mut conn = SqliteConnectOptions::new()
        .filename(db_path)
        .connect()
        .await
        .map_err(db_error)?;

    let rows = sqlx::query(query).fetch_all(&mut conn).await.map_err(db_error)?;
    conn.close().await.map_err(db_error)?;

    rows.iter().map(render_row).collect()
}

fn render_row(row: &SqliteRow) -> Result<String, ToolError> {
    let values = (0..row.len())
        .map(|i| render_value(row, i))
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_error)?;
    Ok(values.join(","))
}

/// Render one column by its runtime storage class. NULL renders as `NULL`, blobs as hex.
fn render_value(row: &SqliteRow, index: usize) -> Result<String, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok("NULL".to_string());
    }
    let storage = raw.type_info().name().to_string();
    match storage.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index).map(|v| v.to_string()),
        "REAL" => row.try_get::<f64, _>(index).map(|v| v.to_string()),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| bytes.iter().map(|b| format!("{b:02x}")).collect()),
        _ => row.try_get::<String, _>(index),
    }
}

fn db_error(err: sqlx::Error) -> ToolError {
    ToolError::Database(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsgate_core::testing::{test_context, ScriptedModel};
    use opsgate_core::Config;
    use serde_json::json;
    use std::sync::Arc;

    async fn seed(path: &Path) {
        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        for statement in [
            "CREATE TABLE tickets (type TEXT, units INTEGER, price REAL)",
            "INSERT INTO tickets VALUES ('Gold', 2, 10.5), ('Silver', 1, 4.0), ('Gold', 3, 10.5)",
        ] {
            sqlx::query(statement).execute(&mut conn).await.unwrap();
        }
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn writes_one_line_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ticket-sales.db");
        seed(&db).await;

        let dest = dir.path().join("ticket-sales-gold.txt");
        let ctx = test_context(Config::default(), Arc::new(ScriptedModel::new()));
        QueryDatabase
            .call(
                &ctx,
                json!({
                    "db_path": db,
                    "query": "SELECT type, SUM(units), SUM(units * price) FROM tickets GROUP BY type ORDER BY type",
                    "file_dest": dest,
                }),
            )
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "Gold,5,52.5\nSilver,1,4\n"
        );
    }

    #[tokio::test]
    async fn missing_database_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("absent.db");

        let ctx = test_context(Config::default(), Arc::new(ScriptedModel::new()));
        let err = QueryDatabase
            .call(
                &ctx,
                json!({ "db_path": db, "query": "SELECT 1", "file_dest": dir.path().join("o.txt") }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Io { .. }));
        assert!(!db.exists());
    }

    #[tokio::test]
    async fn bad_sql_is_a_database_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("t.db");
        seed(&db).await;

        let ctx = test_context(Config::default(), Arc::new(ScriptedModel::new()));
        let err = QueryDatabase
            .call(
                &ctx,
                json!({ "db_path": db, "query": "SELEC nonsense", "file_dest": dir.path().join("o.txt") }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Database(_)));
    }
}
