use serde::Serialize;
use serde_json::{Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{
    Column, Executor, Row, Sqlite, SqlitePool, Statement, Transaction, TypeInfo, ValueRef,
};
use tracing::debug;

use crate::sql::SENSITIVE_COLUMNS;
use crate::{AssistantError, AssistantResult};

/// Rows returned by an assistant query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// More rows matched than the cap allowed.
    pub truncated: bool,
}

/// Run a guarded statement, keeping at most `max_rows` rows.
///
/// The statement runs inside a transaction that is always rolled back. A
/// statement whose result would carry a credential column is refused before
/// any row is read, however the column was selected.
pub async fn run_read_only(
    pool: &SqlitePool,
    statement: &str,
    max_rows: u32,
) -> AssistantResult<QueryResult> {
    let cap = i64::from(max_rows.max(1));
    let wrapped = format!("SELECT * FROM ({statement}) LIMIT {}", cap + 1);

    let mut tx = pool.begin().await?;
    let fetched = fetch_checked(&mut tx, &wrapped).await;
    tx.rollback().await?;
    let (columns, mut rows) = fetched?;

    let truncated = rows.len() as i64 > cap;
    rows.truncate(cap as usize);

    let rows = rows
        .iter()
        .map(row_values)
        .collect::<AssistantResult<Vec<_>>>()?;

    debug!(rows = rows.len(), truncated, "assistant query executed");
    Ok(QueryResult {
        columns,
        rows,
        truncated,
    })
}

/// Prepare first so the result columns are known even when no row matches.
async fn fetch_checked(
    tx: &mut Transaction<'_, Sqlite>,
    statement: &str,
) -> AssistantResult<(Vec<String>, Vec<SqliteRow>)> {
    let prepared = (&mut **tx)
        .prepare(statement)
        .await
        .map_err(|e| AssistantError::Query(e.to_string()))?;
    let columns: Vec<String> = prepared
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();
    if let Some(column) = sensitive_column(&columns) {
        return Err(AssistantError::Blocked(format!(
            "the result would expose the {column} column"
        )));
    }

    let rows = sqlx::query(statement)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| AssistantError::Query(e.to_string()))?;
    Ok((columns, rows))
}

fn sensitive_column(columns: &[String]) -> Option<&str> {
    columns
        .iter()
        .map(String::as_str)
        .find(|name| SENSITIVE_COLUMNS.contains(&name.to_ascii_lowercase().as_str()))
}

fn row_values(row: &SqliteRow) -> AssistantResult<Vec<Value>> {
    (0..row.columns().len())
        .map(|index| {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let kind = raw.type_info().name().to_string();
            let value = match kind.as_str() {
                "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" => Number::from_f64(row.try_get_unchecked::<f64, _>(index)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                    Value::String(format!("<{} bytes>", bytes.len()))
                }
                _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
            };
            Ok(value)
        })
        .collect()
}
