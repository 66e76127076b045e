//! WebSQL driver.
//!
//! Each instance owns the table `store_name` in database `name`. Values are
//! written as serialized strings.

use super::WEBSQL;
use crate::driver::{
    visit_entries, Driver, DriverContext, DriverKind, DropScope, Storage, Visitor,
};
use crate::error::{ForageError, ForageResult};
use async_trait::async_trait;
use forage_codec::{deserialize, serialize, Value};
use forage_host::{
    is_web_sql_valid, HostEnvironment, HostError, SqlDatabase, SqlResultSet, SqlRow, SqlStatement,
    SqlValue, WebSql,
};
use std::sync::Arc;

/// The WebSQL driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSqlDriver;

#[async_trait]
impl Driver for WebSqlDriver {
    fn name(&self) -> &str {
        WEBSQL
    }

    fn kind(&self) -> DriverKind {
        DriverKind::WebSql
    }

    fn is_supported(&self, env: &HostEnvironment) -> bool {
        is_web_sql_valid(env)
    }

    async fn init_storage(&self, ctx: &DriverContext) -> ForageResult<Arc<dyn Storage>> {
        let api = ctx
            .env
            .web_sql
            .clone()
            .ok_or_else(|| HostError::InvalidState("WebSQL is not available".into()))?;
        let config = &ctx.config;

        let db = api
            .open_database(
                &config.name,
                &config.version.to_string(),
                &config.description,
                config.size,
            )
            .await?;
        let table = config.store_name.clone();
        db.transaction(vec![SqlStatement::new(format!(
            "CREATE TABLE IF NOT EXISTS {table} (id INTEGER PRIMARY KEY, key unique, value)"
        ))])
        .await?;

        Ok(Arc::new(WebSqlStorage {
            api,
            db,
            size: config.size,
            table,
        }))
    }
}

struct WebSqlStorage {
    api: Arc<dyn WebSql>,
    db: Arc<dyn SqlDatabase>,
    size: u64,
    table: String,
}

impl WebSqlStorage {
    async fn execute(&self, sql: String, params: Vec<SqlValue>) -> ForageResult<SqlResultSet> {
        let mut results = self
            .db
            .transaction(vec![SqlStatement::with_params(sql, params)])
            .await?;
        Ok(results.pop().unwrap_or_default())
    }

    async fn drop_tables(db: &dyn SqlDatabase, tables: Vec<String>) -> ForageResult<()> {
        let statements = tables
            .into_iter()
            .map(|table| SqlStatement::new(format!("DROP TABLE IF EXISTS {table}")))
            .collect();
        db.transaction(statements).await?;
        Ok(())
    }
}

fn text_column(row: &SqlRow, column: &str) -> ForageResult<String> {
    row.get(column)
        .and_then(SqlValue::as_text)
        .map(str::to_string)
        .ok_or_else(|| ForageError::driver(format!("column {column} is not text")))
}

fn row_count(result: &SqlResultSet) -> ForageResult<usize> {
    let count = result
        .rows
        .first()
        .and_then(|row| row.get("c"))
        .and_then(SqlValue::as_integer)
        .ok_or_else(|| ForageError::driver("row count missing from result"))?;
    usize::try_from(count).map_err(|_| ForageError::driver(format!("invalid row count {count}")))
}

fn decode_row(row: &SqlRow) -> ForageResult<(String, Value)> {
    let key = text_column(row, "key")?;
    let value = match row.get("value") {
        Some(SqlValue::Text(text)) => deserialize(text)?,
        _ => Value::Null,
    };
    Ok((key, value))
}

#[async_trait]
impl Storage for WebSqlStorage {
    async fn get_item(&self, key: &str) -> ForageResult<Option<Value>> {
        let table = &self.table;
        let result = self
            .execute(
                format!("SELECT * FROM {table} WHERE key = ? LIMIT 1"),
                vec![key.into()],
            )
            .await?;
        match result.rows.first() {
            Some(row) => Ok(Some(decode_row(row)?.1)),
            None => Ok(None),
        }
    }

    async fn set_item(&self, key: &str, value: Value) -> ForageResult<Value> {
        let table = &self.table;
        let text = serialize(&value)?;
        self.execute(
            format!("INSERT OR REPLACE INTO {table} (key, value) VALUES (?, ?)"),
            vec![key.into(), text.into()],
        )
        .await?;
        Ok(value)
    }

    async fn remove_item(&self, key: &str) -> ForageResult<()> {
        let table = &self.table;
        self.execute(format!("DELETE FROM {table} WHERE key = ?"), vec![key.into()])
            .await?;
        Ok(())
    }

    async fn clear(&self) -> ForageResult<()> {
        let table = &self.table;
        self.execute(format!("DELETE FROM {table}"), Vec::new()).await?;
        Ok(())
    }

    async fn length(&self) -> ForageResult<usize> {
        let table = &self.table;
        let result = self
            .execute(format!("SELECT COUNT(key) AS c FROM {table}"), Vec::new())
            .await?;
        row_count(&result)
    }

    async fn key(&self, index: usize) -> ForageResult<Option<String>> {
        let table = &self.table;
        let offset = i64::try_from(index).map_err(|_| ForageError::driver("key index too large"))?;
        let result = self
            .execute(
                format!("SELECT key FROM {table} ORDER BY id LIMIT 1 OFFSET ?"),
                vec![offset.into()],
            )
            .await?;
        result
            .rows
            .first()
            .map(|row| text_column(row, "key"))
            .transpose()
    }

    async fn keys(&self) -> ForageResult<Vec<String>> {
        let table = &self.table;
        let result = self
            .execute(format!("SELECT key FROM {table} ORDER BY id"), Vec::new())
            .await?;
        result
            .rows
            .iter()
            .map(|row| text_column(row, "key"))
            .collect()
    }

    async fn iterate(&self, visitor: &mut Visitor<'_>) -> ForageResult<Option<Value>> {
        let table = &self.table;
        let result = self
            .execute(format!("SELECT key, value FROM {table} ORDER BY id"), Vec::new())
            .await?;
        let entries = result
            .rows
            .iter()
            .map(decode_row)
            .collect::<ForageResult<Vec<_>>>()?;
        Ok(visit_entries(entries, visitor))
    }

    async fn drop_instance(&self, scope: &DropScope) -> ForageResult<()> {
        let name = match scope {
            DropScope::Store { name, .. } | DropScope::Database { name } => name,
        };
        let db = self.api.open_database(name, "", "", self.size).await?;

        let tables = match scope {
            DropScope::Store { store_name, .. } => vec![store_name.clone()],
            DropScope::Database { .. } => {
                let result = db
                    .transaction(vec![SqlStatement::new(
                        "SELECT name FROM sqlite_master WHERE type = 'table' \
                         AND name <> '__WebKitDatabaseInfoTable__' \
                         AND name NOT LIKE 'sqlite_%'",
                    )])
                    .await?;
                let mut tables = Vec::new();
                for set in result {
                    for row in &set.rows {
                        tables.push(text_column(row, "name")?);
                    }
                }
                tables
            }
        };

        tracing::debug!(db = %name, ?tables, "dropping tables");
        Self::drop_tables(db.as_ref(), tables).await
    }
}
