//! WebSQL-like host API backed by SQLite.

use crate::error::{HostError, HostResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Table in which a database records its version string.
const INFO_TABLE: &str = "__WebKitDatabaseInfoTable__";
const VERSION_KEY: &str = "WebKitDatabaseVersionKey";

/// A SQL parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Integer column.
    Integer(i64),
    /// Floating point column.
    Real(f64),
    /// Text column.
    Text(String),
    /// Blob column.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer value.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Integer(n)
    }
}

impl From<SqlValue> for SqliteValue {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => SqliteValue::Null,
            SqlValue::Integer(n) => SqliteValue::Integer(n),
            SqlValue::Real(f) => SqliteValue::Real(f),
            SqlValue::Text(s) => SqliteValue::Text(s),
            SqlValue::Blob(b) => SqliteValue::Blob(b),
        }
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(n) => SqlValue::Integer(n),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

/// One parameterised SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Positional parameters.
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    /// A statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A statement with positional parameters.
    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// A result row: column names with their values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    /// Looks up a column by name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// Outcome of one statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlResultSet {
    /// Rows produced by a query.
    pub rows: Vec<SqlRow>,
    /// Rows changed by a data-modifying statement.
    pub rows_affected: usize,
    /// Row id of the last insert, if the statement inserted.
    pub insert_id: Option<i64>,
}

/// A WebSQL-like host API.
#[async_trait]
pub trait WebSql: Send + Sync + Debug {
    /// Opens (creating if needed) a database.
    ///
    /// An empty `version` accepts whatever version is stored. Otherwise a
    /// database already stamped with a different version fails with
    /// [`HostError::VersionError`].
    async fn open_database(
        &self,
        name: &str,
        version: &str,
        description: &str,
        size: u64,
    ) -> HostResult<Arc<dyn SqlDatabase>>;
}

/// An open WebSQL database.
#[async_trait]
pub trait SqlDatabase: Send + Sync + Debug {
    /// The version string stamped on this database.
    fn version(&self) -> String;

    /// Runs `statements` in one transaction.
    ///
    /// If any statement fails the whole transaction is rolled back and the
    /// error is returned.
    async fn transaction(&self, statements: Vec<SqlStatement>) -> HostResult<Vec<SqlResultSet>>;
}

/// WebSQL host backed by SQLite.
///
/// Databases live in memory or as one `.sqlite` file per database under a
/// directory. Opening the same name twice returns the same connection.
pub struct SqliteWebSql {
    dir: Option<PathBuf>,
    open: Mutex<HashMap<String, Arc<SqliteDatabase>>>,
}

impl Debug for SqliteWebSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteWebSql")
            .field("dir", &self.dir)
            .field("open", &self.open.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SqliteWebSql {
    /// Creates a host whose databases live in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a host storing databases under `dir`, creating it if needed.
    pub fn open_dir(dir: impl AsRef<Path>) -> HostResult<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: Some(dir.as_ref().to_path_buf()),
            open: Mutex::new(HashMap::new()),
        })
    }

    fn connect(&self, name: &str) -> HostResult<Connection> {
        let conn = match &self.dir {
            Some(dir) => Connection::open(dir.join(database_file_name(name)))?,
            None => Connection::open_in_memory()?,
        };
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {INFO_TABLE} \
             (key TEXT NOT NULL UNIQUE ON CONFLICT REPLACE, value TEXT NOT NULL)"
        ))?;
        Ok(conn)
    }
}

#[async_trait]
impl WebSql for SqliteWebSql {
    async fn open_database(
        &self,
        name: &str,
        version: &str,
        description: &str,
        size: u64,
    ) -> HostResult<Arc<dyn SqlDatabase>> {
        let mut open = self.open.lock();
        let database = match open.get(name) {
            Some(database) => Arc::clone(database),
            None => {
                let database = Arc::new(SqliteDatabase::new(
                    self.connect(name)?,
                    description.to_string(),
                )?);
                tracing::debug!(db = name, size, "opened sqlite database");
                open.insert(name.to_string(), Arc::clone(&database));
                database
            }
        };

        database.check_version(version)?;
        Ok(database)
    }
}

/// One SQLite-backed database.
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
    version: Mutex<String>,
    description: String,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("version", &*self.version.lock())
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl SqliteDatabase {
    fn new(conn: Connection, description: String) -> HostResult<Self> {
        let version: Option<String> = conn
            .query_row(
                &format!("SELECT value FROM {INFO_TABLE} WHERE key = ?1"),
                [VERSION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(Self {
            conn: Mutex::new(conn),
            version: Mutex::new(version.unwrap_or_default()),
            description,
        })
    }

    /// The description supplied when the database was first opened.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    fn check_version(&self, requested: &str) -> HostResult<()> {
        let mut stored = self.version.lock();
        if requested.is_empty() || *stored == requested {
            return Ok(());
        }
        if !stored.is_empty() {
            return Err(HostError::VersionError(format!(
                "database is at version {stored:?}, not {requested:?}"
            )));
        }

        self.conn.lock().execute(
            &format!("INSERT INTO {INFO_TABLE} (key, value) VALUES (?1, ?2)"),
            [VERSION_KEY, requested],
        )?;
        *stored = requested.to_string();
        Ok(())
    }
}

#[async_trait]
impl SqlDatabase for SqliteDatabase {
    fn version(&self) -> String {
        self.version.lock().clone()
    }

    async fn transaction(&self, statements: Vec<SqlStatement>) -> HostResult<Vec<SqlResultSet>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut results = Vec::with_capacity(statements.len());

        for statement in statements {
            results.push(run_statement(&tx, statement)?);
        }

        tx.commit()?;
        Ok(results)
    }
}

fn run_statement(conn: &Connection, statement: SqlStatement) -> HostResult<SqlResultSet> {
    let mut prepared = conn.prepare(&statement.sql)?;
    let params = params_from_iter(statement.params.into_iter().map(SqliteValue::from));

    if prepared.column_count() == 0 {
        let rows_affected = prepared.execute(params)?;
        return Ok(SqlResultSet {
            rows: Vec::new(),
            rows_affected,
            insert_id: Some(conn.last_insert_rowid()).filter(|_| rows_affected > 0),
        });
    }

    let names: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = prepared.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            columns.push((name.clone(), SqlValue::from(row.get_ref(i)?)));
        }
        out.push(SqlRow { columns });
    }

    Ok(SqlResultSet {
        rows: out,
        rows_affected: 0,
        insert_id: None,
    })
}

fn database_file_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{safe}.sqlite")
}
