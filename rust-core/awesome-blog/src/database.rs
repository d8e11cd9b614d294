//! # Database Module
//!
//! SQLite persistence for [`Model`] records through a SQLx pool.
//!
//! Rows travel as maps of [`DbValue`] and are converted to and from models
//! with serde, so a model only declares its table and column list.

use crate::models::{Blog, Comment, Model, User};
use awesome_core::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo};
use std::collections::HashMap;
use tracing::{debug, info};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT NOT NULL PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        passwd TEXT NOT NULL,
        admin BOOLEAN NOT NULL,
        name TEXT NOT NULL,
        image TEXT NOT NULL,
        created_at REAL NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_users_created_at ON users (created_at)",
    "CREATE TABLE IF NOT EXISTS blogs (
        id TEXT NOT NULL PRIMARY KEY,
        user_id TEXT NOT NULL,
        user_name TEXT NOT NULL,
        user_image TEXT NOT NULL,
        name TEXT NOT NULL,
        summary TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at REAL NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_blogs_created_at ON blogs (created_at)",
    "CREATE TABLE IF NOT EXISTS comments (
        id TEXT NOT NULL PRIMARY KEY,
        blog_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        user_name TEXT NOT NULL,
        user_image TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at REAL NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_comments_created_at ON comments (created_at)",
];

/// Database value types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DbValue {
    /// Null value
    Null,
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Boolean value
    Bool(bool),
    /// Binary data
    Bytes(Vec<u8>),
}

impl From<&Value> for DbValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or_default()), Self::Int),
            Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }
}

impl From<&str> for DbValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for DbValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for DbValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// Filter, ordering and window for [`Database::find_all`]
#[derive(Debug, Clone, Default)]
pub struct Query {
    where_clause: Option<String>,
    args: Vec<DbValue>,
    order_by: Option<String>,
    limit: Option<(u64, u64)>,
}

impl Query {
    /// Every row
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// SQL condition with `?` placeholders and their values
    #[must_use]
    pub fn filter(mut self, clause: impl Into<String>, args: Vec<DbValue>) -> Self {
        self.where_clause = Some(clause.into());
        self.args = args;
        self
    }

    /// SQL ordering, e.g. `created_at desc`
    #[must_use]
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    /// Skip `offset` rows and return at most `limit`
    #[must_use]
    pub const fn limit(mut self, offset: u64, limit: u64) -> Self {
        self.limit = Some((offset, limit));
        self
    }
}

/// SQLite connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to a SQLite database
    ///
    /// # Arguments
    ///
    /// * `url` - Database URL (e.g., "sqlite:awesome.db?mode=rwc" or "sqlite::memory:")
    /// * `max_connections` - Maximum pool size; use 1 for in-memory databases
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the pool cannot be opened.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await
            .map_err(|e| Error::database(format!("SQLite connection failed: {e}")))?;

        info!(url = %url, max_connections, "database pool created");
        Ok(Self { pool })
    }

    /// Create the users, blogs and comments tables if missing
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if a statement fails.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(query_error)?;
        }
        debug!(tables = ?[User::TABLE, Blog::TABLE, Comment::TABLE], "schema ready");
        Ok(())
    }

    /// Record by primary key
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on query or conversion failure.
    pub async fn find<M: Model>(&self, id: &str) -> Result<Option<M>> {
        let sql = format!(
            "SELECT {} FROM `{}` WHERE `{}` = ?",
            columns::<M>(),
            M::TABLE,
            M::PRIMARY_KEY
        );
        debug!(sql = %sql, "find");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        row.map(|r| row_to_model(&r)).transpose()
    }

    /// Records matching `query`
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on query or conversion failure.
    pub async fn find_all<M: Model>(&self, query: &Query) -> Result<Vec<M>> {
        let mut sql = format!("SELECT {} FROM `{}`", columns::<M>(), M::TABLE);
        let mut args = query.args.clone();
        if let Some(clause) = &query.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        if let Some(order) = &query.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some((offset, limit)) = query.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            args.push(DbValue::Int(clamp(limit)));
            args.push(DbValue::Int(clamp(offset)));
        }
        debug!(sql = %sql, args = args.len(), "find_all");

        let rows = bind_all(sqlx::query(&sql), &args)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter().map(row_to_model).collect()
    }

    /// Single number, e.g. `count(id)`, over rows matching `where_clause`
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on query failure.
    pub async fn find_number<M: Model>(
        &self,
        select: &str,
        where_clause: Option<&str>,
        args: &[DbValue],
    ) -> Result<u64> {
        let mut sql = format!("SELECT {select} AS _num_ FROM `{}`", M::TABLE);
        if let Some(clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        debug!(sql = %sql, "find_number");

        let row = bind_all(sqlx::query(&sql), args)
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;
        let number: Option<i64> = row.try_get(0_usize).map_err(query_error)?;
        Ok(number.and_then(|n| u64::try_from(n).ok()).unwrap_or_default())
    }

    /// Insert a new record
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the insert fails or touches no row.
    pub async fn save<M: Model>(&self, model: &M) -> Result<()> {
        let mut names = vec![M::PRIMARY_KEY];
        names.extend_from_slice(M::FIELDS);
        let sql = format!(
            "INSERT INTO `{}` ({}) VALUES ({})",
            M::TABLE,
            quoted(&names),
            vec!["?"; names.len()].join(", ")
        );
        let args = model_values(model, &names)?;
        self.execute_one(&sql, &args, "insert").await
    }

    /// Overwrite every column of an existing record
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the update fails or touches no row.
    pub async fn update<M: Model>(&self, model: &M) -> Result<()> {
        let assignments: Vec<String> = M::FIELDS.iter().map(|f| format!("`{f}` = ?")).collect();
        let sql = format!(
            "UPDATE `{}` SET {} WHERE `{}` = ?",
            M::TABLE,
            assignments.join(", "),
            M::PRIMARY_KEY
        );
        let mut names = M::FIELDS.to_vec();
        names.push(M::PRIMARY_KEY);
        let args = model_values(model, &names)?;
        self.execute_one(&sql, &args, "update").await
    }

    /// Delete a record by its primary key
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the delete fails or touches no row.
    pub async fn remove<M: Model>(&self, model: &M) -> Result<()> {
        let sql = format!("DELETE FROM `{}` WHERE `{}` = ?", M::TABLE, M::PRIMARY_KEY);
        let args = [DbValue::from(model.primary_key())];
        self.execute_one(&sql, &args, "remove").await
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn execute_one(&self, sql: &str, args: &[DbValue], action: &str) -> Result<()> {
        debug!(sql = %sql, "{action}");
        let result = bind_all(sqlx::query(sql), args)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        match result.rows_affected() {
            1 => Ok(()),
            n => Err(Error::database(format!("failed to {action} record: affected rows: {n}"))),
        }
    }
}

fn query_error(e: sqlx::Error) -> Error {
    Error::database(format!("Query error: {e}"))
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn quoted(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("`{n}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn columns<M: Model>() -> String {
    let mut names = vec![M::PRIMARY_KEY];
    names.extend_from_slice(M::FIELDS);
    quoted(&names)
}

fn bind_all<'q>(mut query: SqliteQuery<'q>, args: &[DbValue]) -> SqliteQuery<'q> {
    for arg in args {
        query = match arg {
            DbValue::Null => query.bind(None::<String>),
            DbValue::Int(i) => query.bind(*i),
            DbValue::Float(f) => query.bind(*f),
            DbValue::String(s) => query.bind(s.clone()),
            DbValue::Bool(b) => query.bind(*b),
            DbValue::Bytes(b) => query.bind(b.clone()),
        };
    }
    query
}

fn model_values<M: Model>(model: &M, names: &[&str]) -> Result<Vec<DbValue>> {
    let Value::Object(map) = serde_json::to_value(model)? else {
        return Err(Error::database(format!("{} record is not a map", M::TABLE)));
    };
    Ok(names
        .iter()
        .map(|name| map.get(*name).map_or(DbValue::Null, DbValue::from))
        .collect())
}

fn row_to_model<M: Model>(row: &SqliteRow) -> Result<M> {
    let value = serde_json::to_value(sqlite_row_to_map(row))?;
    serde_json::from_value(value).map_err(|e| Error::database(format!("cannot read {} row: {e}", M::TABLE)))
}

/// Convert SQLite row to HashMap
fn sqlite_row_to_map(row: &SqliteRow) -> HashMap<String, DbValue> {
    let mut map = HashMap::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();

        let value = match type_name {
            "INTEGER" => row
                .try_get::<i64, _>(i)
                .map_or(DbValue::Null, DbValue::Int),
            "BOOLEAN" => row
                .try_get::<bool, _>(i)
                .map_or(DbValue::Null, DbValue::Bool),
            "REAL" => row
                .try_get::<f64, _>(i)
                .map_or(DbValue::Null, DbValue::Float),
            "BLOB" => row
                .try_get::<Vec<u8>, _>(i)
                .map_or(DbValue::Null, DbValue::Bytes),
            _ => row
                .try_get::<String, _>(i)
                .map_or(DbValue::Null, DbValue::String),
        };

        map.insert(name, value);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{next_id, now, DEFAULT_IMAGE};

    async fn database() -> Database {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        db.init_schema().await.unwrap();
        db
    }

    fn user(email: &str, admin: bool) -> User {
        User {
            id: next_id(),
            email: email.to_string(),
            passwd: "stored".to_string(),
            admin,
            name: email.split('@').next().unwrap_or_default().to_string(),
            image: DEFAULT_IMAGE.to_string(),
            created_at: now(),
        }
    }

    fn blog(n: u32) -> Blog {
        Blog {
            id: next_id(),
            user_id: "u".to_string(),
            user_name: "Admin".to_string(),
            user_image: DEFAULT_IMAGE.to_string(),
            name: format!("Blog {n}"),
            summary: "summary".to_string(),
            content: "content".to_string(),
            created_at: f64::from(n),
        }
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let db = database().await;
        let admin = user("admin@example.com", true);
        db.save(&admin).await.unwrap();

        let found: User = db.find(&admin.id).await.unwrap().unwrap();
        assert_eq!(found, admin);
        assert!(db.find::<User>("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_all_with_filter_order_and_limit() {
        let db = database().await;
        for n in 1..=5 {
            db.save(&blog(n)).await.unwrap();
        }

        let page: Vec<Blog> = db
            .find_all(&Query::new().order_by("created_at desc").limit(1, 2))
            .await
            .unwrap();
        let names: Vec<&str> = page.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Blog 4", "Blog 3"]);

        let named: Vec<Blog> = db
            .find_all(&Query::new().filter("name = ?", vec!["Blog 2".into()]))
            .await
            .unwrap();
        assert_eq!(named.len(), 1);
    }

    #[tokio::test]
    async fn test_find_number() {
        let db = database().await;
        assert_eq!(db.find_number::<Blog>("count(id)", None, &[]).await.unwrap(), 0);
        for n in 1..=3 {
            db.save(&blog(n)).await.unwrap();
        }
        assert_eq!(db.find_number::<Blog>("count(id)", None, &[]).await.unwrap(), 3);
        let filtered = db
            .find_number::<Blog>("count(id)", Some("created_at > ?"), &[DbValue::Float(1.5)])
            .await
            .unwrap();
        assert_eq!(filtered, 2);
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let db = database().await;
        let mut post = blog(1);
        db.save(&post).await.unwrap();

        post.name = "Renamed".to_string();
        db.update(&post).await.unwrap();
        let found: Blog = db.find(&post.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Renamed");

        db.remove(&post).await.unwrap();
        assert!(db.find::<Blog>(&post.id).await.unwrap().is_none());
        assert!(db.remove(&post).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = database().await;
        db.save(&user("same@example.com", false)).await.unwrap();
        assert!(db.save(&user("same@example.com", false)).await.is_err());
    }

    #[test]
    fn test_db_value_from_json() {
        assert_eq!(DbValue::from(&Value::from(3)), DbValue::Int(3));
        assert_eq!(DbValue::from(&Value::from(1.5)), DbValue::Float(1.5));
        assert_eq!(DbValue::from(&Value::Bool(true)), DbValue::Bool(true));
        assert_eq!(DbValue::from(&Value::Null), DbValue::Null);
    }
}
