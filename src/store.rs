//! Persistence adapter.
//!
//! Reference tables (projects, users, groups, memberships) are append-only
//! and deduplicated on natural keys: before a batch is appended the keys
//! already stored are read, and incoming rows whose key is present are
//! dropped. Re-running a sync against unchanged data therefore adds no rows.
//!
//! Inspection batches and their details are never deduplicated; every run
//! appends a new batch. Route and connection-URL tables are replaced
//! wholesale by each harvest.

use anyhow::Result;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::error::{InspectError, InspectResult};
use crate::migrate;
use crate::models::{
    CredentialUrlRecord, DefectRecord, Group, GroupUser, InspectionBatch, Project, ProjectGroup,
    ProjectUser, RouteRecord, RouteSource, User,
};

/// A row that can go through [`Store::insert_dedup`].
pub trait DedupRow {
    const TABLE: &'static str;
    /// Natural-key columns checked against rows already stored.
    const KEY_COLUMNS: &'static [&'static str];

    fn key(&self) -> Vec<i64>;

    /// Identity used to drop repeats within one incoming batch.
    fn identity(&self) -> Vec<i64> {
        self.key()
    }

    fn insert(&self, now: i64) -> Query<'_, Sqlite, SqliteArguments<'_>>;
}

impl DedupRow for Project {
    const TABLE: &'static str = "projects";
    const KEY_COLUMNS: &'static [&'static str] = &["git_id"];

    fn key(&self) -> Vec<i64> {
        vec![self.id]
    }

    fn insert(&self, now: i64) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            "INSERT INTO projects (git_id, name, description, kind, namespace_id, web_url, git_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.description)
        .bind(self.namespace_kind.as_str())
        .bind(self.namespace_id)
        .bind(&self.web_url)
        .bind(&self.clone_url)
        .bind(now)
        .bind(now)
    }
}

impl DedupRow for User {
    const TABLE: &'static str = "users";
    const KEY_COLUMNS: &'static [&'static str] = &["git_id"];

    fn key(&self) -> Vec<i64> {
        vec![self.id]
    }

    fn insert(&self, now: i64) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            "INSERT INTO users (git_id, username, name, email, web_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.id)
        .bind(&self.username)
        .bind(&self.name)
        .bind(&self.email)
        .bind(&self.web_url)
        .bind(now)
        .bind(now)
    }
}

impl DedupRow for Group {
    const TABLE: &'static str = "groups";
    const KEY_COLUMNS: &'static [&'static str] = &["git_id"];

    fn key(&self) -> Vec<i64> {
        vec![self.id]
    }

    fn insert(&self, now: i64) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            "INSERT INTO groups (git_id, name, description, web_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.description)
        .bind(&self.web_url)
        .bind(now)
        .bind(now)
    }
}

// Project memberships are keyed on the project alone: once a project has
// membership rows, later syncs leave them untouched.
impl DedupRow for ProjectUser {
    const TABLE: &'static str = "project_users";
    const KEY_COLUMNS: &'static [&'static str] = &["project_id"];

    fn key(&self) -> Vec<i64> {
        vec![self.project_id]
    }

    fn identity(&self) -> Vec<i64> {
        vec![self.project_id, self.user_id]
    }

    fn insert(&self, now: i64) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            "INSERT INTO project_users (project_id, user_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(self.project_id)
        .bind(self.user_id)
        .bind(now)
        .bind(now)
    }
}

impl DedupRow for ProjectGroup {
    const TABLE: &'static str = "project_groups";
    const KEY_COLUMNS: &'static [&'static str] = &["project_id"];

    fn key(&self) -> Vec<i64> {
        vec![self.project_id]
    }

    fn insert(&self, now: i64) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            "INSERT INTO project_groups (project_id, group_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(self.project_id)
        .bind(self.group_id)
        .bind(now)
        .bind(now)
    }
}

impl DedupRow for GroupUser {
    const TABLE: &'static str = "group_users";
    const KEY_COLUMNS: &'static [&'static str] = &["group_id", "user_id"];

    fn key(&self) -> Vec<i64> {
        vec![self.group_id, self.user_id]
    }

    fn insert(&self, now: i64) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            "INSERT INTO group_users (group_id, user_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(self.group_id)
        .bind(self.user_id)
        .bind(now)
        .bind(now)
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to the configured database, creating missing tables.
    pub async fn open(config: &Config) -> Result<Self> {
        Self::open_path(&config.db.path).await
    }

    pub async fn open_path(path: &Path) -> Result<Self> {
        let pool = db::connect_path(path).await?;
        migrate::apply(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Append the rows whose natural key is not stored yet. Returns the
    /// number of rows written.
    pub async fn insert_dedup<T: DedupRow>(&self, rows: &[T], now: i64) -> InspectResult<usize> {
        let sql = format!("SELECT {} FROM {}", T::KEY_COLUMNS.join(", "), T::TABLE);
        let existing: HashSet<Vec<i64>> = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| {
                (0..T::KEY_COLUMNS.len())
                    .map(|i| row.try_get::<i64, _>(i))
                    .collect::<std::result::Result<Vec<i64>, _>>()
            })
            .collect::<std::result::Result<_, _>>()?;

        let mut seen: HashSet<Vec<i64>> = HashSet::new();
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for row in rows {
            if existing.contains(&row.key()) || !seen.insert(row.identity()) {
                continue;
            }
            row.insert(now).execute(&mut *tx).await?;
            written += 1;
        }
        tx.commit().await?;

        tracing::debug!(
            table = T::TABLE,
            stored = existing.len(),
            incoming = rows.len(),
            written,
            "dedup insert"
        );
        Ok(written)
    }

    /// Store row id of the project with remote id `git_id`. Anything other
    /// than exactly one row is a consistency error.
    pub async fn project_row_id(&self, git_id: i64) -> InspectResult<i64> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM projects WHERE git_id = ?")
            .bind(git_id)
            .fetch_all(&self.pool)
            .await?;
        match ids.as_slice() {
            [id] => Ok(*id),
            _ => Err(InspectError::Consistency(format!(
                "expected exactly one stored project with git_id {}, found {}",
                git_id,
                ids.len()
            ))),
        }
    }

    /// Creation time of the newest batch for a project row.
    pub async fn latest_batch_at(&self, project_row: i64) -> InspectResult<Option<i64>> {
        let latest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(created_at) FROM inspect_batches WHERE project_id = ?")
                .bind(project_row)
                .fetch_one(&self.pool)
                .await?;
        Ok(latest)
    }

    /// Create one batch and link every defect to it, atomically. Returns
    /// `None` without touching the store when `defects` is empty.
    pub async fn record_inspection(
        &self,
        project_row: i64,
        now: i64,
        defects: &[DefectRecord],
    ) -> InspectResult<Option<i64>> {
        if defects.is_empty() {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;
        let batch_id = sqlx::query(
            "INSERT INTO inspect_batches (project_id, created_at, updated_at) VALUES (?, ?, ?)",
        )
        .bind(project_row)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for d in defects {
            sqlx::query(
                "INSERT INTO inspect_details (batch_id, file_name, file_path, commit_id, error_msg, \
                 error_code, error_type, location, content, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(batch_id)
            .bind(&d.file_name)
            .bind(&d.file_path)
            .bind(&d.commit_id)
            .bind(&d.error_msg)
            .bind(&d.error_code)
            .bind(&d.error_type)
            .bind(&d.location)
            .bind(&d.content)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(Some(batch_id))
    }

    /// Batches of a project row, oldest first.
    pub async fn batches_for(&self, project_row: i64) -> InspectResult<Vec<InspectionBatch>> {
        let rows = sqlx::query(
            "SELECT id, project_id, created_at FROM inspect_batches WHERE project_id = ? ORDER BY id",
        )
        .bind(project_row)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| InspectionBatch {
                id: row.get("id"),
                project_row: row.get("project_id"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn details_for(&self, batch_id: i64) -> InspectResult<Vec<DefectRecord>> {
        let rows = sqlx::query(
            "SELECT file_name, file_path, commit_id, error_msg, error_code, error_type, location, content \
             FROM inspect_details WHERE batch_id = ? ORDER BY id",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| DefectRecord {
                file_name: row.get("file_name"),
                file_path: row.get("file_path"),
                commit_id: row.get("commit_id"),
                error_msg: row.get("error_msg"),
                error_code: row.get("error_code"),
                error_type: row.get("error_type"),
                location: row.get("location"),
                content: row.get("content"),
            })
            .collect())
    }

    /// Replace the routes table with `records` in one transaction.
    pub async fn replace_routes(&self, records: &[RouteRecord], now: i64) -> InspectResult<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM routes").execute(&mut *tx).await?;
        for r in records {
            sqlx::query(
                "INSERT INTO routes (project_id, file, route, line, source, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(r.project_id)
            .bind(&r.file)
            .bind(&r.route)
            .bind(r.line.map(i64::from))
            .bind(r.source.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    pub async fn replace_credential_urls(
        &self,
        records: &[CredentialUrlRecord],
        now: i64,
    ) -> InspectResult<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM credential_urls")
            .execute(&mut *tx)
            .await?;
        for r in records {
            sqlx::query(
                "INSERT INTO credential_urls (project_id, file, url, line, text, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(r.project_id)
            .bind(&r.file)
            .bind(&r.url)
            .bind(i64::from(r.line))
            .bind(&r.text)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    pub async fn load_routes(&self) -> InspectResult<Vec<RouteRecord>> {
        let rows = sqlx::query(
            "SELECT project_id, file, route, line, source FROM routes ORDER BY project_id, file, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let source: String = row.get("source");
            let source: RouteSource = source.parse().map_err(InspectError::Consistency)?;
            let line: Option<i64> = row.get("line");
            out.push(RouteRecord {
                file: row.get("file"),
                route: row.get("route"),
                line: line.and_then(|l| u32::try_from(l).ok()),
                project_id: row.get("project_id"),
                source,
            });
        }
        Ok(out)
    }

    pub async fn load_credential_urls(&self) -> InspectResult<Vec<CredentialUrlRecord>> {
        let rows = sqlx::query(
            "SELECT project_id, file, url, line, text FROM credential_urls ORDER BY project_id, file, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| {
                let line: i64 = row.get("line");
                CredentialUrlRecord {
                    file: row.get("file"),
                    url: row.get("url"),
                    line: u32::try_from(line).unwrap_or(0),
                    text: row.get("text"),
                    project_id: row.get("project_id"),
                }
            })
            .collect())
    }

    pub async fn count(&self, table: &str) -> InspectResult<i64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
