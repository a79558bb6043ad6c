//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers are not blocked by the writer
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Rate-Limit Atomicity
//!
//! `record_attempt` runs inside `BEGIN IMMEDIATE`, which takes the database
//! write lock before the window is read. Concurrent attempts therefore
//! serialize on the lock (waiting up to the busy timeout) and every caller
//! sees the previous caller's write. The transition itself is the shared
//! [`RateLimitWindow::apply_attempt`].
//!
//! ## Limitations
//!
//! - **Concurrency**: One writer at a time
//! - **Distributed**: Single-machine only

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthLog, HealthStatus, JobRunLog, RateLimitStore, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{HealthCheckRecord, JobRunRow};
use crate::dispatcher::JobRunReport;
use crate::prober::{ProbeCategory, ProbeErrorKind};
use crate::rate_limit::{Action, ActionLimits, AttemptOutcome, RateLimitWindow};

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for WAL mode with a generous busy timeout
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use compliance_sentinel::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./sentinel.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30)); // Retry on lock contention

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!("SQLite connection pool created");

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Helper to convert timestamp to Unix milliseconds for SQLite
    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    /// Helper to convert Unix milliseconds from SQLite to DateTime
    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            StorageError::SerializationError(format!("timestamp out of range: {millis}"))
        })
    }

    fn window_from_row(row: &SqliteRow) -> StorageResult<RateLimitWindow> {
        let action: String = row.try_get("action")?;
        Ok(RateLimitWindow {
            subject: row.try_get("subject")?,
            action: Action::from_str(&action)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?,
            attempt_count: row.try_get::<i64, _>("attempt_count")? as u32,
            window_reset_at: Self::millis_to_timestamp(row.try_get("window_reset_at")?)?,
        })
    }

    fn health_record_from_row(row: &SqliteRow) -> StorageResult<HealthCheckRecord> {
        let category: String = row.try_get("category")?;
        let error_kind: String = row.try_get("error_kind")?;

        Ok(HealthCheckRecord {
            run_id: row.try_get("run_id")?,
            checked_at: Self::millis_to_timestamp(row.try_get("checked_at")?)?,
            url: row.try_get("url")?,
            category: ProbeCategory::from_str(&category)
                .map_err(StorageError::SerializationError)?,
            owner_tag: row.try_get("owner_tag")?,
            title: row.try_get("title")?,
            reachable: row.try_get("reachable")?,
            status_code: row
                .try_get::<Option<i64>, _>("status_code")?
                .map(|code| code as u16),
            latency_ms: row.try_get::<i64, _>("latency_ms")? as u64,
            error_kind: ProbeErrorKind::from_str(&error_kind)
                .map_err(StorageError::SerializationError)?,
            error_message: row.try_get("error_message")?,
        })
    }

    fn job_run_from_row(row: &SqliteRow) -> StorageResult<JobRunRow> {
        Ok(JobRunRow {
            tick_at: Self::millis_to_timestamp(row.try_get("tick_at")?)?,
            report: JobRunReport {
                job_name: row.try_get("job_name")?,
                triggered: row.try_get("triggered")?,
                success: row.try_get("success")?,
                message: row.try_get("message")?,
                duration_ms: row.try_get::<i64, _>("duration_ms")? as u64,
                records_affected: row.try_get::<i64, _>("records_affected")? as u64,
            },
        })
    }

    /// Read-check-write for one key; caller holds the write lock
    async fn record_attempt_locked(
        conn: &mut SqliteConnection,
        subject: &str,
        action: Action,
        limits: &ActionLimits,
        now: DateTime<Utc>,
    ) -> StorageResult<AttemptOutcome> {
        let existing = sqlx::query(
            r#"
            SELECT subject, action, attempt_count, window_reset_at
            FROM rate_limit_windows
            WHERE subject = ? AND action = ?
            "#,
        )
        .bind(subject)
        .bind(action.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| Self::window_from_row(&row))
        .transpose()?;

        let outcome =
            RateLimitWindow::apply_attempt(existing.as_ref(), subject, action, limits, now);

        if let AttemptOutcome::Rejected(_) = outcome {
            return Ok(outcome);
        }

        let window = outcome.window();
        sqlx::query(
            r#"
            INSERT INTO rate_limit_windows (subject, action, attempt_count, window_reset_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (subject, action) DO UPDATE SET
                attempt_count = excluded.attempt_count,
                window_reset_at = excluded.window_reset_at
            "#,
        )
        .bind(&window.subject)
        .bind(window.action.as_str())
        .bind(window.attempt_count as i64)
        .bind(Self::timestamp_to_millis(&window.window_reset_at))
        .execute(&mut *conn)
        .await?;

        Ok(outcome)
    }
}

#[async_trait]
impl RateLimitStore for SqliteBackend {
    #[instrument(skip(self, limits), fields(action = %action))]
    async fn record_attempt(
        &self,
        subject: &str,
        action: Action,
        limits: &ActionLimits,
        now: DateTime<Utc>,
    ) -> StorageResult<AttemptOutcome> {
        // Take the write lock up front so concurrent read-check-writes serialize.
        // Dropping the transaction unfinished rolls it back.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let outcome = Self::record_attempt_locked(&mut tx, subject, action, limits, now).await?;
        tx.commit().await?;

        Ok(outcome)
    }

    async fn get_window(
        &self,
        subject: &str,
        action: Action,
    ) -> StorageResult<Option<RateLimitWindow>> {
        sqlx::query(
            r#"
            SELECT subject, action, attempt_count, window_reset_at
            FROM rate_limit_windows
            WHERE subject = ? AND action = ?
            "#,
        )
        .bind(subject)
        .bind(action.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(|row| Self::window_from_row(&row))
        .transpose()
    }

    #[instrument(skip(self))]
    async fn clear_subject(&self, subject: &str) -> StorageResult<usize> {
        let result = sqlx::query("DELETE FROM rate_limit_windows WHERE subject = ?")
            .bind(subject)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() as usize;
        info!("cleared {} rate limit windows", deleted);
        Ok(deleted)
    }

    async fn purge_expired_windows(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let result = sqlx::query("DELETE FROM rate_limit_windows WHERE window_reset_at <= ?")
            .bind(Self::timestamp_to_millis(&now))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl HealthLog for SqliteBackend {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn append_health_records(&self, records: Vec<HealthCheckRecord>) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        debug!("inserting {} health records into SQLite", records.len());

        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO health_check_records (
                    run_id, checked_at, url, category, owner_tag, title,
                    reachable, status_code, latency_ms, error_kind, error_message
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.run_id)
            .bind(Self::timestamp_to_millis(&record.checked_at))
            .bind(&record.url)
            .bind(record.category.as_str())
            .bind(&record.owner_tag)
            .bind(&record.title)
            .bind(record.reachable)
            .bind(record.status_code.map(i64::from))
            .bind(record.latency_ms as i64)
            .bind(record.error_kind.as_str())
            .bind(&record.error_message)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!("health record batch insert complete");
        Ok(())
    }

    async fn query_health_run(&self, run_id: &str) -> StorageResult<Vec<HealthCheckRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, checked_at, url, category, owner_tag, title,
                   reachable, status_code, latency_ms, error_kind, error_message
            FROM health_check_records
            WHERE run_id = ?
            ORDER BY owner_tag ASC, url ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::health_record_from_row).collect()
    }

    async fn query_latest_for_url(
        &self,
        url: &str,
        limit: usize,
    ) -> StorageResult<Vec<HealthCheckRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, checked_at, url, category, owner_tag, title,
                   reachable, status_code, latency_ms, error_kind, error_message
            FROM health_check_records
            WHERE url = ?
            ORDER BY checked_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(url)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::health_record_from_row).collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_old_health_records(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        info!("cleaning up health records older than {}", before);

        let result = sqlx::query("DELETE FROM health_check_records WHERE checked_at < ?")
            .bind(Self::timestamp_to_millis(&before))
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() as usize;
        info!("deleted {} old health records", deleted);
        Ok(deleted)
    }
}

#[async_trait]
impl JobRunLog for SqliteBackend {
    async fn append_job_runs(&self, runs: Vec<JobRunRow>) -> StorageResult<()> {
        if runs.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for run in runs {
            sqlx::query(
                r#"
                INSERT INTO job_runs (
                    tick_at, job_name, triggered, success, message, duration_ms, records_affected
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Self::timestamp_to_millis(&run.tick_at))
            .bind(&run.report.job_name)
            .bind(run.report.triggered)
            .bind(run.report.success)
            .bind(&run.report.message)
            .bind(run.report.duration_ms as i64)
            .bind(run.report.records_affected as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query_recent_job_runs(&self, limit: usize) -> StorageResult<Vec<JobRunRow>> {
        let rows = sqlx::query(
            r#"
            SELECT tick_at, job_name, triggered, success, message, duration_ms, records_affected
            FROM job_runs
            ORDER BY tick_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::job_run_from_row).collect()
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        // Simple ping query to verify connection
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (windows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rate_limit_windows")
            .fetch_one(&self.pool)
            .await?;

        let (records,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM health_check_records")
            .fetch_one(&self.pool)
            .await?;

        let (job_runs,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM job_runs")
            .fetch_one(&self.pool)
            .await?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        let file_size_mb = file_size as f64 / 1_000_000.0;

        Ok(format!(
            "SQLite: {} rate limit windows, {} health records, {} job runs, {:.2} MB on disk",
            windows, records, job_runs, file_size_mb
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
