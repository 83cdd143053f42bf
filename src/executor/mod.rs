//! Query Executor
//!
//! Runs reads, inserts, batches and maintenance against pooled SQLite
//! connections. Each operation borrows one connection and returns it on
//! every exit path.

mod row;

use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::{PoolResult, Result};
use crate::pool::{PoolStatus, SqlitePool};

pub use row::{Row, SqlParams};

/// Maintenance commands run by [`QueryExecutor::optimize`], in order.
pub const DEFAULT_MAINTENANCE: &[&str] = &[
    "PRAGMA optimize",
    "ANALYZE",
    "VACUUM",
    "PRAGMA wal_checkpoint(TRUNCATE)",
];

// == Maintenance Report ==
/// Outcome of a best-effort maintenance run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Commands that ran successfully
    pub completed: Vec<String>,
    /// Commands that failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl MaintenanceReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

// == Query Executor ==
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: SqlitePool,
}

impl QueryExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(SqlitePool::from_config(config))
    }

    /// Opens the pool's connections ahead of the first query.
    pub async fn initialize(&self) -> PoolResult<()> {
        self.pool.initialize().await?;
        info!(path = %self.pool.factory().path().display(), "Query executor ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Runs `op` on a pooled connection on the blocking thread pool.
    ///
    /// The connection guard moves into the worker, so it is returned when
    /// `op` finishes even if the caller stopped waiting.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let mut conn = self.pool.acquire().await?;
        let value = tokio::task::spawn_blocking(move || op(&mut *conn)).await??;
        Ok(value)
    }

    // == Execute Query ==
    /// Runs a read and returns every row as a `column -> value` map.
    pub async fn execute_query(
        &self,
        sql: impl Into<String>,
        params: SqlParams,
    ) -> Result<Vec<Row>> {
        let sql = sql.into();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                row::map_row(row, &columns)
            })?;
            rows.collect()
        })
        .await
    }

    // == Execute Insert ==
    /// Runs a write and returns the generated row id.
    pub async fn execute_insert(&self, sql: impl Into<String>, params: SqlParams) -> Result<i64> {
        let sql = sql.into();
        self.run(move |conn| {
            conn.execute(&sql, params_from_iter(params.iter()))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    // == Execute Batch ==
    /// Runs `sql` once per parameter set inside one transaction.
    ///
    /// The first failing set aborts the call; the transaction is then rolled
    /// back by SQLite. Returns the total number of rows changed.
    pub async fn execute_batch(
        &self,
        sql: impl Into<String>,
        param_sets: Vec<SqlParams>,
    ) -> Result<usize> {
        let sql = sql.into();
        let sets = param_sets.len();
        let changed = self
            .run(move |conn| {
                let tx = conn.transaction()?;
                let mut changed = 0;
                {
                    let mut stmt = tx.prepare(&sql)?;
                    for params in &param_sets {
                        changed += stmt.execute(params_from_iter(params.iter()))?;
                    }
                }
                tx.commit()?;
                Ok(changed)
            })
            .await?;

        debug!(sets, changed, "Batch committed");
        Ok(changed)
    }

    // == Optimize ==
    /// Runs [`DEFAULT_MAINTENANCE`]. Never fails; see [`run_maintenance`](Self::run_maintenance).
    pub async fn optimize(&self) -> MaintenanceReport {
        self.run_maintenance(DEFAULT_MAINTENANCE).await
    }

    /// Runs each command in order on one connection.
    ///
    /// A failing command is logged and skipped. If no connection can be
    /// obtained, every command is reported as failed.
    pub async fn run_maintenance<S: AsRef<str>>(&self, commands: &[S]) -> MaintenanceReport {
        let commands: Vec<String> = commands.iter().map(|c| c.as_ref().to_string()).collect();
        let pending = commands.clone();

        let outcome = self
            .run(move |conn| {
                let mut report = MaintenanceReport::default();
                for command in pending {
                    match conn.execute_batch(&command) {
                        Ok(()) => report.completed.push(command),
                        Err(e) => {
                            warn!(%command, error = %e, "Maintenance command failed, skipping");
                            report.failed.push((command, e.to_string()));
                        }
                    }
                }
                Ok(report)
            })
            .await;

        match outcome {
            Ok(report) => {
                info!(
                    completed = report.completed.len(),
                    failed = report.failed.len(),
                    "Maintenance finished"
                );
                report
            }
            Err(e) => {
                warn!(error = %e, "Maintenance skipped, no connection");
                let reason = e.to_string();
                MaintenanceReport {
                    completed: Vec::new(),
                    failed: commands.into_iter().map(|c| (c, reason.clone())).collect(),
                }
            }
        }
    }

    // == Close ==
    /// Closes the underlying pool.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;
    use tempfile::TempDir;

    use crate::error::{ExecutorError, PoolError};

    async fn executor(max_connections: usize) -> (QueryExecutor, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = PoolConfig::new(dir.path().join("test.db"), max_connections);
        let executor = QueryExecutor::from_config(&config);
        executor.initialize().await.unwrap();
        executor
            .execute_query(
                "CREATE TABLE wallets (id INTEGER PRIMARY KEY, address TEXT NOT NULL UNIQUE, balance REAL)",
                vec![],
            )
            .await
            .unwrap();
        (executor, dir)
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let (executor, _dir) = executor(2).await;

        let id = executor
            .execute_insert(
                "INSERT INTO wallets (address, balance) VALUES (?1, ?2)",
                vec![Value::from("0xabc".to_string()), Value::from(1.25)],
            )
            .await
            .unwrap();
        assert_eq!(id, 1);

        let rows = executor
            .execute_query(
                "SELECT id, address, balance FROM wallets WHERE address = ?1",
                vec![Value::from("0xabc".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["address"], "0xabc");
        assert_eq!(rows[0]["balance"], 1.25);
        assert_eq!(executor.status().in_use, 0);
    }

    #[tokio::test]
    async fn test_query_error_propagates_and_releases() {
        let (executor, _dir) = executor(1).await;

        let result = executor.execute_query("SELECT * FROM missing_table", vec![]).await;

        assert!(matches!(result, Err(ExecutorError::Sqlite(_))));
        assert_eq!(executor.status().idle, 1);
    }

    #[tokio::test]
    async fn test_batch_inserts_all_sets() {
        let (executor, _dir) = executor(1).await;

        let changed = executor
            .execute_batch(
                "INSERT INTO wallets (address) VALUES (?1)",
                vec![
                    vec![Value::from("a".to_string())],
                    vec![Value::from("b".to_string())],
                    vec![Value::from("c".to_string())],
                ],
            )
            .await
            .unwrap();

        assert_eq!(changed, 3);
        let rows = executor
            .execute_query("SELECT COUNT(*) AS n FROM wallets", vec![])
            .await
            .unwrap();
        assert_eq!(rows[0]["n"], 3);
    }

    #[tokio::test]
    async fn test_batch_failure_releases_connection() {
        let (executor, _dir) = executor(1).await;

        // The second set violates the UNIQUE constraint
        let result = executor
            .execute_batch(
                "INSERT INTO wallets (address) VALUES (?1)",
                vec![
                    vec![Value::from("dup".to_string())],
                    vec![Value::from("dup".to_string())],
                    vec![Value::from("other".to_string())],
                ],
            )
            .await;
        assert!(matches!(result, Err(ExecutorError::Sqlite(_))));

        // The only connection is back in the pool
        let conn = executor.pool().try_acquire().unwrap();
        assert!(conn.is_some());
        drop(conn);

        // Nothing was committed
        let rows = executor
            .execute_query("SELECT COUNT(*) AS n FROM wallets", vec![])
            .await
            .unwrap();
        assert_eq!(rows[0]["n"], 0);
    }

    #[tokio::test]
    async fn test_optimize_runs_default_sequence() {
        let (executor, _dir) = executor(1).await;

        let report = executor.optimize().await;

        assert!(report.is_clean(), "unexpected failures: {:?}", report.failed);
        assert_eq!(report.completed.len(), DEFAULT_MAINTENANCE.len());
    }

    #[tokio::test]
    async fn test_maintenance_skips_invalid_command() {
        let (executor, _dir) = executor(1).await;

        let report = executor
            .run_maintenance(&["ANALYZE", "THIS IS NOT SQL", "PRAGMA optimize"])
            .await;

        assert_eq!(report.completed, vec!["ANALYZE", "PRAGMA optimize"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "THIS IS NOT SQL");
        assert_eq!(executor.status().idle, 1);
    }

    #[tokio::test]
    async fn test_maintenance_after_close_reports_failures() {
        let (executor, _dir) = executor(1).await;
        executor.close();

        let report = executor.optimize().await;

        assert!(report.completed.is_empty());
        assert_eq!(report.failed.len(), DEFAULT_MAINTENANCE.len());
    }

    #[tokio::test]
    async fn test_close_rejects_queries() {
        let (executor, _dir) = executor(2).await;
        executor.close();

        let result = executor.execute_query("SELECT 1", vec![]).await;
        assert!(matches!(result, Err(ExecutorError::Pool(PoolError::Closed))));
        assert!(executor.pool().is_closed());
    }
}
