//! Query Executor - the two entry points every statement flows through
//!
//! [`select`] reads rows, [`execute`] writes. Both acquire one pooled
//! connection for the duration of the call, translate the `?` placeholders
//! for the connected backend, bind `args` positionally and release the
//! connection when they return, fail, or are cancelled.

use futures_util::TryStreamExt;
use sqlx::{AnyConnection, Connection};
use tracing::{debug, error, warn};

use crate::backends::any::{any_row_to_row, build_query};
use crate::backends::{DatabaseValue, Row};
use crate::database::ConnectionPool;
use crate::error::{ModelError, ModelResult, OrmResult};

/// Run a read query and return its rows in order.
///
/// With `limit` set to a positive count, at most that many rows are fetched
/// and the rest of the result is discarded without being decoded.
pub async fn select(
    pool: &ConnectionPool,
    sql: &str,
    args: &[DatabaseValue],
    limit: Option<usize>,
) -> ModelResult<Vec<Row>> {
    debug!("{} (args: {})", sql, args.len());
    let sql = pool.dialect().translate(sql);
    let mut conn = pool.acquire().await?;
    let rows = fetch_rows(&mut conn, &sql, args, limit).await?;
    debug!("select return size: {}", rows.len());
    Ok(rows)
}

/// Fetch rows for already-translated SQL on one connection
pub(crate) async fn fetch_rows(
    conn: &mut AnyConnection,
    sql: &str,
    args: &[DatabaseValue],
    limit: Option<usize>,
) -> ModelResult<Vec<Row>> {
    let query = build_query(sql, args);
    match limit.filter(|limit| *limit > 0) {
        Some(limit) => {
            let mut stream = query.fetch(conn);
            let mut rows = Vec::with_capacity(limit);
            while rows.len() < limit {
                match stream.try_next().await? {
                    Some(row) => rows.push(any_row_to_row(&row)?),
                    None => break,
                }
            }
            Ok(rows)
        }
        None => query
            .fetch_all(conn)
            .await?
            .iter()
            .map(any_row_to_row)
            .collect::<OrmResult<Vec<_>>>(),
    }
}

/// Run already-translated SQL on one connection, returning affected rows
pub(crate) async fn run_statement(
    conn: &mut AnyConnection,
    sql: &str,
    args: &[DatabaseValue],
) -> ModelResult<u64> {
    let result = build_query(sql, args).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Run a write statement and return the affected-row count.
///
/// With `autocommit` false the statement runs inside an explicit
/// transaction on the acquired connection: committed on success, rolled
/// back before the error is returned on failure. If the future is dropped
/// mid-statement, the open transaction is rolled back before the connection
/// goes back to the pool.
pub async fn execute(
    pool: &ConnectionPool,
    sql: &str,
    args: &[DatabaseValue],
    autocommit: bool,
) -> ModelResult<u64> {
    debug!("{} (args: {}, autocommit: {})", sql, args.len(), autocommit);
    let sql = pool.dialect().translate(sql);
    let mut conn = pool.acquire().await?;

    if autocommit {
        return run_statement(&mut conn, &sql, args).await;
    }

    let mut tx = conn
        .begin()
        .await
        .map_err(|e| ModelError::Transaction(format!("Failed to begin transaction: {}", e)))?;

    match run_statement(&mut tx, &sql, args).await {
        Ok(affected) => {
            tx.commit()
                .await
                .map_err(|e| ModelError::Transaction(format!("Failed to commit transaction: {}", e)))?;
            Ok(affected)
        }
        Err(e) => {
            warn!("Statement failed inside transaction, rolling back: {}", e);
            if let Err(rollback_error) = tx.rollback().await {
                error!("Failed to rollback transaction: {}", rollback_error);
            }
            Err(e)
        }
    }
}
