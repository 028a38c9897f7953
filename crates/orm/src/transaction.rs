//! Transaction Management
//!
//! [`Transaction`] pins one pooled connection for several statements and
//! either commits them together or rolls them all back. A transaction that
//! is dropped without `commit` or `rollback` is rolled back when its
//! connection returns to the pool.

use futures_util::future::BoxFuture;
use sqlx::{Any, Transaction as SqlxTransaction};
use tracing::{debug, warn};

use crate::backends::{DatabaseValue, Row, SqlDialect};
use crate::database::{ConnectionPool, PoolError};
use crate::error::{ModelError, ModelResult};
use crate::executor::{fetch_rows, run_statement};

/// Multi-statement transaction bound to one pooled connection
pub struct Transaction {
    inner: Option<SqlxTransaction<'static, Any>>,
    dialect: SqlDialect,
    committed: bool,
}

impl Transaction {
    /// Acquire a connection from `pool` and begin a transaction on it
    pub async fn begin(pool: &ConnectionPool) -> ModelResult<Transaction> {
        debug!("Beginning transaction");
        let tx = pool.begin().await.map_err(|e| match e {
            PoolError::NotReady => ModelError::PoolNotReady,
            other => ModelError::Transaction(format!("Failed to begin transaction: {}", other)),
        })?;

        Ok(Transaction {
            inner: Some(tx),
            dialect: pool.dialect(),
            committed: false,
        })
    }

    fn active(&mut self) -> ModelResult<&mut SqlxTransaction<'static, Any>> {
        self.inner
            .as_mut()
            .ok_or_else(|| ModelError::Transaction("Transaction has already been consumed".to_string()))
    }

    /// Run a read query inside the transaction
    pub async fn select(
        &mut self,
        sql: &str,
        args: &[DatabaseValue],
        limit: Option<usize>,
    ) -> ModelResult<Vec<Row>> {
        debug!("{} (args: {}, in transaction)", sql, args.len());
        let sql = self.dialect.translate(sql).into_owned();
        let tx = self.active()?;
        fetch_rows(tx, &sql, args, limit).await
    }

    /// Run a write statement inside the transaction; nothing is visible to
    /// other connections until [`Transaction::commit`]
    pub async fn execute(&mut self, sql: &str, args: &[DatabaseValue]) -> ModelResult<u64> {
        debug!("{} (args: {}, in transaction)", sql, args.len());
        let sql = self.dialect.translate(sql).into_owned();
        let tx = self.active()?;
        run_statement(tx, &sql, args).await
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> ModelResult<()> {
        if let Some(tx) = self.inner.take() {
            debug!("Committing transaction");
            tx.commit()
                .await
                .map_err(|e| ModelError::Transaction(format!("Failed to commit transaction: {}", e)))?;
            self.committed = true;
            debug!("Transaction committed successfully");
            Ok(())
        } else {
            Err(ModelError::Transaction("Transaction has already been consumed".to_string()))
        }
    }

    /// Rollback the transaction
    pub async fn rollback(mut self) -> ModelResult<()> {
        if let Some(tx) = self.inner.take() {
            debug!("Rolling back transaction");
            tx.rollback()
                .await
                .map_err(|e| ModelError::Transaction(format!("Failed to rollback transaction: {}", e)))?;
            debug!("Transaction rolled back successfully");
            Ok(())
        } else {
            Err(ModelError::Transaction("Transaction has already been consumed".to_string()))
        }
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Still open: neither committed nor rolled back
    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("dialect", &self.dialect)
            .field("active", &self.is_active())
            .field("committed", &self.committed)
            .finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.inner.take().is_some() && !self.committed {
            // sqlx queues the rollback when its transaction is dropped
            warn!("Transaction dropped without explicit commit or rollback, rolling back");
        }
    }
}

/// Run `f` inside a transaction: commit if it returns `Ok`, roll back and
/// return its error otherwise. Failures are not retried.
///
/// ```rust,ignore
/// let moved = with_transaction(&pool, |tx| Box::pin(async move {
///     tx.execute("UPDATE `t_users` SET `admin`=? WHERE `id`=?", &[true.into(), id.into()]).await
/// })).await?;
/// ```
pub async fn with_transaction<F, R>(pool: &ConnectionPool, f: F) -> ModelResult<R>
where
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, ModelResult<R>>,
{
    let mut tx = Transaction::begin(pool).await?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await?;
            Ok(result)
        }
        Err(e) => {
            warn!("Transaction body failed, rolling back: {}", e);
            if let Err(rollback_error) = tx.rollback().await {
                warn!("Rollback after failure did not complete: {}", rollback_error);
            }
            Err(e)
        }
    }
}
