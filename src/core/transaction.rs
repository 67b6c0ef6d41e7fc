//! Transactions pinned to a single pooled connection
//!
//! With a connection pool, transaction state lives on one physical connection, so a
//! transaction handle owns its lease until it is committed or rolled back.
//!
//! # Example
//!
//! ```ignore
//! let mut tx = db.begin().await?;
//! match work(tx.as_mut()).await {
//!     Ok(value) => {
//!         tx.commit().await?;
//!         Ok(value)
//!     }
//!     Err(e) => {
//!         tx.rollback().await?;
//!         Err(e)
//!     }
//! }
//! ```
//!
//! A handle dropped while still open detaches its connection from the pool instead of
//! returning it, so the server aborts the transaction when the connection closes and no
//! later lease can observe the half-finished state.

use super::error::{DatabaseError, Result};
use super::query_builder::Statement;
use super::value::{DatabaseResult, DatabaseValue};
use async_trait::async_trait;

/// An open transaction on a leased connection
#[async_trait]
pub trait Transaction: Send {
    /// Execute a parameterized statement inside the transaction and return its rows
    async fn query_with_params(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult>;

    /// Execute a parameterized statement inside the transaction and return affected rows
    async fn execute_with_params(&mut self, query: &str, params: &[DatabaseValue])
        -> Result<u64>;

    /// Commit and return the connection to the pool
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is already finalized or COMMIT fails
    async fn commit(&mut self) -> Result<()>;

    /// Roll back and return the connection to the pool
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is already finalized or ROLLBACK fails
    async fn rollback(&mut self) -> Result<()>;

    /// Whether commit or rollback has completed
    fn is_finished(&self) -> bool;

    /// Run a built statement and return its rows
    async fn query_statement(&mut self, statement: &Statement) -> Result<DatabaseResult> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "tx query");
        self.query_with_params(&statement.sql, &statement.params)
            .await
    }

    /// Run a built statement and return the number of affected rows
    async fn execute_statement(&mut self, statement: &Statement) -> Result<u64> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "tx execute");
        self.execute_with_params(&statement.sql, &statement.params)
            .await
    }
}

/// Commit/rollback bookkeeping shared by the backend transaction types
#[derive(Debug, Default)]
pub(crate) struct TransactionState {
    committed: bool,
    rolled_back: bool,
}

impl TransactionState {
    /// Fail if the transaction can no longer run statements
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.committed {
            return Err(DatabaseError::transaction(
                "Cannot execute on committed transaction",
            ));
        }
        if self.rolled_back {
            return Err(DatabaseError::transaction(
                "Cannot execute on rolled back transaction",
            ));
        }
        Ok(())
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed = true;
    }

    pub(crate) fn mark_rolled_back(&mut self) {
        self.rolled_back = true;
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.committed || self.rolled_back
    }
}
