use tracing::{debug, info, warn};

use super::BackingStore;
use crate::error::{GraphError, Result};

/// Identifier handed out by a store when a transaction begins.
pub type TxId = u64;

/// Where a [`Transaction`] guard stands. A guard leaves `Active` exactly
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Entity writes and bindings go to this transaction.
    Active,
    /// `commit()` went through.
    Committed,
    /// Rolled back explicitly or when the guard was dropped.
    RolledBack,
}

/// Caller-side guard over a store transaction.
///
/// Every field write, binding and relationship change made while the guard
/// is active belongs to the transaction. Either `commit()` makes them
/// permanent or `rollback()` discards them, index updates included.
///
/// # Important
///
/// A guard dropped while still active rolls the transaction back.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use umbra::{GraphContext, MappingConfig, MemoryGraph};
///
/// let ctx = GraphContext::new(Arc::new(MemoryGraph::new()), MappingConfig::default());
/// let tx = ctx.begin_transaction()?;
/// assert!(ctx.in_transaction());
/// tx.commit()?;
/// # Ok::<(), umbra::GraphError>(())
/// ```
pub struct Transaction<'s> {
    store: &'s dyn BackingStore,
    id: TxId,
    state: TxState,
}

impl<'s> Transaction<'s> {
    pub(crate) fn begin(store: &'s dyn BackingStore) -> Result<Self> {
        let id = store.begin_transaction()?;
        debug!(tx_id = id, "Transaction started");
        Ok(Self {
            store,
            id,
            state: TxState::Active,
        })
    }

    /// Returns the unique identifier for this transaction.
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Returns the current state of the transaction.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Commits the transaction, making all changes permanent.
    pub fn commit(mut self) -> Result<()> {
        self.ensure_active()?;
        let start = std::time::Instant::now();
        match self.store.commit_transaction(self.id) {
            Ok(()) => {
                self.state = TxState::Committed;
                info!(
                    tx_id = self.id,
                    duration_us = start.elapsed().as_micros() as u64,
                    "Transaction committed"
                );
                Ok(())
            }
            Err(err) => {
                let _ = self.store.rollback_transaction(self.id);
                self.state = TxState::RolledBack;
                Err(err)
            }
        }
    }

    /// Rolls back the transaction, discarding all changes.
    pub fn rollback(mut self) -> Result<()> {
        self.ensure_active()?;
        let result = self.store.rollback_transaction(self.id);
        self.state = TxState::RolledBack;
        warn!(tx_id = self.id, "Transaction rolled back");
        result
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state != TxState::Active {
            return Err(GraphError::InvalidArgument(
                "transaction is no longer active".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            let _ = self.store.rollback_transaction(self.id);
            self.state = TxState::RolledBack;
            warn!(tx_id = self.id, "Transaction dropped without commit; rolled back");
        }
    }
}
