//! Transaction context: nested units of work over a [`Storage`] engine.
//!
//! A [`TransactionContext`] belongs to one logical call. It tracks the
//! state of every handle it opened and keeps the open ones on a stack;
//! the top of the stack is the ambient handle that storage access,
//! the gateway, and handlers write through.
//!
//! ```text
//! Active ──commit──▶ Committed
//!   │
//!   ├──mark_rollback_only──▶ MarkedForRollback ──rollback──▶ RolledBack
//!   │
//!   └──rollback──────────────────────────────────────────▶ RolledBack
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::Entity;
use crate::error::{SignalsError, TransactionError};
use crate::persistence::{Criteria, Storage, TxHandle, WriteRecord};

/// Lifecycle state of a transaction handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    /// Open and healthy.
    Active,
    /// Open, but can only end in a rollback.
    MarkedForRollback,
    /// Closed successfully.
    Committed,
    /// Closed with every write discarded.
    RolledBack,
}

impl TxState {
    /// Returns `true` for `Active` and `MarkedForRollback`.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::MarkedForRollback)
    }
}

#[derive(Debug)]
struct TxNode {
    parent: Option<TxHandle>,
    state: TxState,
}

/// Per-call tree of transaction handles with an ambient stack.
///
/// Dropping a context that still has open handles rolls them back, so an
/// early return or an unwinding panic never leaves writes pending.
#[derive(Debug)]
pub struct TransactionContext {
    storage: Arc<dyn Storage>,
    nodes: HashMap<TxHandle, TxNode>,
    stack: Vec<TxHandle>,
}

impl TransactionContext {
    /// Creates a context with no open handles.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            nodes: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// The storage engine this context routes writes to.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// The innermost open handle, if any.
    #[must_use]
    pub fn ambient(&self) -> Option<TxHandle> {
        self.stack.last().copied()
    }

    /// Number of open handles.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// State of a handle opened by this context.
    #[must_use]
    pub fn state(&self, handle: TxHandle) -> Option<TxState> {
        self.nodes.get(&handle).map(|node| node.state)
    }

    /// Returns `true` if `handle` or any ancestor is marked rollback-only.
    #[must_use]
    pub fn is_rollback_only(&self, handle: TxHandle) -> bool {
        let mut cursor = Some(handle);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(&current) else {
                return false;
            };
            if node.state == TxState::MarkedForRollback {
                return true;
            }
            cursor = node.parent;
        }
        false
    }

    /// Opens a handle nested under the ambient one (or a root).
    ///
    /// A child of a rollback-marked handle starts out marked.
    ///
    /// # Errors
    ///
    /// Returns [`SignalsError::Storage`] if the engine refuses the handle.
    pub fn begin(&mut self) -> Result<TxHandle, SignalsError> {
        let parent = self.ambient();
        let handle = self.storage.begin_tx(parent)?;
        let state = if parent.is_some_and(|p| self.is_rollback_only(p)) {
            TxState::MarkedForRollback
        } else {
            TxState::Active
        };
        self.nodes.insert(handle, TxNode { parent, state });
        self.stack.push(handle);
        tracing::debug!(tx = %handle, depth = self.stack.len(), "transaction begun");
        Ok(handle)
    }

    /// Commits `handle`. A nested handle releases its writes to its
    /// parent; a root makes them durable.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError`] if `handle` is closed, unknown, not the
    /// innermost open handle, or rollback-marked (itself or an ancestor).
    /// Returns [`SignalsError::Storage`] if the engine fails; the handle is
    /// then marked rollback-only.
    pub fn commit(&mut self, handle: TxHandle) -> Result<(), SignalsError> {
        match self.checked_state(handle)? {
            TxState::Active if self.is_rollback_only(handle) => {
                return Err(TransactionError::RollbackOnly(handle).into());
            }
            TxState::Active => {}
            TxState::MarkedForRollback => {
                return Err(TransactionError::RollbackOnly(handle).into());
            }
            TxState::Committed => return Err(TransactionError::AlreadyCommitted(handle).into()),
            TxState::RolledBack => return Err(TransactionError::AlreadyRolledBack(handle).into()),
        }
        if self.ambient() != Some(handle) {
            return Err(TransactionError::NotInnermost(handle).into());
        }
        if let Err(err) = self.storage.commit_tx(handle) {
            self.mark(handle);
            return Err(err.into());
        }
        self.stack.pop();
        let parent = self.set_state(handle, TxState::Committed);
        match parent {
            Some(parent) => tracing::debug!(tx = %handle, %parent, "savepoint released"),
            None => tracing::info!(tx = %handle, "transaction committed"),
        }
        Ok(())
    }

    /// Rolls back `handle` and every open descendant, discarding all of
    /// their writes.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError`] if `handle` is unknown or already
    /// closed. Returns [`SignalsError::Storage`] if the engine fails; the
    /// handles are closed locally regardless.
    pub fn rollback(&mut self, handle: TxHandle) -> Result<(), SignalsError> {
        match self.checked_state(handle)? {
            TxState::Committed => return Err(TransactionError::AlreadyCommitted(handle).into()),
            TxState::RolledBack => return Err(TransactionError::AlreadyRolledBack(handle).into()),
            TxState::Active | TxState::MarkedForRollback => {}
        }
        let result = self.storage.rollback_tx(handle);
        self.close_from(handle);
        tracing::info!(tx = %handle, "transaction rolled back");
        result.map_err(SignalsError::from)
    }

    /// Marks `handle` and all of its ancestors rollback-only.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError`] if `handle` is unknown or already
    /// closed.
    pub fn mark_rollback_only(&mut self, handle: TxHandle) -> Result<(), SignalsError> {
        match self.checked_state(handle)? {
            TxState::Committed => Err(TransactionError::AlreadyCommitted(handle).into()),
            TxState::RolledBack => Err(TransactionError::AlreadyRolledBack(handle).into()),
            TxState::Active | TxState::MarkedForRollback => {
                self.mark(handle);
                Ok(())
            }
        }
    }

    /// Runs `work` inside a new handle: commits if it returns `Ok`, rolls
    /// back if it returns `Err`.
    ///
    /// If the commit itself is refused (for example because a failure
    /// inside `work` marked the handle rollback-only and `work` swallowed
    /// it), the handle is rolled back and the commit error is returned.
    /// A handle that `work` closed itself is reported as
    /// [`TransactionError::AlreadyCommitted`] or
    /// [`TransactionError::AlreadyRolledBack`].
    ///
    /// # Errors
    ///
    /// Returns the error of `work`, or the begin/commit failure converted
    /// into `E`.
    pub fn atomic<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<SignalsError>,
    {
        let handle = self.begin().map_err(E::from)?;
        match work(self) {
            Ok(value) => {
                if let Some(closed) = self.closed_error(handle) {
                    tracing::error!(tx = %handle, error = %closed, "work closed its own handle");
                    return Err(E::from(SignalsError::from(closed)));
                }
                match self.commit(handle) {
                    Ok(()) => Ok(value),
                    Err(err) => {
                        self.release(handle);
                        Err(E::from(err))
                    }
                }
            }
            Err(err) => {
                if let Some(closed) = self.closed_error(handle) {
                    tracing::error!(tx = %handle, error = %closed, "work closed its own handle");
                }
                self.release(handle);
                Err(err)
            }
        }
    }

    /// Fails unless `handle` is open and is the ambient handle.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::AlreadyCommitted`] or
    /// [`TransactionError::AlreadyRolledBack`] if `handle` was closed,
    /// [`TransactionError::NotInnermost`] if a nested handle is still open
    /// above it, or [`TransactionError::UnknownHandle`].
    pub fn expect_ambient(&self, handle: TxHandle) -> Result<(), TransactionError> {
        self.checked_state(handle)?;
        if let Some(closed) = self.closed_error(handle) {
            return Err(closed);
        }
        if self.ambient() != Some(handle) {
            return Err(TransactionError::NotInnermost(handle));
        }
        Ok(())
    }

    /// Writes one row through the ambient handle, or through an implicit
    /// single-statement transaction when none is open.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::RollbackOnly`] if the ambient handle is
    /// marked, or [`SignalsError::Storage`] if the engine fails.
    pub fn write(&mut self, record: WriteRecord) -> Result<Entity, SignalsError> {
        match self.usable_ambient()? {
            Some(handle) => Ok(self.storage.write(record, handle)?),
            None => self.atomic(|ctx| ctx.write(record)),
        }
    }

    /// Deletes matching rows through the ambient handle, or through an
    /// implicit single-statement transaction when none is open.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::RollbackOnly`] if the ambient handle is
    /// marked, or [`SignalsError::Storage`] if the engine fails.
    pub fn delete(&mut self, criteria: &Criteria) -> Result<Vec<Entity>, SignalsError> {
        match self.usable_ambient()? {
            Some(handle) => Ok(self.storage.delete(criteria, handle)?),
            None => self.atomic(|ctx| ctx.delete(criteria)),
        }
    }

    /// Reads matching rows as seen by the ambient handle, or committed
    /// rows when none is open.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::RollbackOnly`] if the ambient handle is
    /// marked, or [`SignalsError::Storage`] if the engine fails.
    pub fn query(&self, criteria: &Criteria) -> Result<Vec<Entity>, SignalsError> {
        let handle = self.usable_ambient()?;
        Ok(self.storage.query(criteria, handle)?)
    }

    /// Counts matching rows; see [`TransactionContext::query`].
    ///
    /// # Errors
    ///
    /// Same as [`TransactionContext::query`].
    pub fn count(&self, criteria: &Criteria) -> Result<usize, SignalsError> {
        let handle = self.usable_ambient()?;
        Ok(self.storage.count(criteria, handle)?)
    }

    fn usable_ambient(&self) -> Result<Option<TxHandle>, SignalsError> {
        match self.ambient() {
            Some(handle) if self.is_rollback_only(handle) => {
                Err(TransactionError::RollbackOnly(handle).into())
            }
            other => Ok(other),
        }
    }

    fn closed_error(&self, handle: TxHandle) -> Option<TransactionError> {
        match self.state(handle)? {
            TxState::Committed => Some(TransactionError::AlreadyCommitted(handle)),
            TxState::RolledBack => Some(TransactionError::AlreadyRolledBack(handle)),
            TxState::Active | TxState::MarkedForRollback => None,
        }
    }

    fn checked_state(&self, handle: TxHandle) -> Result<TxState, TransactionError> {
        self.state(handle)
            .ok_or(TransactionError::UnknownHandle(handle))
    }

    /// Sets the state of `handle`, returning its parent.
    fn set_state(&mut self, handle: TxHandle, state: TxState) -> Option<TxHandle> {
        self.nodes.get_mut(&handle).and_then(|node| {
            node.state = state;
            node.parent
        })
    }

    fn mark(&mut self, handle: TxHandle) {
        let mut cursor = Some(handle);
        while let Some(current) = cursor {
            cursor = match self.nodes.get_mut(&current) {
                Some(node) if node.state.is_open() => {
                    node.state = TxState::MarkedForRollback;
                    node.parent
                }
                _ => None,
            };
        }
        tracing::warn!(tx = %handle, "transaction marked rollback-only");
    }

    /// Pops `handle` and everything above it off the stack as rolled back.
    fn close_from(&mut self, handle: TxHandle) {
        let Some(position) = self.stack.iter().position(|h| *h == handle) else {
            self.set_state(handle, TxState::RolledBack);
            return;
        };
        for closed in self.stack.split_off(position) {
            self.set_state(closed, TxState::RolledBack);
        }
    }

    fn release(&mut self, handle: TxHandle) {
        if !self.state(handle).is_some_and(TxState::is_open) {
            return;
        }
        if let Err(err) = self.rollback(handle) {
            tracing::error!(tx = %handle, error = %err, "rollback after failure did not complete");
        }
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        let Some(&root) = self.stack.first() else {
            return;
        };
        tracing::warn!(
            tx = %root,
            open = self.stack.len(),
            "transaction context dropped with open transactions; rolling back"
        );
        if let Err(err) = self.storage.rollback_tx(root) {
            tracing::error!(tx = %root, error = %err, "rollback on drop failed");
        }
        self.close_from(root);
    }
}
