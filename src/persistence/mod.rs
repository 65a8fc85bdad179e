//! Persistence layer: the storage collaborator behind the gateway.
//!
//! [`Storage`] is the port the transaction context and gateway talk to.
//! Every write is scoped to a [`TxHandle`]; the engine decides what is
//! visible to whom and when writes become durable. [`memory::MemoryStore`]
//! is the bundled engine.

pub mod memory;
pub mod models;

use std::fmt;

use serde::Serialize;

use crate::domain::{Entity, EntityKind, RecordId};

pub use memory::MemoryStore;
pub use models::{Criteria, WriteRecord};

/// Opaque token naming one unit of storage work.
///
/// Handles are issued by [`Storage::begin_tx`] and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TxHandle(u64);

impl TxHandle {
    /// Wraps a raw handle number. Only storage engines should need this.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Failures raised by a storage engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The handle was never issued or is already closed.
    #[error("unknown or closed transaction {0}")]
    UnknownTransaction(TxHandle),

    /// A handle cannot be committed while a child handle is still open.
    #[error("transaction {0} still has open child transactions")]
    OpenChildren(TxHandle),

    /// The row targeted by an update does not exist.
    #[error("{kind} {id} does not exist")]
    RecordNotFound {
        /// Kind of the missing row.
        kind: EntityKind,
        /// Identity of the missing row.
        id: RecordId,
    },

    /// The engine itself failed.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Transaction-scoped storage port.
///
/// Implementations must keep writes made under a handle invisible to
/// other root handles until the root commits, fold a committed child's
/// writes into its parent, and discard everything written under a
/// rolled-back handle including its open descendants.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Opens a unit of work, nested under `parent` when given.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownTransaction`] if `parent` is not open.
    fn begin_tx(&self, parent: Option<TxHandle>) -> Result<TxHandle, StorageError>;

    /// Closes `tx` successfully. A nested handle releases its writes to its
    /// parent; a root handle makes them durable.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownTransaction`] if `tx` is not open, or
    /// [`StorageError::OpenChildren`] if a child of `tx` is still open.
    fn commit_tx(&self, tx: TxHandle) -> Result<(), StorageError>;

    /// Discards every write made under `tx` and its open descendants.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownTransaction`] if `tx` is not open.
    fn rollback_tx(&self, tx: TxHandle) -> Result<(), StorageError>;

    /// Inserts or updates one row under `tx`, returning the stored entity.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownTransaction`] if `tx` is not open, or
    /// [`StorageError::RecordNotFound`] when updating a missing row.
    fn write(&self, record: WriteRecord, tx: TxHandle) -> Result<Entity, StorageError>;

    /// Returns the rows matching `criteria` as seen from `tx`, or the
    /// committed rows when `tx` is `None`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownTransaction`] if `tx` is not open.
    fn query(&self, criteria: &Criteria, tx: Option<TxHandle>) -> Result<Vec<Entity>, StorageError>;

    /// Deletes the rows matching `criteria` under `tx`, returning them.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownTransaction`] if `tx` is not open.
    fn delete(&self, criteria: &Criteria, tx: TxHandle) -> Result<Vec<Entity>, StorageError>;

    /// Counts the rows matching `criteria` as seen from `tx`.
    ///
    /// # Errors
    ///
    /// Propagates any [`Storage::query`] failure.
    fn count(&self, criteria: &Criteria, tx: Option<TxHandle>) -> Result<usize, StorageError> {
        Ok(self.query(criteria, tx)?.len())
    }
}
