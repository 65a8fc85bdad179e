//! In-memory transactional storage engine.
//!
//! Committed rows live in per-kind tables. Each open handle owns an
//! ordered write log; a read through a handle replays the logs of the
//! handle's ancestors (root first) and then its own over the committed
//! table. Committing a nested handle appends its log to the parent's,
//! committing a root applies the log to the tables under one lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

use super::models::{Criteria, WriteRecord};
use super::{Storage, StorageError, TxHandle};
use crate::domain::{Entity, EntityKind, RecordId};

#[derive(Debug, Clone)]
enum WriteOp {
    Put(Entity),
    Remove(EntityKind, RecordId),
}

#[derive(Debug)]
struct OpenTx {
    parent: Option<TxHandle>,
    log: Vec<WriteOp>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<EntityKind, BTreeMap<RecordId, Entity>>,
    open: HashMap<TxHandle, OpenTx>,
}

impl Inner {
    /// Handles from the root down to `tx`.
    fn lineage(&self, tx: TxHandle) -> Result<Vec<TxHandle>, StorageError> {
        let mut chain = Vec::new();
        let mut cursor = Some(tx);
        while let Some(handle) = cursor {
            let open = self
                .open
                .get(&handle)
                .ok_or(StorageError::UnknownTransaction(handle))?;
            chain.push(handle);
            cursor = open.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    fn view(
        &self,
        kind: &EntityKind,
        tx: Option<TxHandle>,
    ) -> Result<BTreeMap<RecordId, Entity>, StorageError> {
        let mut rows = self.tables.get(kind).cloned().unwrap_or_default();
        let Some(tx) = tx else {
            return Ok(rows);
        };
        for handle in self.lineage(tx)? {
            let Some(open) = self.open.get(&handle) else {
                continue;
            };
            for op in &open.log {
                match op {
                    WriteOp::Put(entity) if &entity.kind == kind => {
                        rows.insert(entity.id, entity.clone());
                    }
                    WriteOp::Remove(k, id) if k == kind => {
                        rows.remove(id);
                    }
                    _ => {}
                }
            }
        }
        Ok(rows)
    }

    fn log_mut(&mut self, tx: TxHandle) -> Result<&mut Vec<WriteOp>, StorageError> {
        self.open
            .get_mut(&tx)
            .map(|open| &mut open.log)
            .ok_or(StorageError::UnknownTransaction(tx))
    }

    fn descendants(&self, tx: TxHandle) -> Vec<TxHandle> {
        let mut found = Vec::new();
        let mut frontier = vec![tx];
        while let Some(current) = frontier.pop() {
            for (handle, open) in &self.open {
                if open.parent == Some(current) {
                    found.push(*handle);
                    frontier.push(*handle);
                }
            }
        }
        found
    }

    fn apply(&mut self, log: Vec<WriteOp>) {
        for op in log {
            match op {
                WriteOp::Put(entity) => {
                    self.tables
                        .entry(entity.kind.clone())
                        .or_default()
                        .insert(entity.id, entity);
                }
                WriteOp::Remove(kind, id) => {
                    if let Some(table) = self.tables.get_mut(&kind) {
                        table.remove(&id);
                    }
                }
            }
        }
    }
}

/// Thread-safe in-memory [`Storage`] engine.
///
/// Root handles are isolated from each other at read-committed level:
/// uncommitted writes are visible only to the handle that made them and
/// its descendants.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    next_tx: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_tx: AtomicU64::new(1),
        }
    }

    /// Number of handles currently open.
    #[must_use]
    pub fn open_transactions(&self) -> usize {
        self.inner.lock().open.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    fn begin_tx(&self, parent: Option<TxHandle>) -> Result<TxHandle, StorageError> {
        let mut inner = self.inner.lock();
        if let Some(parent) = parent
            && !inner.open.contains_key(&parent)
        {
            return Err(StorageError::UnknownTransaction(parent));
        }
        let handle = TxHandle::from_raw(self.next_tx.fetch_add(1, Ordering::Relaxed));
        inner.open.insert(
            handle,
            OpenTx {
                parent,
                log: Vec::new(),
            },
        );
        Ok(handle)
    }

    fn commit_tx(&self, tx: TxHandle) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if !inner.open.contains_key(&tx) {
            return Err(StorageError::UnknownTransaction(tx));
        }
        if inner.open.values().any(|open| open.parent == Some(tx)) {
            return Err(StorageError::OpenChildren(tx));
        }
        let Some(closed) = inner.open.remove(&tx) else {
            return Err(StorageError::UnknownTransaction(tx));
        };
        match closed.parent {
            Some(parent) => inner.log_mut(parent)?.extend(closed.log),
            None => inner.apply(closed.log),
        }
        Ok(())
    }

    fn rollback_tx(&self, tx: TxHandle) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if !inner.open.contains_key(&tx) {
            return Err(StorageError::UnknownTransaction(tx));
        }
        for handle in inner.descendants(tx) {
            inner.open.remove(&handle);
        }
        inner.open.remove(&tx);
        Ok(())
    }

    fn write(&self, record: WriteRecord, tx: TxHandle) -> Result<Entity, StorageError> {
        let mut inner = self.inner.lock();
        let entity = match record {
            WriteRecord::Insert { kind, fields } => {
                let now = Utc::now();
                Entity {
                    id: RecordId::generate(),
                    kind,
                    fields,
                    created_at: now,
                    updated_at: now,
                }
            }
            WriteRecord::Update { kind, id, fields } => {
                let mut existing = inner
                    .view(&kind, Some(tx))?
                    .remove(&id)
                    .ok_or(StorageError::RecordNotFound { kind, id })?;
                existing.fields.extend(fields);
                existing.updated_at = Utc::now();
                existing
            }
        };
        inner.log_mut(tx)?.push(WriteOp::Put(entity.clone()));
        Ok(entity)
    }

    fn query(
        &self,
        criteria: &Criteria,
        tx: Option<TxHandle>,
    ) -> Result<Vec<Entity>, StorageError> {
        let inner = self.inner.lock();
        let mut rows: Vec<Entity> = inner
            .view(&criteria.kind, tx)?
            .into_values()
            .filter(|entity| criteria.matches(entity))
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn delete(&self, criteria: &Criteria, tx: TxHandle) -> Result<Vec<Entity>, StorageError> {
        let mut inner = self.inner.lock();
        let removed: Vec<Entity> = inner
            .view(&criteria.kind, Some(tx))?
            .into_values()
            .filter(|entity| criteria.matches(entity))
            .collect();
        let log = inner.log_mut(tx)?;
        for entity in &removed {
            log.push(WriteOp::Remove(entity.kind.clone(), entity.id));
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::Fields;

    fn insert(name: &str) -> WriteRecord {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!(name));
        WriteRecord::Insert {
            kind: EntityKind::from("trigger"),
            fields,
        }
    }

    fn count(store: &MemoryStore, tx: Option<TxHandle>) -> usize {
        store
            .count(&Criteria::kind("trigger"), tx)
            .unwrap_or(usize::MAX)
    }

    fn begin(store: &MemoryStore, parent: Option<TxHandle>) -> TxHandle {
        let Ok(tx) = store.begin_tx(parent) else {
            panic!("begin failed");
        };
        tx
    }

    #[test]
    fn root_commit_makes_writes_durable() {
        let store = MemoryStore::new();
        let tx = begin(&store, None);
        assert!(store.write(insert("a"), tx).is_ok());

        assert_eq!(count(&store, Some(tx)), 1);
        assert_eq!(count(&store, None), 0);

        assert!(store.commit_tx(tx).is_ok());
        assert_eq!(count(&store, None), 1);
        assert_eq!(store.open_transactions(), 0);
    }

    #[test]
    fn uncommitted_writes_are_invisible_to_other_roots() {
        let store = MemoryStore::new();
        let writer = begin(&store, None);
        let reader = begin(&store, None);
        assert!(store.write(insert("a"), writer).is_ok());
        assert_eq!(count(&store, Some(reader)), 0);
    }

    #[test]
    fn rollback_discards_writes_and_open_descendants() {
        let store = MemoryStore::new();
        let root = begin(&store, None);
        let child = begin(&store, Some(root));
        let grandchild = begin(&store, Some(child));
        assert!(store.write(insert("a"), root).is_ok());
        assert!(store.write(insert("b"), grandchild).is_ok());
        assert_eq!(count(&store, Some(grandchild)), 2);

        assert!(store.rollback_tx(root).is_ok());
        assert_eq!(store.open_transactions(), 0);
        assert_eq!(count(&store, None), 0);
        assert_eq!(
            store.write(insert("c"), grandchild),
            Err(StorageError::UnknownTransaction(grandchild))
        );
    }

    #[test]
    fn nested_commit_folds_into_parent() {
        let store = MemoryStore::new();
        let root = begin(&store, None);
        let child = begin(&store, Some(root));
        assert!(store.write(insert("a"), child).is_ok());
        assert_eq!(count(&store, Some(root)), 0);

        assert!(store.commit_tx(child).is_ok());
        assert_eq!(count(&store, Some(root)), 1);
        assert_eq!(count(&store, None), 0);

        assert!(store.rollback_tx(root).is_ok());
        assert_eq!(count(&store, None), 0);
    }

    #[test]
    fn nested_rollback_keeps_parent_writes() {
        let store = MemoryStore::new();
        let root = begin(&store, None);
        assert!(store.write(insert("kept"), root).is_ok());
        let child = begin(&store, Some(root));
        assert!(store.write(insert("dropped"), child).is_ok());

        assert!(store.rollback_tx(child).is_ok());
        assert!(store.commit_tx(root).is_ok());

        let Ok(rows) = store.query(&Criteria::kind("trigger"), None) else {
            panic!("query failed");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().and_then(|e| e.field("name")), Some(&json!("kept")));
    }

    #[test]
    fn commit_with_open_child_is_refused() {
        let store = MemoryStore::new();
        let root = begin(&store, None);
        let _child = begin(&store, Some(root));
        assert_eq!(store.commit_tx(root), Err(StorageError::OpenChildren(root)));
    }

    #[test]
    fn update_merges_fields_and_delete_removes() {
        let store = MemoryStore::new();
        let tx = begin(&store, None);
        let Ok(created) = store.write(insert("a"), tx) else {
            panic!("insert failed");
        };

        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!("b"));
        let update = WriteRecord::Update {
            kind: EntityKind::from("trigger"),
            id: created.id,
            fields,
        };
        let Ok(updated) = store.write(update, tx) else {
            panic!("update failed");
        };
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.field("name"), Some(&json!("b")));

        let Ok(removed) = store.delete(&Criteria::kind("trigger").eq("name", "b"), tx) else {
            panic!("delete failed");
        };
        assert_eq!(removed.len(), 1);
        assert_eq!(count(&store, Some(tx)), 0);
    }

    #[test]
    fn update_of_missing_row_fails() {
        let store = MemoryStore::new();
        let tx = begin(&store, None);
        let id = RecordId::generate();
        let update = WriteRecord::Update {
            kind: EntityKind::from("trigger"),
            id,
            fields: Fields::new(),
        };
        assert!(matches!(
            store.write(update, tx),
            Err(StorageError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn closed_handles_are_rejected() {
        let store = MemoryStore::new();
        let tx = begin(&store, None);
        assert!(store.commit_tx(tx).is_ok());
        assert_eq!(store.commit_tx(tx), Err(StorageError::UnknownTransaction(tx)));
        assert_eq!(store.rollback_tx(tx), Err(StorageError::UnknownTransaction(tx)));
        assert!(store.begin_tx(Some(tx)).is_err());
    }
}
