//! Signal service: entity mutations and the dispatch proofs.
//!
//! Every operation builds its own [`TransactionContext`] so one call is
//! one unit of work. Operations that dispatch into the shared
//! [`EventTrace`] hold the scenario lock, so markers of concurrent
//! requests never interleave.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use super::gateway::MutationGateway;
use super::receivers::RECEIVER_RAN;
use super::transaction::TransactionContext;
use crate::domain::models::{TRANSACTION_PROOF, TRIGGER};
use crate::domain::{Entity, EntityKind, EventTrace, Fields, ThreadToken};
use crate::error::SignalsError;
use crate::persistence::{Criteria, Storage};

const BEFORE_SAVE: &str = "before_save";
const AFTER_SAVE: &str = "after_save";
const INTENTIONAL_ROLLBACK: &str = "intentional_rollback";
const SYNC_DEMO: &str = "sync_demo";
const THREAD_DEMO: &str = "thread_demo";
const TRANSACTION_DEMO: &str = "transaction_demo";
const COMMIT_DEMO: &str = "commit_demo";

/// Order in which the caller and the receiver appended their markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SynchronousProof {
    /// Markers in append order.
    pub execution_order: Vec<String>,
}

/// Threads observed on both sides of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SameThreadProof {
    /// Thread that called the gateway.
    pub caller_thread_id: u64,
    /// Thread the receiver ran on.
    pub receiver_thread_id: u64,
}

/// Committed row counts after a deliberately rolled-back unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RollbackProof {
    /// `trigger` rows left behind.
    pub after_rollback_trigger_count: usize,
    /// `transaction_proof` rows left behind.
    pub after_rollback_proof_count: usize,
}

/// Committed row counts after a successful unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CommitProof {
    /// `trigger` rows committed.
    pub after_commit_trigger_count: usize,
    /// `transaction_proof` rows committed.
    pub after_commit_proof_count: usize,
}

/// Coordinates the gateway, storage, and trace for the HTTP layer.
#[derive(Debug)]
pub struct SignalService {
    gateway: Arc<MutationGateway>,
    storage: Arc<dyn Storage>,
    trace: Arc<EventTrace>,
    scenario: Mutex<()>,
}

impl SignalService {
    /// Creates a new service.
    #[must_use]
    pub fn new(
        gateway: Arc<MutationGateway>,
        storage: Arc<dyn Storage>,
        trace: Arc<EventTrace>,
    ) -> Self {
        Self {
            gateway,
            storage,
            trace,
            scenario: Mutex::new(()),
        }
    }

    /// The trace receivers append to.
    #[must_use]
    pub fn trace(&self) -> &Arc<EventTrace> {
        &self.trace
    }

    fn context(&self) -> TransactionContext {
        TransactionContext::new(Arc::clone(&self.storage))
    }

    /// Creates an entity in its own unit of work.
    ///
    /// # Errors
    ///
    /// See [`MutationGateway::create`].
    pub fn create_entity(&self, kind: EntityKind, fields: Fields) -> Result<Entity, SignalsError> {
        let _scenario = self.scenario.lock();
        let mut ctx = self.context();
        ctx.atomic(|ctx| self.gateway.create(ctx, kind, fields))
    }

    /// Committed entities of `kind`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SignalsError::UnknownEntityKind`] for an unregistered kind.
    pub fn list_entities(&self, kind: &EntityKind) -> Result<Vec<Entity>, SignalsError> {
        self.gateway.schema(kind)?;
        Ok(self.storage.query(&Criteria::kind(kind.clone()), None)?)
    }

    /// The receiver runs between the caller's `before_save` and
    /// `after_save` markers.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures.
    pub fn prove_synchronous(&self) -> Result<SynchronousProof, SignalsError> {
        let _scenario = self.scenario.lock();
        self.trace.reset();
        let mut ctx = self.context();

        self.trace.append(BEFORE_SAVE);
        self.gateway.create(&mut ctx, TRIGGER, trigger_named(SYNC_DEMO))?;
        self.trace.append(AFTER_SAVE);

        Ok(SynchronousProof {
            execution_order: self.trace.markers(),
        })
    }

    /// The receiver runs on the caller's thread.
    ///
    /// # Errors
    ///
    /// Returns [`SignalsError::Internal`] if the receiver left no marker.
    pub fn prove_same_thread(&self) -> Result<SameThreadProof, SignalsError> {
        let _scenario = self.scenario.lock();
        self.trace.reset();
        let mut ctx = self.context();

        let caller = ThreadToken::current();
        self.gateway.create(&mut ctx, TRIGGER, trigger_named(THREAD_DEMO))?;
        let receiver = self
            .trace
            .last_thread_of(RECEIVER_RAN)
            .ok_or_else(|| SignalsError::Internal("receiver did not run".to_string()))?;

        Ok(SameThreadProof {
            caller_thread_id: caller.as_u64(),
            receiver_thread_id: receiver.as_u64(),
        })
    }

    /// Rolling back the caller's unit of work also discards the receiver's
    /// write.
    ///
    /// # Errors
    ///
    /// Returns [`SignalsError::Internal`] if the unit of work did not end
    /// in the intended rollback.
    pub fn prove_same_transaction(&self) -> Result<RollbackProof, SignalsError> {
        let _scenario = self.scenario.lock();
        self.trace.reset();
        self.clear_scenario_rows(TRANSACTION_DEMO)?;
        let mut ctx = self.context();

        let outcome: Result<(), SignalsError> = ctx.atomic(|ctx| {
            self.gateway.create(ctx, TRIGGER, trigger_named(TRANSACTION_DEMO))?;
            Err(SignalsError::Aborted(INTENTIONAL_ROLLBACK.to_string()))
        });
        match outcome {
            Err(SignalsError::Aborted(reason)) if reason == INTENTIONAL_ROLLBACK => {}
            Err(other) => return Err(other),
            Ok(()) => {
                return Err(SignalsError::Internal(
                    "unit of work committed unexpectedly".to_string(),
                ));
            }
        }

        Ok(RollbackProof {
            after_rollback_trigger_count: self
                .committed(&Criteria::kind(TRIGGER).eq("name", TRANSACTION_DEMO))?,
            after_rollback_proof_count: self.committed(&Criteria::kind(TRANSACTION_PROOF))?,
        })
    }

    /// Committing the caller's unit of work also commits the receiver's
    /// write.
    ///
    /// # Errors
    ///
    /// Propagates gateway and commit failures.
    pub fn prove_commit(&self) -> Result<CommitProof, SignalsError> {
        let _scenario = self.scenario.lock();
        self.trace.reset();
        self.clear_scenario_rows(COMMIT_DEMO)?;
        let mut ctx = self.context();

        ctx.atomic(|ctx| self.gateway.create(ctx, TRIGGER, trigger_named(COMMIT_DEMO)))?;

        Ok(CommitProof {
            after_commit_trigger_count: self
                .committed(&Criteria::kind(TRIGGER).eq("name", COMMIT_DEMO))?,
            after_commit_proof_count: self.committed(&Criteria::kind(TRANSACTION_PROOF))?,
        })
    }

    /// Removes the scenario's own triggers and every proof row so counts
    /// start from zero. Other triggers are left alone.
    fn clear_scenario_rows(&self, scenario: &str) -> Result<(), SignalsError> {
        let mut ctx = self.context();
        ctx.atomic(|ctx| {
            ctx.delete(&Criteria::kind(TRIGGER).eq("name", scenario))?;
            ctx.delete(&Criteria::kind(TRANSACTION_PROOF))?;
            Ok(())
        })
    }

    fn committed(&self, criteria: &Criteria) -> Result<usize, SignalsError> {
        Ok(self.storage.count(criteria, None)?)
    }
}

fn trigger_named(name: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("name".to_string(), json!(name));
    fields
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::thread;

    use super::*;
    use crate::domain::models::builtin_schemas;
    use crate::persistence::MemoryStore;
    use crate::service::handler_registry::HandlerRegistry;
    use crate::service::receivers::register_receivers;

    fn service() -> Arc<SignalService> {
        let registry = Arc::new(HandlerRegistry::new());
        let trace = Arc::new(EventTrace::new(64));
        assert!(register_receivers(&registry, &trace).is_ok());
        registry.freeze();
        let gateway = Arc::new(MutationGateway::new(registry).with_schemas(builtin_schemas()));
        let storage: Arc<dyn Storage> = Arc::new(MemoryStore::new());
        Arc::new(SignalService::new(gateway, storage, trace))
    }

    #[test]
    fn synchronous_proof_orders_markers() {
        let svc = service();
        for _ in 0..2 {
            let Ok(proof) = svc.prove_synchronous() else {
                panic!("proof failed");
            };
            assert_eq!(proof.execution_order, vec![BEFORE_SAVE, RECEIVER_RAN, AFTER_SAVE]);
        }
    }

    #[test]
    fn same_thread_proof_reports_equal_threads() {
        let svc = service();
        let Ok(proof) = svc.prove_same_thread() else {
            panic!("proof failed");
        };
        assert_eq!(proof.caller_thread_id, proof.receiver_thread_id);
    }

    #[test]
    fn rollback_and_commit_proofs_are_repeatable() {
        let svc = service();
        for _ in 0..2 {
            let Ok(rollback) = svc.prove_same_transaction() else {
                panic!("rollback proof failed");
            };
            assert_eq!(rollback.after_rollback_trigger_count, 0);
            assert_eq!(rollback.after_rollback_proof_count, 0);

            let Ok(commit) = svc.prove_commit() else {
                panic!("commit proof failed");
            };
            assert_eq!(commit.after_commit_trigger_count, 1);
            assert_eq!(commit.after_commit_proof_count, 1);
        }
    }

    #[test]
    fn scenarios_leave_other_triggers_alone() {
        let svc = service();
        let kind = EntityKind::from(TRIGGER);
        assert!(svc.create_entity(kind.clone(), trigger_named("mine")).is_ok());

        assert!(svc.prove_same_transaction().is_ok());
        assert!(svc.prove_commit().is_ok());
        assert!(svc.prove_commit().is_ok());

        let Ok(triggers) = svc.list_entities(&kind) else {
            panic!("list failed");
        };
        let names: Vec<_> = triggers.iter().filter_map(|t| t.field("name")).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&&json!("mine")));
        assert!(names.contains(&&json!(COMMIT_DEMO)));
    }

    #[test]
    fn concurrent_scenarios_do_not_interleave_markers() {
        let svc = service();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let svc = Arc::clone(&svc);
                thread::spawn(move || svc.prove_synchronous())
            })
            .collect();
        for worker in workers {
            let Ok(Ok(proof)) = worker.join() else {
                panic!("worker failed");
            };
            assert_eq!(proof.execution_order, vec![BEFORE_SAVE, RECEIVER_RAN, AFTER_SAVE]);
        }
    }

    #[test]
    fn entities_are_created_and_listed() {
        let svc = service();
        let kind = EntityKind::from(TRIGGER);
        assert!(svc.create_entity(kind.clone(), trigger_named("listed")).is_ok());

        let Ok(triggers) = svc.list_entities(&kind) else {
            panic!("list failed");
        };
        assert_eq!(triggers.len(), 1);
        let Ok(proofs) = svc.list_entities(&EntityKind::from(TRANSACTION_PROOF)) else {
            panic!("list failed");
        };
        assert_eq!(proofs.len(), 1);
        assert!(matches!(
            svc.list_entities(&EntityKind::from("unknown")),
            Err(SignalsError::UnknownEntityKind(_))
        ));
    }
}
