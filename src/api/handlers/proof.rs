//! Dispatch proof handlers.
//!
//! Each endpoint runs one scenario against the live core and reports what
//! it observed.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::run_blocking;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, SignalsError};
use crate::service::signal_service::{
    CommitProof, RollbackProof, SameThreadProof, SynchronousProof,
};

/// `GET /proofs/synchronous`: Receiver runs before the caller continues.
///
/// # Errors
///
/// Returns [`SignalsError`] if the scenario fails.
#[utoipa::path(
    get,
    path = "/api/v1/proofs/synchronous",
    tag = "Proofs",
    summary = "Synchronous execution proof",
    description = "Appends `before_save`, creates a trigger, appends `after_save`, and returns the marker order. The receiver's `receiver_ran` marker sits between the two.",
    responses(
        (status = 200, description = "Observed marker order", body = SynchronousProof),
        (status = 500, description = "Scenario failed", body = ErrorResponse),
    )
)]
pub async fn synchronous_proof(
    State(state): State<AppState>,
) -> Result<Json<SynchronousProof>, SignalsError> {
    let service = Arc::clone(&state.signal_service);
    Ok(Json(run_blocking(move || service.prove_synchronous()).await?))
}

/// `GET /proofs/same-thread`: Receiver runs on the caller's thread.
///
/// # Errors
///
/// Returns [`SignalsError`] if the scenario fails.
#[utoipa::path(
    get,
    path = "/api/v1/proofs/same-thread",
    tag = "Proofs",
    summary = "Same thread proof",
    description = "Records the caller's thread, creates a trigger, and reports the thread the receiver ran on.",
    responses(
        (status = 200, description = "Caller and receiver threads", body = SameThreadProof),
        (status = 500, description = "Scenario failed", body = ErrorResponse),
    )
)]
pub async fn same_thread_proof(
    State(state): State<AppState>,
) -> Result<Json<SameThreadProof>, SignalsError> {
    let service = Arc::clone(&state.signal_service);
    Ok(Json(run_blocking(move || service.prove_same_thread()).await?))
}

/// `GET /proofs/same-transaction`: Rollback discards the receiver's write.
///
/// # Errors
///
/// Returns [`SignalsError`] if the scenario fails.
#[utoipa::path(
    get,
    path = "/api/v1/proofs/same-transaction",
    tag = "Proofs",
    summary = "Shared transaction proof",
    description = "Creates a trigger inside a unit of work that is then rolled back on purpose, and reports the committed trigger and proof counts (both zero).",
    responses(
        (status = 200, description = "Counts after rollback", body = RollbackProof),
        (status = 500, description = "Scenario failed", body = ErrorResponse),
    )
)]
pub async fn same_transaction_proof(
    State(state): State<AppState>,
) -> Result<Json<RollbackProof>, SignalsError> {
    let service = Arc::clone(&state.signal_service);
    Ok(Json(run_blocking(move || service.prove_same_transaction()).await?))
}

/// `GET /proofs/commit`: Commit keeps the receiver's write.
///
/// # Errors
///
/// Returns [`SignalsError`] if the scenario fails.
#[utoipa::path(
    get,
    path = "/api/v1/proofs/commit",
    tag = "Proofs",
    summary = "Commit proof",
    description = "Creates a trigger inside a unit of work that commits, and reports the committed trigger and proof counts (both one).",
    responses(
        (status = 200, description = "Counts after commit", body = CommitProof),
        (status = 500, description = "Scenario failed", body = ErrorResponse),
    )
)]
pub async fn commit_proof(
    State(state): State<AppState>,
) -> Result<Json<CommitProof>, SignalsError> {
    let service = Arc::clone(&state.signal_service);
    Ok(Json(run_blocking(move || service.prove_commit()).await?))
}

/// Proof routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/proofs/synchronous", get(synchronous_proof))
        .route("/proofs/same-thread", get(same_thread_proof))
        .route("/proofs/same-transaction", get(same_transaction_proof))
        .route("/proofs/commit", get(commit_proof))
}
