//! REST endpoint handlers organized by resource.

pub mod entities;
pub mod proof;
pub mod rectangle;
pub mod system;

use axum::Router;

use crate::app_state::AppState;
use crate::error::SignalsError;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(proof::routes())
        .merge(entities::routes())
        .merge(rectangle::routes())
}

/// Runs synchronous service work on the blocking pool.
///
/// Dispatch is synchronous and may wait on the scenario lock, so it must
/// not run on an async worker thread.
async fn run_blocking<T, F>(work: F) -> Result<T, SignalsError>
where
    F: FnOnce() -> Result<T, SignalsError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| SignalsError::Internal(format!("blocking task failed: {err}")))?
}
