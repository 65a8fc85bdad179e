//! Entity handlers: create and list.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::run_blocking;
use crate::api::dto::{CreateEntityRequest, EntityListResponse};
use crate::app_state::AppState;
use crate::domain::{Entity, EntityKind};
use crate::error::{ErrorResponse, SignalsError};

/// `POST /entities/{kind}`: Create an entity and dispatch its handlers.
///
/// # Errors
///
/// Returns [`SignalsError`] on unknown kinds, invalid fields, or a failed
/// handler.
#[utoipa::path(
    post,
    path = "/api/v1/entities/{kind}",
    tag = "Entities",
    summary = "Create an entity",
    description = "Validates the fields against the kind's schema, stores the entity, and runs every `post_create` handler in the same unit of work before responding.",
    params(("kind" = String, Path, description = "Entity kind, e.g. `trigger`")),
    request_body = CreateEntityRequest,
    responses(
        (status = 201, description = "Entity created", body = Entity),
        (status = 400, description = "Unknown kind or invalid fields", body = ErrorResponse),
        (status = 500, description = "Storage or handler failure", body = ErrorResponse),
    )
)]
pub async fn create_entity(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(req): Json<CreateEntityRequest>,
) -> Result<impl IntoResponse, SignalsError> {
    let service = Arc::clone(&state.signal_service);
    let kind = EntityKind::new(kind);
    let entity = run_blocking(move || service.create_entity(kind, req.0)).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

/// `GET /entities/{kind}`: List committed entities of a kind.
///
/// # Errors
///
/// Returns [`SignalsError`] on unknown kinds.
#[utoipa::path(
    get,
    path = "/api/v1/entities/{kind}",
    tag = "Entities",
    summary = "List entities",
    description = "Returns every committed entity of the kind, oldest first.",
    params(("kind" = String, Path, description = "Entity kind, e.g. `transaction_proof`")),
    responses(
        (status = 200, description = "Committed entities", body = EntityListResponse),
        (status = 400, description = "Unknown kind", body = ErrorResponse),
    )
)]
pub async fn list_entities(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<EntityListResponse>, SignalsError> {
    let service = Arc::clone(&state.signal_service);
    let kind = EntityKind::new(kind);
    let listed = kind.clone();
    let entities = run_blocking(move || service.list_entities(&listed)).await?;
    Ok(Json(EntityListResponse {
        kind: kind.to_string(),
        total: entities.len(),
        entities,
    }))
}

/// Entity routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/entities/{kind}", get(list_entities).post(create_entity))
}
