//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "sync-signals",
        description = "Synchronous, transaction-scoped signal dispatch for entity mutations."
    ),
    paths(
        handlers::proof::synchronous_proof,
        handlers::proof::same_thread_proof,
        handlers::proof::same_transaction_proof,
        handlers::proof::commit_proof,
        handlers::entities::create_entity,
        handlers::entities::list_entities,
        handlers::rectangle::rectangle_handler,
        handlers::system::health_handler,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::domain::Entity,
        crate::domain::RecordId,
        crate::domain::EntityKind,
        crate::domain::rectangle::Dimension,
        crate::service::signal_service::SynchronousProof,
        crate::service::signal_service::SameThreadProof,
        crate::service::signal_service::RollbackProof,
        crate::service::signal_service::CommitProof,
        dto::CreateEntityRequest,
        dto::EntityListResponse,
        dto::RectangleResponse,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "Proofs", description = "Observable guarantees of synchronous dispatch"),
        (name = "Entities", description = "Entity mutations through the gateway"),
        (name = "Rectangle", description = "Ordered dimension iteration"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let Ok(state) = AppState::in_memory(256) else {
            panic!("state wiring failed");
        };
        build_router().with_state(state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        };
        let Ok(request) = request else {
            panic!("bad request");
        };
        let Ok(response) = app.clone().oneshot(request).await else {
            panic!("request failed");
        };
        let status = response.status();
        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Method::GET, uri, None).await
    }

    #[tokio::test]
    async fn synchronous_proof_reports_marker_order() {
        let app = app();
        for _ in 0..2 {
            let (status, body) = get(&app, "/api/v1/proofs/synchronous").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                body,
                json!({"execution_order": ["before_save", "receiver_ran", "after_save"]})
            );
        }
    }

    #[tokio::test]
    async fn same_thread_proof_reports_equal_ids() {
        let (status, body) = get(&app(), "/api/v1/proofs/same-thread").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("caller_thread_id").is_some_and(Value::is_u64));
        assert_eq!(body.get("caller_thread_id"), body.get("receiver_thread_id"));
    }

    #[tokio::test]
    async fn rollback_then_commit_proofs() {
        let app = app();
        let (status, body) = get(&app, "/api/v1/proofs/same-transaction").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"after_rollback_trigger_count": 0, "after_rollback_proof_count": 0})
        );

        let (status, body) = get(&app, "/api/v1/proofs/commit").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"after_commit_trigger_count": 1, "after_commit_proof_count": 1})
        );

        let (_, body) = get(&app, "/api/v1/proofs/same-transaction").await;
        assert_eq!(body.get("after_rollback_proof_count"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn creating_a_trigger_commits_its_proof() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/entities/trigger",
            Some(json!({"name": "via http"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.pointer("/fields/name"), Some(&json!("via http")));

        let (status, body) = get(&app, "/api/v1/entities/transaction_proof").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("total"), Some(&json!(1)));
        assert_eq!(
            body.pointer("/entities/0/fields/created_by_signal"),
            Some(&json!(true))
        );
    }

    #[tokio::test]
    async fn invalid_entities_are_rejected() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/entities/trigger",
            Some(json!({"name": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.pointer("/error/code"), Some(&json!(1001)));

        let (status, body) = get(&app, "/api/v1/entities/unknown").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.pointer("/error/code"), Some(&json!(1002)));

        let (_, body) = get(&app, "/api/v1/entities/transaction_proof").await;
        assert_eq!(body.get("total"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn rectangle_defaults_and_overrides() {
        let app = app();
        let (status, body) = get(&app, "/api/v1/rectangle").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"collection": [{"length": 5}, {"width": 3}]}));

        let (_, body) = get(&app, "/api/v1/rectangle?length=9&width=4").await;
        assert_eq!(body, json!({"collection": [{"length": 9}, {"width": 4}]}));

        let (status, body) = get(&app, "/api/v1/rectangle?length=wide").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.pointer("/error/code"), Some(&json!(1001)));
    }

    #[tokio::test]
    async fn health_is_reported() {
        let (status, body) = get(&app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("status"), Some(&json!("healthy")));
    }

    #[test]
    fn openapi_lists_every_path() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/proofs/synchronous",
            "/api/v1/proofs/same-thread",
            "/api/v1/proofs/same-transaction",
            "/api/v1/proofs/commit",
            "/api/v1/entities/{kind}",
            "/api/v1/rectangle",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
