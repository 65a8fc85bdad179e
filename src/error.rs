//! Error types with HTTP status code mapping.
//!
//! [`SignalsError`] is the central error type. Each variant maps to a
//! numeric code and an HTTP status so the proof endpoints can return a
//! structured JSON body. [`TransactionError`] covers illegal transitions
//! of the transaction state machine.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{EntityKind, EventKind, RecordId};
use crate::persistence::{StorageError, TxHandle};

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 3002,
///     "message": "handler `proof_receiver` failed: storage unavailable: disk full",
///     "details": "storage unavailable: disk full"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Root cause, when the error wraps another one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Illegal transaction-state transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    /// The handle, or one of its ancestors, is marked rollback-only.
    #[error("transaction {0} is marked rollback-only")]
    RollbackOnly(TxHandle),

    /// The handle was already committed.
    #[error("transaction {0} is already committed")]
    AlreadyCommitted(TxHandle),

    /// The handle was already rolled back.
    #[error("transaction {0} is already rolled back")]
    AlreadyRolledBack(TxHandle),

    /// Only the innermost open handle may be committed.
    #[error("transaction {0} has an open nested transaction")]
    NotInnermost(TxHandle),

    /// The handle does not belong to this context.
    #[error("transaction {0} is not known to this context")]
    UnknownHandle(TxHandle),
}

/// Central error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status               |
/// |-----------|-----------------------|---------------------------|
/// | 1000–1999 | Validation            | 400 Bad Request           |
/// | 2000–2999 | State / Not Found     | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server                | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum SignalsError {
    /// Malformed input for an entity mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No schema is registered for the entity kind.
    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(EntityKind),

    /// The entity targeted by an update or delete does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// Identity of the missing entity.
        id: RecordId,
    },

    /// Illegal transaction-state transition.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// The caller asked for its unit of work to be abandoned.
    #[error("aborted: {0}")]
    Aborted(String),

    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A registered handler failed; later handlers did not run.
    #[error("handler `{handler}` failed: {source}")]
    Handler {
        /// Name of the failing handler.
        handler: String,
        /// What the handler reported.
        #[source]
        source: Box<SignalsError>,
    },

    /// The same handler is already registered for this key.
    #[error("handler `{handler}` is already registered for {entity_kind}/{event_kind}")]
    DuplicateHandler {
        /// Name of the rejected handler.
        handler: String,
        /// Entity kind of the registration key.
        entity_kind: EntityKind,
        /// Event kind of the registration key.
        event_kind: EventKind,
    },

    /// Registration attempted after the registry was frozen.
    #[error("handler registry is frozen; `{0}` was not registered")]
    RegistryFrozen(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SignalsError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::UnknownEntityKind(_) => 1002,
            Self::NotFound { .. } => 2001,
            Self::Transaction(_) => 2002,
            Self::Aborted(_) => 2003,
            Self::Internal(_) => 3000,
            Self::Storage(_) => 3001,
            Self::Handler { .. } => 3002,
            Self::DuplicateHandler { .. } => 3003,
            Self::RegistryFrozen(_) => 3004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnknownEntityKind(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Transaction(_) | Self::Aborted(_) => StatusCode::CONFLICT,
            Self::Storage(_)
            | Self::Handler { .. }
            | Self::DuplicateHandler { .. }
            | Self::RegistryFrozen(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Name of the handler that caused this error, if any.
    #[must_use]
    pub fn failing_handler(&self) -> Option<&str> {
        match self {
            Self::Handler { handler, .. } => Some(handler),
            _ => None,
        }
    }

    /// Innermost cause, unwrapping nested handler failures.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Handler { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl IntoResponse for SignalsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            Self::Handler { .. } => Some(self.root_cause().to_string()),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
