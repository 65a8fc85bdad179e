//! Rectangle dimension handler.

use axum::extract::Query;
use axum::extract::rejection::QueryRejection;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{RectangleParams, RectangleResponse};
use crate::app_state::AppState;
use crate::domain::rectangle::Rectangle;
use crate::error::{ErrorResponse, SignalsError};

/// `GET /rectangle`: Dimensions of a rectangle in iteration order.
///
/// # Errors
///
/// Returns [`SignalsError::Validation`] if a parameter is not an integer.
#[utoipa::path(
    get,
    path = "/api/v1/rectangle",
    tag = "Rectangle",
    summary = "Rectangle dimensions",
    description = "Iterates a rectangle's dimensions: length first, then width.",
    params(RectangleParams),
    responses(
        (status = 200, description = "Dimensions in order", body = RectangleResponse),
        (status = 400, description = "Non-integer parameter", body = ErrorResponse),
    )
)]
pub async fn rectangle_handler(
    params: Result<Query<RectangleParams>, QueryRejection>,
) -> Result<Json<RectangleResponse>, SignalsError> {
    let Query(params) =
        params.map_err(|rejection| SignalsError::Validation(rejection.body_text()))?;
    let rect = Rectangle::new(
        params.length.unwrap_or(RectangleParams::DEFAULT_LENGTH),
        params.width.unwrap_or(RectangleParams::DEFAULT_WIDTH),
    );
    Ok(Json(RectangleResponse {
        collection: rect.dimensions().collect(),
    }))
}

/// Rectangle routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/rectangle", get(rectangle_handler))
}
