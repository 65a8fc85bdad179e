//! Rectangle query parameters and response.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::rectangle::Dimension;

/// Query parameters for `GET /rectangle`.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RectangleParams {
    /// Length of the rectangle. Defaults to 5.
    pub length: Option<i64>,
    /// Width of the rectangle. Defaults to 3.
    pub width: Option<i64>,
}

impl RectangleParams {
    /// Default length when the parameter is omitted.
    pub const DEFAULT_LENGTH: i64 = 5;
    /// Default width when the parameter is omitted.
    pub const DEFAULT_WIDTH: i64 = 3;
}

/// Dimensions of a rectangle in iteration order.
///
/// ```json
/// { "collection": [ { "length": 5 }, { "width": 3 } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RectangleResponse {
    /// Length first, then width.
    pub collection: Vec<Dimension>,
}
