//! Two-field rectangle whose dimensions iterate in a fixed order.

use serde::Serialize;
use utoipa::ToSchema;

/// One named dimension, serialized as `{"length": n}` or `{"width": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Length of the rectangle.
    Length(i64),
    /// Width of the rectangle.
    Width(i64),
}

/// Rectangle with integer sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    length: i64,
    width: i64,
}

impl Rectangle {
    /// Creates a rectangle.
    #[must_use]
    pub const fn new(length: i64, width: i64) -> Self {
        Self { length, width }
    }

    /// Yields the length, then the width, then ends.
    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> {
        [Dimension::Length(self.length), Dimension::Width(self.width)].into_iter()
    }
}
