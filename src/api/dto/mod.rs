//! Data Transfer Objects for REST request/response serialization.

pub mod entity_dto;
pub mod rectangle_dto;

pub use entity_dto::*;
pub use rectangle_dto::*;
