//! HTTP handlers for the entity routes.

pub mod entity;
pub use entity::*;
