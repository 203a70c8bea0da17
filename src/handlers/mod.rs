//! HTTP handlers for entity collections and resources.

pub mod entity;
pub use entity::*;
