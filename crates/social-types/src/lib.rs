//! Core types and traits for the social graph service.
//!
//! Request/response DTOs serialize with camelCase field names (`userId`, `followerId`) so the
//! HTTP surface stays wire-compatible with existing clients.

mod dto;
mod graph;
mod traits;

pub use dto::*;
pub use graph::*;
pub use traits::*;
