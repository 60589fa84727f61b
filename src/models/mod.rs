//! Request and Response models for the diagnostic API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{InvalidateRequest, ListKeysQuery};
pub use responses::{ClearResponse, DeleteResponse, HealthResponse, InvalidateResponse};
