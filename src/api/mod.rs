//! API Module
//!
//! Thin diagnostic HTTP surface over a shared cache.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /metrics` - Counters, top keys and size per namespace
//! - `GET /keys` - List live keys (`?pattern=&limit=`)
//! - `GET /keys/:key` - Metadata for one key
//! - `DELETE /keys/:key` - Delete a key
//! - `DELETE /keys` - Drop every entry
//! - `POST /invalidate` - Invalidate by tags and/or key pattern
//! - `PUT /config` - Apply a partial configuration

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
