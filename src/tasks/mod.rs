//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache is open.
//!
//! # Tasks
//! - Expiration sweep: Removes expired cache entries at configured intervals

mod sweeper;

pub use sweeper::{spawn_sweeper_task, MIN_SWEEP_TICK};
