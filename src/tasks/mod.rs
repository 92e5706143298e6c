//! Background Tasks Module
//!
//! Periodic maintenance for the memory store.
//!
//! # Tasks
//! - TTL Cleanup: Drops stale entries and abandoned locks at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
