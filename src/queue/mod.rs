//! Queue management for the matchmaking pools
//!
//! One queue per mode, each guarded by its own async mutex so that joins,
//! leaves, and the dequeue-on-full handoff are mutually exclusive.

pub mod manager;

// Re-export commonly used types
pub use manager::{AdmitOutcome, QueueManager};
