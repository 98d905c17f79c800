//! Brawl Ladder - skill-rated team matchmaking service
//!
//! This crate provides AMQP-driven matchmaking for community 3v3 ladders:
//! per-mode queues, rating-balanced match formation, vote-based result
//! confirmation with dodge reporting, ELO-style rating updates, and
//! compensating undo of settlements.

pub mod amqp;
pub mod balance;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod metrics;
pub mod player;
pub mod queue;
pub mod rating;
pub mod service;
pub mod team;
pub mod types;
pub mod undo;
pub mod utils;
pub mod vote;

// Re-export commonly used types and traits
pub use error::{LadderError, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EventPublisher;
pub use engine::MatchEngine;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
