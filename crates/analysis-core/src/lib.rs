//! Shared types, errors and statistics for the track-record crates.

pub mod error;
pub mod stats;
pub mod types;

pub use error::*;
pub use types::*;
