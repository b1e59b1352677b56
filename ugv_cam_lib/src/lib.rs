//! # UGV Camera Library
//!
//! Shared types and utilities for the UGV camera agent.
//! Everything here is pure: command/telemetry schemas, the fused state
//! snapshot, differential-drive kinematics and pinhole camera projection.

pub mod types;
pub mod utils;

// Re-export everything for convenience
pub use types::*;
pub use utils::*;
