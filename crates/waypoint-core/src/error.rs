//! Error types for Waypoint

use thiserror::Error;

/// Top-level error type for the core crate
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Errors related to simulated time
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Clock cannot move backwards (current: {current}, requested: {requested})")]
    NonMonotonic { current: f64, requested: f64 },

    #[error("Clock value must be finite, got {0}")]
    NotFinite(f64),
}
