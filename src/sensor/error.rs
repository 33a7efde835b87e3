//! Error types for the sensor pipeline

use thiserror::Error;

/// Errors raised while reading or interpreting orientation samples
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// A sample was produced but cannot be turned into angles
    #[error("Invalid sample: {0}")]
    InvalidSample(String),
}
