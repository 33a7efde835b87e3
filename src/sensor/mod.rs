//! Sensor module
//!
//! Turns accelerometer samples into pitch/roll, applies the calibration
//! zero point and tracks the critical-angle alert.

mod error;
mod orientation;
pub mod sampler;
mod source;
mod tracker;

pub use error::SensorError;
pub use orientation::Orientation;
pub use source::SimulatedSource;
pub use tracker::{AlertChange, OrientationTracker};
