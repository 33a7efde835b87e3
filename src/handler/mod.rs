//! Request handler module
//!
//! Routes requests to the monitoring page and the sensor endpoints.

pub mod router;
pub mod sensor_api;

// Re-export main entry point
pub use router::handle_request;
