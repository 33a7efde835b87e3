// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub sensor: SensorConfig,
    pub health: HealthConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Seconds to wait for open connections after shutdown is requested
    pub shutdown_grace: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level: error, warn, info or debug
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common or json)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Where orientation samples come from
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Built-in simulated accelerometer, polled by the sampler
    Simulated,
    /// Angles are pushed by a remote node via `POST /data`
    Push,
}

/// Sensor and tracker configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SensorConfig {
    pub source: SourceKind,
    pub sample_interval_ms: u64,
    /// Low-pass factor in (0, 1]; 1 disables smoothing
    pub smoothing: f64,
    /// Tilt in degrees above which a reading is flagged
    pub critical_angle: f64,
    pub sway_pitch: f64,
    pub sway_roll: f64,
    pub sway_period_ms: u64,
    pub mount_pitch: f64,
    pub mount_roll: f64,
}

/// Health check configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthConfig {
    pub enabled: bool,
    pub path: String,
}
