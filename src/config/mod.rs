// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

use config::{ConfigError, Environment, Source};

// Re-export public types
pub use state::AppState;
pub use types::{Config, SensorConfig, SourceKind};

/// Environment variable prefix, e.g. `TILT_SERVER__PORT=9000`
const ENV_PREFIX: &str = "TILT";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        Self::assemble(
            config::File::with_name(config_path).required(false),
            environment(),
        )
    }

    /// Build a configuration from defaults, one file-like source and the environment
    fn assemble<S>(file: S, env: Environment) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.shutdown_grace", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "tilt-monitor")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 4096)?
            .set_default("sensor.source", "simulated")?
            .set_default("sensor.sample_interval_ms", 100)?
            .set_default("sensor.smoothing", 0.2)?
            .set_default("sensor.critical_angle", 15.0)?
            .set_default("sensor.sway_pitch", 3.0)?
            .set_default("sensor.sway_roll", 6.0)?
            .set_default("sensor.sway_period_ms", 8000)?
            .set_default("sensor.mount_pitch", 1.5)?
            .set_default("sensor.mount_roll", -2.0)?
            .set_default("health.enabled", true)?
            .set_default("health.path", "/healthz")?
            .add_source(file)
            .add_source(env)
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the tracker and sampler cannot work with
    fn validate(&self) -> Result<(), ConfigError> {
        let sensor = &self.sensor;
        if !(sensor.smoothing > 0.0 && sensor.smoothing <= 1.0) {
            return Err(ConfigError::Message(format!(
                "sensor.smoothing must be in (0, 1], got {}",
                sensor.smoothing
            )));
        }
        if sensor.sample_interval_ms == 0 {
            return Err(ConfigError::Message(
                "sensor.sample_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !(sensor.critical_angle.is_finite() && sensor.critical_angle > 0.0) {
            return Err(ConfigError::Message(format!(
                "sensor.critical_angle must be a positive number of degrees, got {}",
                sensor.critical_angle
            )));
        }
        if !self.health.path.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "health.path must start with '/', got '{}'",
                self.health.path
            )));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Configuration from an inline TOML snippet on top of the defaults,
/// isolated from the process environment
#[cfg(test)]
pub fn from_toml(toml: &str) -> Result<Config, ConfigError> {
    from_toml_with_env(toml, config::Map::new())
}

#[cfg(test)]
pub fn from_toml_with_env(
    toml: &str,
    vars: config::Map<String, String>,
) -> Result<Config, ConfigError> {
    Config::assemble(
        config::File::from_str(toml, config::FileFormat::Toml),
        environment().source(Some(vars)),
    )
}
