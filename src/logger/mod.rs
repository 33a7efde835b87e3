//! Logger module
//!
//! Provides logging utilities for the monitor including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Sensor, calibration and tilt alert events
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::Level;

use crate::config::Config;
use crate::sensor::{AlertChange, Orientation, SensorError};
use std::net::SocketAddr;
use std::time::Duration;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    let level = config
        .logging
        .level
        .parse::<Level>()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    writer::init(
        level,
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn enabled(level: Level) -> bool {
    writer::get().map_or(level <= Level::Info, |w| w.enabled(level))
}

/// Write to info/access log
fn write_info(level: Level, message: &str) {
    if !enabled(level) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(level: Level, message: &str) {
    if !enabled(level) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info(Level::Info, "======================================");
    write_info(Level::Info, "Tilt monitor started");
    write_info(Level::Info, &format!("Listening on: http://{addr}"));
    write_info(Level::Info, &format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(Level::Info, &format!("Worker threads: {workers}"));
    }
    write_info(
        Level::Info,
        &format!(
            "Sensor source: {:?}, critical angle: {}°",
            config.sensor.source, config.sensor.critical_angle
        ),
    );
    if let Some(ref path) = config.logging.access_log_file {
        write_info(Level::Info, &format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(Level::Info, &format!("Error log: {path}"));
    }
    write_info(Level::Info, "======================================\n");
}

pub fn log_shutdown(open_connections: usize) {
    if open_connections == 0 {
        write_info(Level::Info, "[SHUTDOWN] All connections closed, bye");
    } else {
        write_info(
            Level::Info,
            &format!("[SHUTDOWN] Exiting with {open_connections} connection(s) still open"),
        );
    }
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(Level::Debug, &format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(Level::Error, &format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_info(message: &str) {
    write_info(Level::Info, message);
}

pub fn log_error(message: &str) {
    write_error(Level::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(Level::Warn, &format!("[WARN] {message}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    if !enabled(Level::Info) {
        return;
    }
    let line = entry.format(format);
    match writer::get() {
        Some(w) => w.write_access(&line),
        None => println!("{line}"),
    }
}

pub fn log_sampler_started(source: &str, interval: Duration) {
    write_info(
        Level::Info,
        &format!(
            "[SENSOR] Sampling {source} source every {}ms",
            interval.as_millis()
        ),
    );
}

pub fn log_sampler_stopped(samples: u64, errors: u64) {
    write_info(
        Level::Info,
        &format!("[SENSOR] Sampler stopped after {samples} sample(s), {errors} error(s)"),
    );
}

pub fn log_sensor_error(source: &str, err: &SensorError) {
    write_error(Level::Warn, &format!("[SENSOR] {source}: {err}"));
}

pub fn log_calibrated(pitch_offset: f64, roll_offset: f64) {
    write_info(
        Level::Info,
        &format!("[SENSOR] Calibrated: zero point pitch {pitch_offset:.2}°, roll {roll_offset:.2}°"),
    );
}

pub fn log_alert(change: &AlertChange) {
    match change {
        AlertChange::Raised(o) => write_error(
            Level::Warn,
            &format!("[ALERT] Critical tilt: {}", describe(o)),
        ),
        AlertChange::Cleared(o) => {
            write_info(Level::Info, &format!("[ALERT] Tilt back to normal: {}", describe(o)));
        }
    }
}

fn describe(o: &Orientation) -> String {
    format!("pitch {:.2}°, roll {:.2}°", o.pitch, o.roll)
}
