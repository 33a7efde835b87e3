//! Accelerometer sources polled by the sampler

use std::f64::consts::TAU;

use super::error::SensorError;
use super::orientation::Accel;
use crate::config::SensorConfig;

/// Anything that can hand out accelerometer samples
pub trait AccelSource: Send {
    fn read(&mut self) -> Result<Accel, SensorError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Simulated sensor on a slowly swaying mount.
///
/// Deterministic: the n-th read always yields the same sample for the
/// same parameters, so tests and demos are reproducible.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    mount_pitch: f64,
    mount_roll: f64,
    sway_pitch: f64,
    sway_roll: f64,
    period_ms: u64,
    step_ms: u64,
    elapsed_ms: u64,
}

impl SimulatedSource {
    pub const fn new(mount_pitch: f64, mount_roll: f64) -> Self {
        Self {
            mount_pitch,
            mount_roll,
            sway_pitch: 0.0,
            sway_roll: 0.0,
            period_ms: 0,
            step_ms: 0,
            elapsed_ms: 0,
        }
    }

    /// Sinusoidal sway; roll leads pitch by a quarter period
    #[must_use]
    pub fn with_sway(mut self, pitch: f64, roll: f64, period_ms: u64, step_ms: u64) -> Self {
        self.sway_pitch = pitch;
        self.sway_roll = roll;
        self.period_ms = period_ms;
        self.step_ms = step_ms;
        self
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        Self::new(config.mount_pitch, config.mount_roll).with_sway(
            config.sway_pitch,
            config.sway_roll,
            config.sway_period_ms,
            config.sample_interval_ms,
        )
    }

    fn phase(&self) -> f64 {
        if self.period_ms == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = (self.elapsed_ms % self.period_ms) as f64 / self.period_ms as f64;
        fraction * TAU
    }

    /// Angles the next read will report
    pub fn tilt(&self) -> (f64, f64) {
        let phase = self.phase();
        (
            self.sway_pitch.mul_add(phase.sin(), self.mount_pitch),
            self.sway_roll.mul_add(phase.cos(), self.mount_roll),
        )
    }
}

impl AccelSource for SimulatedSource {
    fn read(&mut self) -> Result<Accel, SensorError> {
        let (pitch, roll) = self.tilt();
        self.elapsed_ms = self.elapsed_ms.wrapping_add(self.step_ms);
        Ok(Accel::from_tilt(pitch, roll))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
