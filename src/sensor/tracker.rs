//! Orientation tracker
//!
//! Holds the latest smoothed orientation, the calibration zero point and
//! the critical-angle alert state. Shared between the sampler task and
//! the HTTP handlers behind an `Arc`.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use super::error::SensorError;
use super::orientation::{format_angle, Accel, Orientation};
use crate::config::SensorConfig;

/// Payload served on `/data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub pitch: String,
    pub roll: String,
    /// Either angle is beyond the critical angle
    pub alert: bool,
    /// A calibration zero point is active
    pub calibrated: bool,
}

/// Payload served on `/calibrate`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub status: &'static str,
    pub calibrated: bool,
    pub pitch_offset: f64,
    pub roll_offset: f64,
}

/// Edge of the critical-angle alert
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertChange {
    Raised(Orientation),
    Cleared(Orientation),
}

#[derive(Debug, Default)]
struct TrackerState {
    /// Smoothed orientation before calibration; `None` until the first sample
    raw: Option<Orientation>,
    zero: Orientation,
    calibrated: bool,
    alert: bool,
}

impl TrackerState {
    fn current(&self) -> Orientation {
        self.raw.unwrap_or_default().offset_by(&self.zero)
    }
}

pub struct OrientationTracker {
    state: RwLock<TrackerState>,
    smoothing: f64,
    critical_angle: f64,
}

impl OrientationTracker {
    pub fn new(smoothing: f64, critical_angle: f64) -> Self {
        Self {
            state: RwLock::new(TrackerState::default()),
            smoothing: smoothing.clamp(f64::MIN_POSITIVE, 1.0),
            critical_angle,
        }
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        Self::new(config.smoothing, config.critical_angle)
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed one accelerometer sample through the low-pass filter
    pub fn ingest_accel(&self, sample: Accel) -> Result<Option<AlertChange>, SensorError> {
        let fresh = Orientation::from_accel(sample)?;
        let mut state = self.write();
        let smoothed = match state.raw {
            None => fresh,
            Some(prev) => Orientation::new(
                prev.pitch + self.smoothing * (fresh.pitch - prev.pitch),
                prev.roll + self.smoothing * (fresh.roll - prev.roll),
            ),
        };
        state.raw = Some(smoothed);
        Ok(self.update_alert(&mut state))
    }

    /// Overwrite raw angles pushed by a remote node; missing angles keep their value
    pub fn ingest_angles(
        &self,
        pitch: Option<f64>,
        roll: Option<f64>,
    ) -> Result<Option<AlertChange>, SensorError> {
        if pitch.is_none() && roll.is_none() {
            return Err(SensorError::InvalidSample(
                "expected at least one of pitch or roll".to_string(),
            ));
        }
        if pitch.is_some_and(|p| !p.is_finite()) || roll.is_some_and(|r| !r.is_finite()) {
            return Err(SensorError::InvalidSample("angles must be finite".to_string()));
        }

        let mut state = self.write();
        let prev = state.raw.unwrap_or_default();
        state.raw = Some(Orientation::new(
            pitch.unwrap_or(prev.pitch),
            roll.unwrap_or(prev.roll),
        ));
        Ok(self.update_alert(&mut state))
    }

    fn update_alert(&self, state: &mut TrackerState) -> Option<AlertChange> {
        let current = state.current();
        let critical = current.max_tilt() > self.critical_angle;
        match (state.alert, critical) {
            (false, true) => {
                state.alert = true;
                Some(AlertChange::Raised(current))
            }
            (true, false) => {
                state.alert = false;
                Some(AlertChange::Cleared(current))
            }
            _ => None,
        }
    }

    /// Take the current orientation as the new zero point.
    ///
    /// A raised alert clears, since the calibrated angles are now level.
    pub fn calibrate(&self) -> (CalibrationReport, Option<AlertChange>) {
        let mut state = self.write();
        state.zero = state.raw.unwrap_or_default();
        state.calibrated = true;
        let change = self.update_alert(&mut state);
        (report(&state), change)
    }

    /// Drop the zero point; the raw tilt may now be critical
    pub fn reset_calibration(&self) -> (CalibrationReport, Option<AlertChange>) {
        let mut state = self.write();
        state.zero = Orientation::default();
        state.calibrated = false;
        let change = self.update_alert(&mut state);
        (report(&state), change)
    }

    /// Calibrated orientation
    #[cfg(test)]
    pub fn orientation(&self) -> Orientation {
        self.read().current()
    }

    pub fn reading(&self) -> Reading {
        let state = self.read();
        let current = state.current();
        Reading {
            pitch: format_angle(current.pitch),
            roll: format_angle(current.roll),
            alert: state.alert,
            calibrated: state.calibrated,
        }
    }

    pub fn has_samples(&self) -> bool {
        self.read().raw.is_some()
    }
}

fn report(state: &TrackerState) -> CalibrationReport {
    CalibrationReport {
        status: "OK",
        calibrated: state.calibrated,
        pitch_offset: state.zero.pitch,
        roll_offset: state.zero.roll,
    }
}
