//! Accelerometer samples and the pitch/roll angles derived from them

use serde::Serialize;

use super::error::SensorError;

/// One accelerometer sample, in g
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accel {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Accel {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Gravity vector seen by a sensor tilted by `pitch` and `roll` degrees
    pub fn from_tilt(pitch: f64, roll: f64) -> Self {
        let (sp, cp) = pitch.to_radians().sin_cos();
        let (sr, cr) = roll.to_radians().sin_cos();
        Self::new(-sp, cp * sr, cp * cr)
    }
}

/// Orientation in degrees
///
/// Pitch is rotation about the lateral axis, roll about the longitudinal axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
}

impl Orientation {
    pub const fn new(pitch: f64, roll: f64) -> Self {
        Self { pitch, roll }
    }

    /// Tilt angles from the direction of gravity.
    ///
    /// Only valid while the sensor is roughly static; linear acceleration
    /// shows up as tilt.
    pub fn from_accel(a: Accel) -> Result<Self, SensorError> {
        if !(a.x.is_finite() && a.y.is_finite() && a.z.is_finite()) {
            return Err(SensorError::InvalidSample(format!(
                "non-finite axis in ({}, {}, {})",
                a.x, a.y, a.z
            )));
        }
        if a.x == 0.0 && a.y == 0.0 && a.z == 0.0 {
            return Err(SensorError::InvalidSample("zero gravity vector".to_string()));
        }

        let roll = a.y.atan2(a.z).to_degrees();
        let pitch = (-a.x).atan2(a.y.hypot(a.z)).to_degrees();
        Ok(Self { pitch, roll })
    }

    /// Largest absolute angle of the two
    pub fn max_tilt(&self) -> f64 {
        self.pitch.abs().max(self.roll.abs())
    }

    pub fn offset_by(&self, zero: &Self) -> Self {
        Self {
            pitch: self.pitch - zero.pitch,
            roll: self.roll - zero.roll,
        }
    }
}

/// Two-decimal text as shown on the page, without a `-0.00`
pub fn format_angle(degrees: f64) -> String {
    let rounded = (degrees * 100.0).round() / 100.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.2}")
}
