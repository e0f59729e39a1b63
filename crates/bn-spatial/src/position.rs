//! Source position types

use serde::{Deserialize, Serialize};

use crate::error::{SpatialError, SpatialResult};

/// Source position relative to the listener
///
/// Angles are plain degrees with no wraparound: `370°` and `10°` are distinct
/// values that map to the same Cartesian point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialPosition {
    /// Azimuth in degrees
    pub azimuth: f32,
    /// Elevation in degrees
    pub elevation: f32,
    /// Distance from listener (must stay positive)
    pub distance: f32,
}

impl SpatialPosition {
    /// Create new position
    pub fn new(azimuth: f32, elevation: f32, distance: f32) -> Self {
        Self {
            azimuth,
            elevation,
            distance,
        }
    }

    /// Check coordinates are finite and distance is positive
    pub fn validate(&self) -> SpatialResult<()> {
        if !self.azimuth.is_finite() || !self.elevation.is_finite() {
            return Err(SpatialError::InvalidPosition(format!(
                "non-finite angle (azimuth {}, elevation {})",
                self.azimuth, self.elevation
            )));
        }
        if !self.distance.is_finite() || self.distance <= 0.0 {
            return Err(SpatialError::InvalidPosition(format!(
                "distance must be positive, got {}",
                self.distance
            )));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Same position with azimuth sign flipped
    pub fn mirrored(&self) -> Self {
        Self::new(-self.azimuth, self.elevation, self.distance)
    }

    /// Convert to Cartesian coordinates
    ///
    /// `x = d·cos(el)·cos(az)`, `y = d·cos(el)·sin(az)`, `z = d·sin(el)`
    pub fn to_cartesian(&self) -> Cartesian {
        let az = (self.azimuth as f64).to_radians();
        let el = (self.elevation as f64).to_radians();
        let d = self.distance as f64;

        let cos_el = el.cos();

        Cartesian {
            x: d * cos_el * az.cos(),
            y: d * cos_el * az.sin(),
            z: d * el.sin(),
        }
    }
}

impl Default for SpatialPosition {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

impl From<[f32; 3]> for SpatialPosition {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Cartesian point used for nearest-match search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Cartesian {
    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}
