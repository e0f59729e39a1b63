//! Spatializer and reverberator configuration

use serde::{Deserialize, Serialize};

use crate::error::SpatialResult;

/// Default crossfade duration in seconds
pub const DEFAULT_TRANSITION_TIME: f64 = 0.05;

/// Fader shape used when swapping filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampShape {
    /// Linear gain ramps over the transition
    #[default]
    Linear,
    /// Instant swap at the end of the transition
    Step,
}

/// Level law applied from source distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceLaw {
    /// No distance attenuation
    None,
    /// `1 / d²`
    #[default]
    InverseSquare,
}

impl DistanceLaw {
    /// Gain factor for `distance` (None when no attenuation applies)
    #[inline]
    pub fn gain(self, distance: f32) -> Option<f32> {
        match self {
            DistanceLaw::None => None,
            DistanceLaw::InverseSquare => Some(1.0 / (distance * distance)),
        }
    }
}

/// Crossfade spatializer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    /// Transition time in seconds
    pub transition_time: f64,
    /// Fader ramp shape
    pub ramp: RampShape,
    /// Attenuation applied at the spatializer output
    pub distance_law: DistanceLaw,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            transition_time: DEFAULT_TRANSITION_TIME,
            ramp: RampShape::Linear,
            distance_law: DistanceLaw::InverseSquare,
        }
    }
}

impl CrossfadeConfig {
    /// Same configuration without distance attenuation
    pub fn without_attenuation(self) -> Self {
        Self {
            distance_law: DistanceLaw::None,
            ..self
        }
    }
}

/// Schroeder reverberator configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchroederConfig {
    /// Direct-to-reverberant ratio (> 0)
    pub direct_to_reverberant: f32,
    /// Outer delay in seconds (second section uses a third of it)
    pub delay: f64,
    /// Delay line capacity in seconds
    pub max_delay: f64,
}

impl Default for SchroederConfig {
    fn default() -> Self {
        Self {
            direct_to_reverberant: 0.05,
            delay: 0.015,
            max_delay: 1.0,
        }
    }
}

/// Source graph configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// HRIR spatializer (its own distance law is ignored)
    pub hrir: CrossfadeConfig,
    /// Attenuation applied at the source output, after the reverberator
    pub distance_law: DistanceLaw,
    /// Input volume
    pub volume: f32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            hrir: CrossfadeConfig::default().without_attenuation(),
            distance_law: DistanceLaw::InverseSquare,
            volume: 1.0,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Per-source graph
    pub source: SourceConfig,
    /// Room (BRIR) reverberator spatializer; distance is left to the source
    pub room: CrossfadeConfig,
    /// Schroeder reverberator
    pub schroeder: SchroederConfig,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            room: CrossfadeConfig::default().without_attenuation(),
            schroeder: SchroederConfig::default(),
        }
    }
}

impl SpatialConfig {
    /// Parse from JSON; missing fields take defaults
    pub fn from_json_str(json: &str) -> SpatialResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> SpatialResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
