//! Catalog import format
//!
//! ```json
//! {
//!   "sampleRate": 48000,
//!   "dimensions": [measurements, receivers, samplesPerMeasurement],
//!   "positions": [[azimuth, elevation, distance], ...],
//!   "impulseResponses": [[[left...], [right...]], ...]
//! }
//! ```

use std::io::Read;

use serde::{Deserialize, Serialize};

use super::{ImpulseResponse, ImpulseResponseCatalog};
use crate::error::{SpatialError, SpatialResult};
use crate::position::SpatialPosition;

/// Binaural sets carry one response per ear
const RECEIVER_COUNT: usize = 2;

/// Catalog as delivered by the loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogData {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// `[measurementCount, receiverCount, samplesPerMeasurement]`
    pub dimensions: Vec<usize>,
    /// `[azimuth, elevation, distance]` per measurement
    pub positions: Vec<[f32; 3]>,
    /// `[left, right]` per measurement, aligned with `positions`
    pub impulse_responses: Vec<[Vec<f32>; 2]>,
}

impl CatalogData {
    /// Check shape consistency
    pub fn validate(&self) -> SpatialResult<()> {
        let &[count, receivers, _samples] = self.dimensions.as_slice() else {
            return Err(SpatialError::MalformedCatalog(format!(
                "dimensions must have 3 entries, got {}",
                self.dimensions.len()
            )));
        };

        if receivers != RECEIVER_COUNT {
            return Err(SpatialError::MalformedCatalog(format!(
                "expected {RECEIVER_COUNT} receivers, got {receivers}"
            )));
        }

        if self.positions.len() != self.impulse_responses.len() {
            return Err(SpatialError::MalformedCatalog(format!(
                "{} positions but {} impulse responses",
                self.positions.len(),
                self.impulse_responses.len()
            )));
        }

        if count != self.positions.len() {
            return Err(SpatialError::MalformedCatalog(format!(
                "dimensions declare {count} measurements, found {}",
                self.positions.len()
            )));
        }

        Ok(())
    }
}

impl ImpulseResponseCatalog {
    /// Build catalog from import data
    pub fn from_catalog_data(data: CatalogData) -> SpatialResult<Self> {
        data.validate()?;

        let response_length = data.dimensions[2];
        let positions = data.positions.into_iter().map(SpatialPosition::from).collect();
        let responses = data
            .impulse_responses
            .into_iter()
            .map(ImpulseResponse::from)
            .collect();

        Self::from_parts(data.sample_rate, response_length, positions, responses)
    }

    /// Parse JSON text
    pub fn from_json_str(json: &str) -> SpatialResult<Self> {
        let data: CatalogData = serde_json::from_str(json)?;
        Self::from_catalog_data(data)
    }

    /// Parse JSON from a reader
    ///
    /// Read failures surface as [`SpatialError::Io`], malformed text as
    /// [`SpatialError::Json`].
    pub fn from_json_reader<R: Read>(mut reader: R) -> SpatialResult<Self> {
        let mut json = String::new();
        reader.read_to_string(&mut json)?;
        Self::from_json_str(&json)
    }
}
