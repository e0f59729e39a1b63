//! Impulse-response catalogs
//!
//! A catalog pairs measured source positions with stereo impulse responses
//! (HRIRs for free-field sets, BRIRs for room sets) and answers
//! nearest-measurement queries:
//! - Bulk load or incremental appends
//! - Playable buffers built once at insertion
//! - Linear nearest-match scan over cached Cartesian points

mod import;

pub use import::CatalogData;

use std::sync::Arc;

use bn_core::StereoBuffer;

use crate::error::{SpatialError, SpatialResult};
use crate::position::{Cartesian, SpatialPosition};

/// Raw stereo impulse response
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    /// Left ear samples
    pub left: Vec<f32>,
    /// Right ear samples
    pub right: Vec<f32>,
}

impl ImpulseResponse {
    pub fn new(left: Vec<f32>, right: Vec<f32>) -> Self {
        Self { left, right }
    }
}

impl From<[Vec<f32>; 2]> for ImpulseResponse {
    fn from([left, right]: [Vec<f32>; 2]) -> Self {
        Self { left, right }
    }
}

/// Single measurement
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    position: SpatialPosition,
    cartesian: Cartesian,
    response: Arc<StereoBuffer>,
}

impl CatalogEntry {
    fn new(position: SpatialPosition, response: Arc<StereoBuffer>) -> Self {
        Self {
            position,
            cartesian: position.to_cartesian(),
            response,
        }
    }

    /// Measured position
    pub fn position(&self) -> SpatialPosition {
        self.position
    }

    /// Playable buffer
    pub fn response(&self) -> &Arc<StereoBuffer> {
        &self.response
    }
}

/// Measured positions and their stereo responses
#[derive(Debug, Clone, Default)]
pub struct ImpulseResponseCatalog {
    /// Sample rate shared by every response
    sample_rate: Option<u32>,
    /// Samples per channel shared by every response
    response_length: Option<usize>,
    /// Measurements in insertion order
    entries: Vec<CatalogEntry>,
}

impl ImpulseResponseCatalog {
    /// Create empty catalog without parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty catalog ready for `add_position`
    pub fn with_parameters(sample_rate: u32, response_length: usize) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            response_length: Some(response_length),
            entries: Vec::new(),
        }
    }

    /// Build catalog from aligned positions and responses
    pub fn from_parts(
        sample_rate: u32,
        response_length: usize,
        positions: Vec<SpatialPosition>,
        responses: Vec<ImpulseResponse>,
    ) -> SpatialResult<Self> {
        let mut catalog = Self::new();
        catalog.load(sample_rate, response_length, positions, responses)?;
        Ok(catalog)
    }

    /// Set sample rate and response length
    ///
    /// Fails when existing entries were built with another length.
    pub fn set_parameters(&mut self, sample_rate: u32, response_length: usize) -> SpatialResult<()> {
        if !self.entries.is_empty() && self.response_length != Some(response_length) {
            return Err(SpatialError::Config(format!(
                "catalog holds {} entries of length {:?}, cannot switch to {}",
                self.entries.len(),
                self.response_length,
                response_length
            )));
        }
        self.sample_rate = Some(sample_rate);
        self.response_length = Some(response_length);
        Ok(())
    }

    /// Replace all entries
    ///
    /// Leaves the catalog untouched on error.
    pub fn load(
        &mut self,
        sample_rate: u32,
        response_length: usize,
        positions: Vec<SpatialPosition>,
        responses: Vec<ImpulseResponse>,
    ) -> SpatialResult<()> {
        if positions.len() != responses.len() {
            return Err(SpatialError::Config(format!(
                "{} positions but {} responses",
                positions.len(),
                responses.len()
            )));
        }

        for (i, response) in responses.iter().enumerate() {
            Self::check_length(i, response, response_length)?;
        }

        let entries = positions
            .into_iter()
            .zip(responses)
            .map(|(position, response)| {
                CatalogEntry::new(position, Self::playable(sample_rate, response))
            })
            .collect();

        self.sample_rate = Some(sample_rate);
        self.response_length = Some(response_length);
        self.entries = entries;

        log::debug!(
            "catalog loaded: {} responses, {} samples @ {} Hz",
            self.entries.len(),
            response_length,
            sample_rate
        );
        Ok(())
    }

    /// Append one measurement
    ///
    /// Requires parameters to be set. Only the channel lengths are checked.
    pub fn add_position(
        &mut self,
        position: SpatialPosition,
        response: ImpulseResponse,
    ) -> SpatialResult<()> {
        let (Some(sample_rate), Some(response_length)) = (self.sample_rate, self.response_length)
        else {
            return Err(SpatialError::Config(
                "sample rate and response length must be set before add_position".into(),
            ));
        };

        Self::check_length(self.entries.len(), &response, response_length)?;
        self.entries
            .push(CatalogEntry::new(position, Self::playable(sample_rate, response)));
        Ok(())
    }

    fn check_length(index: usize, response: &ImpulseResponse, expected: usize) -> SpatialResult<()> {
        if response.left.len() != expected || response.right.len() != expected {
            return Err(SpatialError::Config(format!(
                "response {index}: channel lengths {}/{} differ from response length {expected}",
                response.left.len(),
                response.right.len()
            )));
        }
        Ok(())
    }

    fn playable(sample_rate: u32, response: ImpulseResponse) -> Arc<StereoBuffer> {
        Arc::new(StereoBuffer::new(sample_rate, response.left, response.right))
    }

    /// Negate every stored azimuth
    ///
    /// For sets measured with the opposite rotation sense.
    pub fn mirror_azimuth(&mut self) {
        for entry in &mut self.entries {
            *entry = CatalogEntry::new(entry.position.mirrored(), Arc::clone(&entry.response));
        }
    }

    /// Index of the measurement nearest to the query
    ///
    /// Ties resolve to the lowest index.
    pub fn closest_index(&self, azimuth: f32, elevation: f32, distance: f32) -> SpatialResult<usize> {
        self.nearest(&SpatialPosition::new(azimuth, elevation, distance))
    }

    /// Position of the nearest measurement
    pub fn closest_position(
        &self,
        azimuth: f32,
        elevation: f32,
        distance: f32,
    ) -> SpatialResult<SpatialPosition> {
        let index = self.closest_index(azimuth, elevation, distance)?;
        Ok(self.entries[index].position)
    }

    /// Playable buffer of the nearest measurement
    pub fn closest_response(
        &self,
        azimuth: f32,
        elevation: f32,
        distance: f32,
    ) -> SpatialResult<Arc<StereoBuffer>> {
        let index = self.closest_index(azimuth, elevation, distance)?;
        Ok(Arc::clone(&self.entries[index].response))
    }

    /// Nearest measurement to a position
    pub fn nearest(&self, position: &SpatialPosition) -> SpatialResult<usize> {
        let target = position.to_cartesian();

        let mut entries = self.entries.iter().enumerate();
        let (_, first) = entries.next().ok_or(SpatialError::EmptyCatalog)?;

        let mut best_index = 0;
        let mut best_delta = first.cartesian.distance_to(&target);

        for (i, entry) in entries {
            let delta = entry.cartesian.distance_to(&target);
            if delta < best_delta {
                best_delta = delta;
                best_index = i;
            }
        }

        Ok(best_index)
    }

    /// Entry by index
    pub fn entry(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    /// Measured positions in order
    pub fn positions(&self) -> impl Iterator<Item = SpatialPosition> + '_ {
        self.entries.iter().map(|e| e.position)
    }

    /// Number of measurements
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn response_length(&self) -> Option<usize> {
        self.response_length
    }

    /// `[measurements, receivers, samples per measurement]`
    pub fn dimensions(&self) -> [usize; 3] {
        [self.entries.len(), 2, self.response_length.unwrap_or(0)]
    }
}
