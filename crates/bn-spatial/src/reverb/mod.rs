//! Reverberators
//!
//! Anything inserted between a source's spatializer and its output:
//! - [`SchroederNetwork`]: synthetic all-pass network, direction independent
//! - [`CrossfadeSpatializer`](crate::CrossfadeSpatializer) driven by a BRIR
//!   catalog: measured room response following the source

mod schroeder;

pub use schroeder::{AllPassSection, SchroederNetwork};

use bn_core::{AudioGraphNode, AudioHost};

use crate::error::SpatialResult;
use crate::position::SpatialPosition;

/// Reverberator capability of a source graph
pub trait Reverberator: AudioGraphNode + Send {
    /// Follow the source position; `false` when the update was dropped
    fn set_position(&mut self, host: &mut dyn AudioHost, position: SpatialPosition) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Stop attenuating by distance; the source graph applies the law once
    fn bypass_distance_law(&mut self, _host: &mut dyn AudioHost) -> SpatialResult<()> {
        Ok(())
    }
}
