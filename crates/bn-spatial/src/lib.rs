//! Binaura spatialization
//!
//! Places sources around a listener using measured binaural responses:
//!
//! ## Catalogs
//! - HRIR/BRIR measurement sets with nearest-match lookup
//! - JSON import (`sampleRate`, `dimensions`, `positions`, `impulseResponses`)
//!
//! ## Crossfade Spatializer
//! - Two convolution paths, one audible at a time
//! - Time-gated filter swaps with linear or stepped fades
//! - Inverse-square distance attenuation
//!
//! ## Reverberators
//! - Schroeder all-pass network from host gain/delay primitives
//! - Measured room response through a second spatializer
//!
//! Everything runs on the control path against a host [`AudioHost`]; the host
//! renders audio and owns the clock.

pub mod catalog;
pub mod config;
pub mod crossfade;
pub mod reverb;
pub mod source;

mod error;
mod position;

pub use catalog::{CatalogData, CatalogEntry, ImpulseResponse, ImpulseResponseCatalog};
pub use config::{
    CrossfadeConfig, DEFAULT_TRANSITION_TIME, DistanceLaw, RampShape, SchroederConfig,
    SourceConfig, SpatialConfig,
};
pub use crossfade::CrossfadeSpatializer;
pub use error::{SpatialError, SpatialResult};
pub use position::{Cartesian, SpatialPosition};
pub use reverb::{AllPassSection, Reverberator, SchroederNetwork};
pub use source::{PositionUpdate, SourceGraph};

pub use bn_core::{AudioGraphNode, AudioHost};
