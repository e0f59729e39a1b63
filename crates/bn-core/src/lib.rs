//! bn-core: host audio primitives for Binaura
//!
//! The spatialization layer never touches samples. It asks the host runtime
//! for gain stages, delay lines and convolution stages, wires them together
//! and schedules their parameters. This crate defines that contract:
//!
//! - [`AudioHost`]: primitive factory, routing and scheduled parameter writes
//! - [`AudioGraphNode`]: flat capability for composite nodes
//! - [`ParamTimeline`]: evaluation of scheduled parameter events
//! - [`RecordingHost`]: offline host with a simulated clock

mod automation;
mod buffer;
mod error;
mod graph;
mod offline;

pub use automation::{CurveType, ParamEvent, ParamTimeline};
pub use buffer::StereoBuffer;
pub use error::{CoreError, CoreResult};
pub use graph::{
    AudioGraphNode, AudioHost, ConvolutionHandle, DelayHandle, GainHandle, NodeId, NodeKind,
    ParamChange,
};
pub use offline::RecordingHost;
