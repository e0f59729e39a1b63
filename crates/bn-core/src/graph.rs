//! Host audio graph interface
//!
//! The real-time runtime owns the actual signal processing. This module
//! describes what the spatialization layer needs from it:
//! - Gain stages, delay lines and convolution stages as opaque nodes
//! - Directed connections between nodes
//! - Parameter writes that can be scheduled at a future time
//!
//! All calls happen on the control path, between render callbacks.

use std::fmt;
use std::sync::Arc;

use crate::StereoBuffer;
use crate::error::CoreResult;

/// Opaque node identifier issued by a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of primitive behind a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Gain,
    Delay,
    Convolver,
}

/// Gain stage handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GainHandle(pub NodeId);

/// Delay line handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelayHandle(pub NodeId);

/// Convolution stage handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConvolutionHandle(pub NodeId);

macro_rules! impl_handle {
    ($($handle:ident),*) => {
        $(
            impl $handle {
                /// Underlying graph node
                #[inline]
                pub fn node(self) -> NodeId {
                    self.0
                }
            }

            impl From<$handle> for NodeId {
                fn from(handle: $handle) -> Self {
                    handle.0
                }
            }
        )*
    };
}

impl_handle!(GainHandle, DelayHandle, ConvolutionHandle);

/// Parameter write, optionally scheduled on the host clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange {
    /// Take effect now
    Immediate(f32),
    /// Jump to `value` at `time` seconds
    SetAtTime { value: f32, time: f64 },
    /// Ramp linearly from the previous event to `value`, reaching it at `end_time`
    LinearRampTo { value: f32, end_time: f64 },
}

impl ParamChange {
    /// Target value of the change
    pub fn value(&self) -> f32 {
        match *self {
            ParamChange::Immediate(value) => value,
            ParamChange::SetAtTime { value, .. } => value,
            ParamChange::LinearRampTo { value, .. } => value,
        }
    }

    /// Time the change is complete (None = immediately)
    pub fn completes_at(&self) -> Option<f64> {
        match *self {
            ParamChange::Immediate(_) => None,
            ParamChange::SetAtTime { time, .. } => Some(time),
            ParamChange::LinearRampTo { end_time, .. } => Some(end_time),
        }
    }
}

/// Audio primitives supplied by the host runtime
pub trait AudioHost: Send {
    /// Current time of the host clock in seconds
    fn current_time(&self) -> f64;

    /// Render sample rate
    fn sample_rate(&self) -> u32;

    /// Create gain stage with initial gain
    fn create_gain(&mut self, initial: f32) -> GainHandle;

    /// Create delay line able to hold `max_delay` seconds
    fn create_delay(&mut self, max_delay: f64) -> DelayHandle;

    /// Create convolution stage (no response loaded)
    fn create_convolver(&mut self) -> ConvolutionHandle;

    /// Route output of `from` into input of `to`
    fn connect(&mut self, from: NodeId, to: NodeId) -> CoreResult<()>;

    /// Remove route `from -> to`
    fn disconnect(&mut self, from: NodeId, to: NodeId) -> CoreResult<()>;

    /// Write gain parameter
    fn set_gain(&mut self, gain: GainHandle, change: ParamChange) -> CoreResult<()>;

    /// Drop gain events scheduled at or after `from_time`
    fn cancel_scheduled_values(&mut self, gain: GainHandle, from_time: f64) -> CoreResult<()>;

    /// Write delay time parameter (seconds)
    fn set_delay_time(&mut self, delay: DelayHandle, change: ParamChange) -> CoreResult<()>;

    /// Replace the response a convolution stage convolves against
    fn set_response(
        &mut self,
        convolver: ConvolutionHandle,
        buffer: Arc<StereoBuffer>,
    ) -> CoreResult<()>;
}

/// Composite node capability: one input, connectable output
pub trait AudioGraphNode {
    /// Node that upstream sources connect into
    fn input(&self) -> NodeId;

    /// Connect this node's output to `dest`
    fn connect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()>;

    /// Disconnect this node's output from `dest`
    fn disconnect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()>;
}
