//! Offline recording host
//!
//! An [`AudioHost`] that renders nothing and records everything: the node
//! registry, the connection set, every scheduled parameter event and the
//! response loaded into each convolution stage. The clock only moves when
//! told to, which makes transition timing fully deterministic.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::StereoBuffer;
use crate::automation::{ParamEvent, ParamTimeline};
use crate::error::{CoreError, CoreResult};
use crate::graph::{
    AudioHost, ConvolutionHandle, DelayHandle, GainHandle, NodeId, NodeKind, ParamChange,
};

/// Recorded node state
#[derive(Debug, Clone)]
struct NodeEntry {
    kind: NodeKind,
    /// Gain or delay-time lane (unused for convolvers)
    param: ParamTimeline,
    /// Delay capacity in seconds
    max_delay: f64,
    /// Response loaded into a convolver
    response: Option<Arc<StereoBuffer>>,
}

/// In-memory host with a manually driven clock
#[derive(Debug, Clone)]
pub struct RecordingHost {
    sample_rate: u32,
    time: f64,
    nodes: Vec<NodeEntry>,
    edges: BTreeSet<(NodeId, NodeId)>,
}

impl RecordingHost {
    /// Create host at time zero
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            time: 0.0,
            nodes: Vec::new(),
            edges: BTreeSet::new(),
        }
    }

    /// Move clock forward by `seconds` (negative values are ignored)
    pub fn advance(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.time += seconds;
        }
    }

    /// Jump clock to absolute time
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Number of created nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live connections
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Kind of a node
    pub fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(node.0 as usize).map(|n| n.kind)
    }

    /// Is `from -> to` connected
    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.contains(&(from, to))
    }

    /// Destinations fed by `from`
    pub fn outputs_of(&self, from: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(src, _)| *src == from)
            .map(|&(_, dst)| dst)
            .collect()
    }

    /// Sources feeding `to`
    pub fn inputs_of(&self, to: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(_, dst)| *dst == to)
            .map(|&(src, _)| src)
            .collect()
    }

    /// Scheduled events of a gain or delay node
    pub fn timeline(&self, node: NodeId) -> Option<&ParamTimeline> {
        self.nodes
            .get(node.0 as usize)
            .filter(|n| n.kind != NodeKind::Convolver)
            .map(|n| &n.param)
    }

    /// Gain value at `time`
    pub fn gain_at(&self, gain: GainHandle, time: f64) -> Option<f32> {
        self.timeline(gain.node()).map(|lane| lane.value_at(time))
    }

    /// Gain value at the current clock time
    pub fn gain_now(&self, gain: GainHandle) -> Option<f32> {
        self.gain_at(gain, self.time)
    }

    /// Delay time at the current clock time
    pub fn delay_time_now(&self, delay: DelayHandle) -> Option<f32> {
        self.timeline(delay.node()).map(|lane| lane.value_at(self.time))
    }

    /// Response currently loaded into a convolver
    pub fn response_of(&self, convolver: ConvolutionHandle) -> Option<&Arc<StereoBuffer>> {
        self.nodes
            .get(convolver.node().0 as usize)
            .and_then(|n| n.response.as_ref())
    }

    fn add_node(&mut self, kind: NodeKind, initial: f32, max_delay: f64) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeEntry {
            kind,
            param: ParamTimeline::new(initial),
            max_delay,
            response: None,
        });
        id
    }

    fn entry_mut(&mut self, node: NodeId, expected: NodeKind) -> CoreResult<&mut NodeEntry> {
        let entry = self
            .nodes
            .get_mut(node.0 as usize)
            .ok_or(CoreError::UnknownNode(node))?;
        if entry.kind != expected {
            return Err(CoreError::KindMismatch { node, expected });
        }
        Ok(entry)
    }

    fn check_exists(&self, node: NodeId) -> CoreResult<()> {
        if (node.0 as usize) < self.nodes.len() {
            Ok(())
        } else {
            Err(CoreError::UnknownNode(node))
        }
    }

    fn check_change(change: &ParamChange) -> CoreResult<()> {
        if !change.value().is_finite() {
            return Err(CoreError::InvalidParam(format!(
                "non-finite value {}",
                change.value()
            )));
        }
        if let Some(time) = change.completes_at() {
            if !time.is_finite() || time < 0.0 {
                return Err(CoreError::InvalidParam(format!("invalid event time {time}")));
            }
        }
        Ok(())
    }
}

impl AudioHost for RecordingHost {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn create_gain(&mut self, initial: f32) -> GainHandle {
        GainHandle(self.add_node(NodeKind::Gain, initial, 0.0))
    }

    fn create_delay(&mut self, max_delay: f64) -> DelayHandle {
        DelayHandle(self.add_node(NodeKind::Delay, 0.0, max_delay.max(0.0)))
    }

    fn create_convolver(&mut self) -> ConvolutionHandle {
        ConvolutionHandle(self.add_node(NodeKind::Convolver, 0.0, 0.0))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> CoreResult<()> {
        self.check_exists(from)?;
        self.check_exists(to)?;
        if self.edges.insert((from, to)) {
            log::trace!("connect {from} -> {to}");
        }
        Ok(())
    }

    fn disconnect(&mut self, from: NodeId, to: NodeId) -> CoreResult<()> {
        self.check_exists(from)?;
        self.check_exists(to)?;
        if !self.edges.remove(&(from, to)) {
            return Err(CoreError::NotConnected { from, to });
        }
        log::trace!("disconnect {from} -> {to}");
        Ok(())
    }

    fn set_gain(&mut self, gain: GainHandle, change: ParamChange) -> CoreResult<()> {
        Self::check_change(&change)?;
        let now = self.time;
        let entry = self.entry_mut(gain.node(), NodeKind::Gain)?;
        entry.param.push(ParamEvent::from_change(change, now));
        Ok(())
    }

    fn cancel_scheduled_values(&mut self, gain: GainHandle, from_time: f64) -> CoreResult<()> {
        if !from_time.is_finite() {
            return Err(CoreError::InvalidParam(format!(
                "invalid cancel time {from_time}"
            )));
        }
        let entry = self.entry_mut(gain.node(), NodeKind::Gain)?;
        entry.param.cancel_from(from_time);
        Ok(())
    }

    fn set_delay_time(&mut self, delay: DelayHandle, change: ParamChange) -> CoreResult<()> {
        Self::check_change(&change)?;
        let now = self.time;
        let entry = self.entry_mut(delay.node(), NodeKind::Delay)?;
        // Compared at parameter precision
        let seconds = change.value();
        if seconds < 0.0 || seconds > entry.max_delay as f32 {
            return Err(CoreError::InvalidParam(format!(
                "delay {seconds}s outside 0..={}s",
                entry.max_delay
            )));
        }
        entry.param.push(ParamEvent::from_change(change, now));
        Ok(())
    }

    fn set_response(
        &mut self,
        convolver: ConvolutionHandle,
        buffer: Arc<StereoBuffer>,
    ) -> CoreResult<()> {
        let entry = self.entry_mut(convolver.node(), NodeKind::Convolver)?;
        entry.response = Some(buffer);
        Ok(())
    }
}
