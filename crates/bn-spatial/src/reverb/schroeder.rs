//! Schroeder all-pass reverberator
//!
//! Each all-pass stage is built from host primitives:
//!
//! ```text
//!            ┌──────── direct (-g) ─────────┐
//! buffer ────┤                              ├──► out
//!            └─► delay ─┬─► loop (1 - g²) ──┘
//!                ▲      │
//!                └─ feedback (g) ◄┘
//! ```
//!
//! The network nests two sections (delay and delay / 3) inside the outer
//! loop, between its delay line and its feedback/loop taps.

use bn_core::{AudioGraphNode, AudioHost, CoreResult, DelayHandle, GainHandle, NodeId, ParamChange};

use super::Reverberator;
use crate::config::SchroederConfig;
use crate::error::{SpatialError, SpatialResult};
use crate::position::SpatialPosition;

/// Delay ratio between the outer loop and the second section
const SECOND_SECTION_RATIO: f64 = 3.0;

/// Largest f32 below one; huge ratios must not round up to an unstable loop
const MAX_GAIN: f32 = 1.0 - f32::EPSILON / 2.0;

fn validate_delay(delay: f64, max_delay: f64) -> SpatialResult<()> {
    if !delay.is_finite() || delay < 0.0 || delay > max_delay {
        return Err(SpatialError::InvalidParameter(format!(
            "delay must be within 0..={max_delay}s, got {delay}"
        )));
    }
    Ok(())
}

// ============ All-Pass Section ============

/// Single all-pass filter
#[derive(Debug)]
pub struct AllPassSection {
    buffer: GainHandle,
    direct: GainHandle,
    delay: DelayHandle,
    feedback: GainHandle,
    loop_out: GainHandle,
    gain: f32,
    delay_time: f64,
    max_delay: f64,
}

impl AllPassSection {
    /// Create and wire a section
    pub fn new(
        host: &mut dyn AudioHost,
        gain: f32,
        delay: f64,
        max_delay: f64,
    ) -> SpatialResult<Self> {
        Self::validate(gain, delay, max_delay)?;

        let buffer = host.create_gain(1.0);
        let direct = host.create_gain(-gain);
        let delay_node = host.create_delay(max_delay);
        let feedback = host.create_gain(gain);
        let loop_out = host.create_gain(1.0 - gain * gain);

        host.connect(buffer.node(), direct.node())?;
        host.connect(buffer.node(), delay_node.node())?;
        host.connect(feedback.node(), delay_node.node())?;
        host.connect(delay_node.node(), feedback.node())?;
        host.connect(delay_node.node(), loop_out.node())?;

        host.set_delay_time(delay_node, ParamChange::Immediate(delay as f32))?;

        Ok(Self {
            buffer,
            direct,
            delay: delay_node,
            feedback,
            loop_out,
            gain,
            delay_time: delay,
            max_delay,
        })
    }

    fn validate(gain: f32, delay: f64, max_delay: f64) -> SpatialResult<()> {
        if !gain.is_finite() || gain.abs() >= 1.0 {
            return Err(SpatialError::InvalidParameter(format!(
                "all-pass gain must satisfy |g| < 1, got {gain}"
            )));
        }
        validate_delay(delay, max_delay)
    }

    /// Set gain and delay, effective immediately
    pub fn set_parameters(
        &mut self,
        host: &mut dyn AudioHost,
        gain: f32,
        delay: f64,
    ) -> SpatialResult<()> {
        Self::validate(gain, delay, self.max_delay)?;

        host.set_gain(self.direct, ParamChange::Immediate(-gain))?;
        host.set_gain(self.feedback, ParamChange::Immediate(gain))?;
        host.set_gain(self.loop_out, ParamChange::Immediate(1.0 - gain * gain))?;
        host.set_delay_time(self.delay, ParamChange::Immediate(delay as f32))?;

        self.gain = gain;
        self.delay_time = delay;
        Ok(())
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Delay in seconds
    pub fn delay(&self) -> f64 {
        self.delay_time
    }

    /// Output taps: direct and loop
    pub fn outputs(&self) -> [GainHandle; 2] {
        [self.direct, self.loop_out]
    }

    pub fn delay_line(&self) -> DelayHandle {
        self.delay
    }

    pub fn feedback(&self) -> GainHandle {
        self.feedback
    }
}

impl AudioGraphNode for AllPassSection {
    fn input(&self) -> NodeId {
        self.buffer.node()
    }

    fn connect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()> {
        host.connect(self.direct.node(), dest)?;
        host.connect(self.loop_out.node(), dest)
    }

    fn disconnect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()> {
        host.disconnect(self.direct.node(), dest)?;
        host.disconnect(self.loop_out.node(), dest)
    }
}

// ============ Schroeder Network ============

/// Outer all-pass loop around two nested sections
#[derive(Debug)]
pub struct SchroederNetwork {
    buffer: GainHandle,
    direct: GainHandle,
    delay: DelayHandle,
    feedback: GainHandle,
    loop_out: GainHandle,
    sections: [AllPassSection; 2],
    direct_to_reverberant: f32,
    gain: f32,
    loop_gain: f32,
    delay_time: f64,
    max_delay: f64,
}

impl SchroederNetwork {
    /// Create network with configured parameters applied
    pub fn new(host: &mut dyn AudioHost, config: SchroederConfig) -> SpatialResult<Self> {
        let max_delay = config.max_delay;
        if !max_delay.is_finite() || max_delay < 0.0 {
            return Err(SpatialError::InvalidParameter(format!(
                "max delay must be finite and non-negative, got {max_delay}"
            )));
        }
        let (gain, loop_gain) = Self::derive_gains(config.direct_to_reverberant)?;
        validate_delay(config.delay, max_delay)?;

        let buffer = host.create_gain(1.0);
        let direct = host.create_gain(-gain);
        let delay = host.create_delay(max_delay);
        let feedback = host.create_gain(gain);
        let loop_out = host.create_gain(loop_gain);

        let first = AllPassSection::new(host, gain, config.delay, max_delay)?;
        let second = AllPassSection::new(
            host,
            gain,
            config.delay / SECOND_SECTION_RATIO,
            max_delay,
        )?;

        host.connect(buffer.node(), direct.node())?;
        host.connect(buffer.node(), delay.node())?;
        host.connect(feedback.node(), delay.node())?;
        host.connect(delay.node(), first.input())?;
        first.connect(host, second.input())?;
        second.connect(host, feedback.node())?;
        second.connect(host, loop_out.node())?;

        host.set_delay_time(delay, ParamChange::Immediate(config.delay as f32))?;

        Ok(Self {
            buffer,
            direct,
            delay,
            feedback,
            loop_out,
            sections: [first, second],
            direct_to_reverberant: config.direct_to_reverberant,
            gain,
            loop_gain,
            delay_time: config.delay,
            max_delay,
        })
    }

    /// `(g, 1 - g²)` with `g = sqrt(dr / (1 + dr))`
    pub fn derive_gains(direct_to_reverberant: f32) -> SpatialResult<(f32, f32)> {
        let dr = direct_to_reverberant;
        if !dr.is_finite() || dr <= 0.0 {
            return Err(SpatialError::InvalidParameter(format!(
                "direct-to-reverberant ratio must be positive, got {dr}"
            )));
        }
        let ratio = dr as f64;
        let gain = ((ratio / (1.0 + ratio)).sqrt() as f32).min(MAX_GAIN);
        Ok((gain, 1.0 - gain * gain))
    }

    /// Set direct-to-reverberant ratio and delay, effective immediately
    pub fn set_parameters(
        &mut self,
        host: &mut dyn AudioHost,
        direct_to_reverberant: f32,
        delay: f64,
    ) -> SpatialResult<()> {
        let (gain, loop_gain) = Self::derive_gains(direct_to_reverberant)?;
        validate_delay(delay, self.max_delay)?;

        host.set_gain(self.direct, ParamChange::Immediate(-gain))?;
        host.set_gain(self.feedback, ParamChange::Immediate(gain))?;
        host.set_gain(self.loop_out, ParamChange::Immediate(loop_gain))?;
        host.set_delay_time(self.delay, ParamChange::Immediate(delay as f32))?;

        let [first, second] = &mut self.sections;
        first.set_parameters(host, gain, delay)?;
        second.set_parameters(host, gain, delay / SECOND_SECTION_RATIO)?;

        self.direct_to_reverberant = direct_to_reverberant;
        self.gain = gain;
        self.loop_gain = loop_gain;
        self.delay_time = delay;

        log::debug!(
            "schroeder dr={direct_to_reverberant} delay={delay:.4}s -> g={gain:.4} loop={loop_gain:.4}"
        );
        Ok(())
    }

    pub fn direct_to_reverberant(&self) -> f32 {
        self.direct_to_reverberant
    }

    /// All-pass gain `g`
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Loop gain `1 - g²`
    pub fn loop_gain(&self) -> f32 {
        self.loop_gain
    }

    /// Outer delay in seconds
    pub fn delay(&self) -> f64 {
        self.delay_time
    }

    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    /// Nested sections, outer delay first
    pub fn sections(&self) -> &[AllPassSection; 2] {
        &self.sections
    }

    /// Output taps: direct and loop
    pub fn outputs(&self) -> [GainHandle; 2] {
        [self.direct, self.loop_out]
    }

    pub fn delay_line(&self) -> DelayHandle {
        self.delay
    }

    pub fn feedback(&self) -> GainHandle {
        self.feedback
    }
}

impl AudioGraphNode for SchroederNetwork {
    fn input(&self) -> NodeId {
        self.buffer.node()
    }

    fn connect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()> {
        host.connect(self.direct.node(), dest)?;
        host.connect(self.loop_out.node(), dest)
    }

    fn disconnect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()> {
        host.disconnect(self.direct.node(), dest)?;
        host.disconnect(self.loop_out.node(), dest)
    }
}

impl Reverberator for SchroederNetwork {
    fn set_position(&mut self, _host: &mut dyn AudioHost, _position: SpatialPosition) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "schroeder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bn_core::RecordingHost;

    #[test]
    fn test_derive_gains() {
        let (gain, loop_gain) = SchroederNetwork::derive_gains(0.05).unwrap();
        assert_relative_eq!(gain, 0.2182, epsilon = 1e-4);
        assert_relative_eq!(loop_gain, 0.9524, epsilon = 1e-4);

        for dr in [1e-6, 0.01, 0.5, 1.0, 10.0, 1e6] {
            let (gain, loop_gain) = SchroederNetwork::derive_gains(dr).unwrap();
            assert!(gain > 0.0 && gain < 1.0, "dr {dr} gave g {gain}");
            assert_relative_eq!(loop_gain, 1.0 - gain * gain);
        }
    }

    #[test]
    fn test_gain_limits() {
        let (small, _) = SchroederNetwork::derive_gains(1e-8).unwrap();
        assert!(small < 1e-3);

        let (large, _) = SchroederNetwork::derive_gains(1e8).unwrap();
        assert!(large > 0.999 && large < 1.0);
    }

    #[test]
    fn test_invalid_ratio() {
        for dr in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                SchroederNetwork::derive_gains(dr),
                Err(SpatialError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_defaults_applied_at_construction() {
        let mut host = RecordingHost::new(48000);
        let net = SchroederNetwork::new(&mut host, SchroederConfig::default()).unwrap();

        assert_relative_eq!(net.gain(), 0.2182, epsilon = 1e-4);
        assert_eq!(net.delay(), 0.015);

        let [direct, loop_out] = net.outputs();
        assert_relative_eq!(host.gain_now(direct).unwrap(), -net.gain());
        assert_relative_eq!(host.gain_now(loop_out).unwrap(), net.loop_gain());
        assert_relative_eq!(host.gain_now(net.feedback()).unwrap(), net.gain());
        assert_relative_eq!(host.delay_time_now(net.delay_line()).unwrap(), 0.015);

        let [first, second] = net.sections();
        assert_relative_eq!(host.delay_time_now(first.delay_line()).unwrap(), 0.015);
        assert_relative_eq!(host.delay_time_now(second.delay_line()).unwrap(), 0.005);
    }

    #[test]
    fn test_network_wiring() {
        let mut host = RecordingHost::new(48000);
        let net = SchroederNetwork::new(&mut host, SchroederConfig::default()).unwrap();
        let [direct, loop_out] = net.outputs();
        let [first, second] = net.sections();
        let delay = net.delay_line().node();

        assert!(host.is_connected(net.input(), direct.node()));
        assert!(host.is_connected(net.input(), delay));
        assert!(host.is_connected(net.feedback().node(), delay));
        assert!(host.is_connected(delay, first.input()));
        assert!(!host.is_connected(delay, net.feedback().node()));

        for tap in first.outputs() {
            assert!(host.is_connected(tap.node(), second.input()));
        }
        for tap in second.outputs() {
            assert!(host.is_connected(tap.node(), net.feedback().node()));
            assert!(host.is_connected(tap.node(), loop_out.node()));
        }
    }

    #[test]
    fn test_section_wiring() {
        let mut host = RecordingHost::new(48000);
        let section = AllPassSection::new(&mut host, 0.5, 0.01, 1.0).unwrap();
        let [direct, loop_out] = section.outputs();
        let delay = section.delay_line().node();

        assert!(host.is_connected(section.input(), direct.node()));
        assert!(host.is_connected(section.input(), delay));
        assert!(host.is_connected(section.feedback().node(), delay));
        assert!(host.is_connected(delay, section.feedback().node()));
        assert!(host.is_connected(delay, loop_out.node()));
        assert_eq!(host.edge_count(), 5);

        assert_eq!(host.gain_now(direct), Some(-0.5));
        assert_eq!(host.gain_now(loop_out), Some(0.75));
    }

    #[test]
    fn test_connect_outputs() {
        let mut host = RecordingHost::new(48000);
        let net = SchroederNetwork::new(&mut host, SchroederConfig::default()).unwrap();
        let dest = host.create_gain(1.0);

        net.connect(&mut host, dest.node()).unwrap();
        assert_eq!(host.inputs_of(dest.node()).len(), 2);

        net.disconnect(&mut host, dest.node()).unwrap();
        assert!(host.inputs_of(dest.node()).is_empty());
    }

    #[test]
    fn test_set_parameters() {
        let mut host = RecordingHost::new(48000);
        let mut net = SchroederNetwork::new(&mut host, SchroederConfig::default()).unwrap();

        net.set_parameters(&mut host, 1.0, 0.03).unwrap();
        let g = 0.5f32.sqrt();
        assert_relative_eq!(net.gain(), g);
        assert_relative_eq!(net.loop_gain(), 0.5, epsilon = 1e-6);
        assert_eq!(net.delay(), 0.03);

        let [first, second] = net.sections();
        assert_relative_eq!(first.gain(), g);
        assert_eq!(first.delay(), 0.03);
        assert_relative_eq!(second.delay(), 0.01);
        assert_relative_eq!(host.gain_now(first.feedback()).unwrap(), g);
    }

    #[test]
    fn test_set_parameters_rejects_and_keeps_state() {
        let mut host = RecordingHost::new(48000);
        let mut net = SchroederNetwork::new(&mut host, SchroederConfig::default()).unwrap();
        let before = net.gain();

        assert!(net.set_parameters(&mut host, 0.0, 0.01).is_err());
        assert!(net.set_parameters(&mut host, 0.05, -0.01).is_err());
        assert!(net.set_parameters(&mut host, 0.05, 2.0).is_err());
        assert!(net.set_parameters(&mut host, 0.05, f64::NAN).is_err());

        assert_eq!(net.gain(), before);
        assert_eq!(net.delay(), 0.015);
    }

    #[test]
    fn test_section_rejects_unstable_gain() {
        let mut host = RecordingHost::new(48000);
        assert!(AllPassSection::new(&mut host, 1.0, 0.01, 1.0).is_err());
        assert!(AllPassSection::new(&mut host, -1.5, 0.01, 1.0).is_err());

        let mut section = AllPassSection::new(&mut host, 0.3, 0.01, 1.0).unwrap();
        assert!(section.set_parameters(&mut host, 1.0, 0.01).is_err());
        assert_eq!(section.gain(), 0.3);
    }

    #[test]
    fn test_position_ignored() {
        let mut host = RecordingHost::new(48000);
        let mut net = SchroederNetwork::new(&mut host, SchroederConfig::default()).unwrap();
        let edges = host.edge_count();

        assert!(Reverberator::set_position(
            &mut net,
            &mut host,
            SpatialPosition::new(90.0, 0.0, 3.0)
        ));
        assert_eq!(host.edge_count(), edges);
        assert_eq!(net.name(), "schroeder");
    }
}
