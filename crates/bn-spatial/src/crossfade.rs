//! Double-buffered filter crossfading
//!
//! Two convolution paths run in parallel from a shared input. One is audible,
//! the other silent. A position change loads the nearest response into the
//! silent path and crossfades the faders over the transition time. Only one
//! swap may be in flight: requests arriving before it completes are rejected,
//! so a path is never reloaded while it is itself fading in.
//!
//! ```text
//!          ┌─ convolver[0] ─ fader[0] ─┐
//! input ───┤                           ├─── output (distance law)
//!          └─ convolver[1] ─ fader[1] ─┘
//! ```

use std::sync::Arc;

use bn_core::{
    AudioGraphNode, AudioHost, ConvolutionHandle, CoreResult, GainHandle, NodeId, ParamChange,
    StereoBuffer,
};

use crate::catalog::ImpulseResponseCatalog;
use crate::config::{CrossfadeConfig, DistanceLaw, RampShape};
use crate::error::{SpatialError, SpatialResult};
use crate::position::SpatialPosition;
use crate::reverb::Reverberator;

/// Fader gain of the audible path
pub const FADER_FULL: f32 = 1.0;
/// Fader gain of the silent path
pub const FADER_SILENT: f32 = 0.0;

/// Two-path convolution spatializer with time-gated filter swaps
#[derive(Debug)]
pub struct CrossfadeSpatializer {
    config: CrossfadeConfig,
    input: GainHandle,
    output: GainHandle,
    convolvers: [ConvolutionHandle; 2],
    faders: [GainHandle; 2],
    /// Responses loaded per path
    loaded: [Option<Arc<StereoBuffer>>; 2],
    /// Audible path
    active_slot: usize,
    /// End of the transition in flight (host clock)
    busy_until: Option<f64>,
    /// Last accepted position
    position: SpatialPosition,
    /// Last valid requested position, swapped in or not
    requested: SpatialPosition,
    catalog: Option<Arc<ImpulseResponseCatalog>>,
}

impl CrossfadeSpatializer {
    /// Create paths and wire them
    pub fn new(host: &mut dyn AudioHost, config: CrossfadeConfig) -> SpatialResult<Self> {
        validate_transition_time(config.transition_time)?;

        let input = host.create_gain(1.0);
        let output = host.create_gain(1.0);
        let convolvers = [host.create_convolver(), host.create_convolver()];
        let faders = [host.create_gain(FADER_FULL), host.create_gain(FADER_SILENT)];

        for slot in 0..2 {
            host.connect(input.node(), convolvers[slot].node())?;
            host.connect(convolvers[slot].node(), faders[slot].node())?;
            host.connect(faders[slot].node(), output.node())?;
        }

        Ok(Self {
            config,
            input,
            output,
            convolvers,
            faders,
            loaded: [None, None],
            active_slot: 0,
            busy_until: None,
            position: SpatialPosition::default(),
            requested: SpatialPosition::default(),
            catalog: None,
        })
    }

    /// Attach catalog and load the response for the last requested position
    ///
    /// The active path is reloaded directly, without a fade.
    pub fn set_catalog(
        &mut self,
        host: &mut dyn AudioHost,
        catalog: Arc<ImpulseResponseCatalog>,
    ) -> SpatialResult<()> {
        let index = catalog.nearest(&self.requested)?;
        let response = Arc::clone(catalog.entry(index).ok_or(SpatialError::EmptyCatalog)?.response());

        host.set_response(self.convolvers[self.active_slot], Arc::clone(&response))?;
        self.loaded[self.active_slot] = Some(response);
        self.catalog = Some(catalog);
        self.position = self.requested;

        log::debug!(
            "catalog attached ({} responses), slot {} loaded with entry {}",
            self.catalog.as_ref().map_or(0, |c| c.len()),
            self.active_slot,
            index
        );
        Ok(())
    }

    /// Move the source, reporting why a swap was refused
    pub fn try_set_position(
        &mut self,
        host: &mut dyn AudioHost,
        position: SpatialPosition,
    ) -> SpatialResult<()> {
        position.validate()?;
        self.requested = position;

        // Level follows every valid update, swap or not
        if let Some(gain) = self.config.distance_law.gain(position.distance) {
            host.set_gain(self.output, ParamChange::Immediate(gain))?;
        }

        let Some(catalog) = self.catalog.as_ref() else {
            return Err(SpatialError::NotReady);
        };

        let now = host.current_time();
        if let Some(until) = self.busy_until {
            if now < until {
                return Err(SpatialError::Busy { until });
            }
        }

        let incoming_slot = 1 - self.active_slot;
        let index = catalog.nearest(&position)?;
        let response = Arc::clone(catalog.entry(index).ok_or(SpatialError::EmptyCatalog)?.response());
        // Incoming path is silent, reloading it is inaudible
        host.set_response(self.convolvers[incoming_slot], Arc::clone(&response))?;
        self.loaded[incoming_slot] = Some(response);

        let end = now + self.config.transition_time;
        let outgoing = self.faders[self.active_slot];
        let incoming = self.faders[incoming_slot];
        let faded = self
            .schedule_fade(host, outgoing, FADER_FULL, FADER_SILENT, now, end)
            .and_then(|()| self.schedule_fade(host, incoming, FADER_SILENT, FADER_FULL, now, end));
        if let Err(e) = faded {
            self.restore_faders(host, now);
            return Err(e.into());
        }

        log::debug!(
            "position ({:.1}, {:.1}, {:.2}) -> entry {}, slot {} -> {} until {:.4}s",
            position.azimuth,
            position.elevation,
            position.distance,
            index,
            self.active_slot,
            incoming_slot,
            end
        );

        self.active_slot = incoming_slot;
        self.busy_until = Some(end);
        self.position = position;
        Ok(())
    }

    /// Move the source; `false` when the swap was refused
    ///
    /// Refusals are expected while a transition runs or before a catalog is
    /// attached. Callers poll [`is_available`](Self::is_available) or retry.
    pub fn set_position(&mut self, host: &mut dyn AudioHost, position: SpatialPosition) -> bool {
        match self.try_set_position(host, position) {
            Ok(()) => true,
            Err(e) => {
                log::trace!("position update refused: {e}");
                false
            }
        }
    }

    fn schedule_fade(
        &self,
        host: &mut dyn AudioHost,
        fader: GainHandle,
        from: f32,
        to: f32,
        now: f64,
        end: f64,
    ) -> CoreResult<()> {
        match self.config.ramp {
            RampShape::Linear => {
                host.set_gain(fader, ParamChange::SetAtTime { value: from, time: now })?;
                host.set_gain(fader, ParamChange::LinearRampTo { value: to, end_time: end })
            }
            RampShape::Step => host.set_gain(fader, ParamChange::SetAtTime { value: to, time: end }),
        }
    }

    /// Put the faders back to the current slot after a failed swap
    fn restore_faders(&self, host: &mut dyn AudioHost, now: f64) {
        let levels = [
            (self.active_slot, FADER_FULL),
            (1 - self.active_slot, FADER_SILENT),
        ];
        for (slot, level) in levels {
            let fader = self.faders[slot];
            let restored = host
                .cancel_scheduled_values(fader, now)
                .and_then(|()| host.set_gain(fader, ParamChange::Immediate(level)));
            if let Err(e) = restored {
                log::warn!("restoring fader {slot}: {e}");
            }
        }
    }

    /// Change the level law applied at the output
    ///
    /// `DistanceLaw::None` resets the output to unity; otherwise the law is
    /// applied to the last requested distance.
    pub fn set_distance_law(
        &mut self,
        host: &mut dyn AudioHost,
        law: DistanceLaw,
    ) -> SpatialResult<()> {
        let gain = law.gain(self.requested.distance).unwrap_or(1.0);
        host.set_gain(self.output, ParamChange::Immediate(gain))?;
        self.config.distance_law = law;
        Ok(())
    }

    /// No transition in flight
    pub fn is_available(&self, host: &dyn AudioHost) -> bool {
        match self.busy_until {
            None => true,
            Some(until) => host.current_time() >= until,
        }
    }

    /// Change transition time for later swaps
    pub fn set_transition_time(&mut self, seconds: f64) -> SpatialResult<()> {
        validate_transition_time(seconds)?;
        self.config.transition_time = seconds;
        Ok(())
    }

    pub fn transition_time(&self) -> f64 {
        self.config.transition_time
    }

    pub fn config(&self) -> &CrossfadeConfig {
        &self.config
    }

    /// Audible path index
    pub fn active_slot(&self) -> usize {
        self.active_slot
    }

    /// End of the last transition
    pub fn busy_until(&self) -> Option<f64> {
        self.busy_until
    }

    /// Last accepted position
    pub fn position(&self) -> SpatialPosition {
        self.position
    }

    /// Last valid requested position, including refused swaps
    pub fn requested_position(&self) -> SpatialPosition {
        self.requested
    }

    pub fn catalog(&self) -> Option<&Arc<ImpulseResponseCatalog>> {
        self.catalog.as_ref()
    }

    /// Response in the audible path
    pub fn current_response(&self) -> Option<&Arc<StereoBuffer>> {
        self.loaded[self.active_slot].as_ref()
    }

    /// Output gain stage (carries the distance law)
    pub fn output(&self) -> GainHandle {
        self.output
    }

    /// Fader of a path
    pub fn fader(&self, slot: usize) -> Option<GainHandle> {
        self.faders.get(slot).copied()
    }

    /// Convolution stage of a path
    pub fn convolver(&self, slot: usize) -> Option<ConvolutionHandle> {
        self.convolvers.get(slot).copied()
    }
}

fn validate_transition_time(seconds: f64) -> SpatialResult<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(SpatialError::InvalidParameter(format!(
            "transition time must be finite and non-negative, got {seconds}"
        )));
    }
    Ok(())
}

impl AudioGraphNode for CrossfadeSpatializer {
    fn input(&self) -> NodeId {
        self.input.node()
    }

    fn connect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()> {
        host.connect(self.output.node(), dest)
    }

    fn disconnect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()> {
        host.disconnect(self.output.node(), dest)
    }
}

/// Room reverberator: a spatializer driven by a BRIR catalog
impl Reverberator for CrossfadeSpatializer {
    fn set_position(&mut self, host: &mut dyn AudioHost, position: SpatialPosition) -> bool {
        CrossfadeSpatializer::set_position(self, host, position)
    }

    fn name(&self) -> &'static str {
        "room"
    }

    fn bypass_distance_law(&mut self, host: &mut dyn AudioHost) -> SpatialResult<()> {
        self.set_distance_law(host, DistanceLaw::None)
    }
}
