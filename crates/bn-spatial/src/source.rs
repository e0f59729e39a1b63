//! Per-source signal chain
//!
//! `input (volume) → HRIR spatializer → [reverberator] → output (distance law)`

use std::fmt;
use std::sync::Arc;

use bn_core::{AudioGraphNode, AudioHost, CoreResult, GainHandle, NodeId, ParamChange};

use crate::catalog::ImpulseResponseCatalog;
use crate::config::SourceConfig;
use crate::crossfade::CrossfadeSpatializer;
use crate::error::{SpatialError, SpatialResult};
use crate::position::SpatialPosition;
use crate::reverb::Reverberator;

/// Outcome of a source position update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionUpdate {
    /// Position was valid and applied to the level
    pub accepted: bool,
    /// HRIR filter swap started
    pub filter_swapped: bool,
    /// Reverberator accepted the update (None without a reverberator)
    pub reverb_swapped: Option<bool>,
}

impl PositionUpdate {
    fn rejected() -> Self {
        Self::default()
    }
}

/// Spatialized source
pub struct SourceGraph {
    config: SourceConfig,
    input: GainHandle,
    output: GainHandle,
    spatializer: CrossfadeSpatializer,
    reverberator: Option<Box<dyn Reverberator>>,
    position: SpatialPosition,
}

impl SourceGraph {
    /// Create chain with no reverberator
    pub fn new(host: &mut dyn AudioHost, config: SourceConfig) -> SpatialResult<Self> {
        validate_volume(config.volume)?;

        let input = host.create_gain(config.volume);
        let spatializer = CrossfadeSpatializer::new(host, config.hrir.without_attenuation())?;
        let output = host.create_gain(1.0);

        host.connect(input.node(), spatializer.input())?;
        spatializer.connect(host, output.node())?;

        Ok(Self {
            config,
            input,
            output,
            spatializer,
            reverberator: None,
            position: SpatialPosition::default(),
        })
    }

    /// Attach HRIR catalog
    pub fn set_hrir_catalog(
        &mut self,
        host: &mut dyn AudioHost,
        catalog: Arc<ImpulseResponseCatalog>,
    ) -> SpatialResult<()> {
        self.spatializer.set_catalog(host, catalog)
    }

    /// Replace the reverberator, handing back the previous one
    ///
    /// The previous reverberator is fully detached before the new one is
    /// wired in. `None` routes the spatializer straight to the output. The
    /// new reverberator stops applying its own distance law. If wiring fails
    /// the previous routing is restored and stays installed.
    pub fn set_reverberator(
        &mut self,
        host: &mut dyn AudioHost,
        mut reverberator: Option<Box<dyn Reverberator>>,
    ) -> SpatialResult<Option<Box<dyn Reverberator>>> {
        if let Some(reverb) = reverberator.as_mut() {
            reverb.bypass_distance_law(host)?;
        }

        self.detach(host, self.reverberator.as_deref());

        if let Err(e) = self.attach(host, reverberator.as_deref()) {
            if let Err(restore) = self.attach(host, self.reverberator.as_deref()) {
                log::warn!("restoring previous reverberator route: {restore}");
            }
            return Err(e.into());
        }

        let previous = std::mem::replace(&mut self.reverberator, reverberator);
        log::debug!(
            "reverberator {} -> {}",
            previous.as_ref().map_or("none", |r| r.name()),
            self.reverberator.as_ref().map_or("none", |r| r.name())
        );
        Ok(previous)
    }

    /// Route spatializer through `reverb` (or directly) into the output
    ///
    /// Undoes its own partial wiring on failure.
    fn attach(&self, host: &mut dyn AudioHost, reverb: Option<&dyn Reverberator>) -> CoreResult<()> {
        let output = self.output.node();
        let Some(reverb) = reverb else {
            return self.spatializer.connect(host, output);
        };

        self.spatializer.connect(host, reverb.input())?;
        if let Err(e) = reverb.connect(host, output) {
            let _ = reverb.disconnect(host, output);
            let _ = self.spatializer.disconnect(host, reverb.input());
            return Err(e);
        }
        Ok(())
    }

    fn detach(&self, host: &mut dyn AudioHost, reverb: Option<&dyn Reverberator>) {
        let output = self.output.node();
        match reverb {
            Some(old) => {
                if let Err(e) = self.spatializer.disconnect(host, old.input()) {
                    log::warn!("detaching spatializer from {} reverberator: {e}", old.name());
                }
                if let Err(e) = old.disconnect(host, output) {
                    log::warn!("detaching {} reverberator from output: {e}", old.name());
                }
            }
            None => {
                if let Err(e) = self.spatializer.disconnect(host, output) {
                    log::warn!("detaching direct spatializer route: {e}");
                }
            }
        }
    }

    /// Move the source, propagating host failures
    pub fn try_set_position(
        &mut self,
        host: &mut dyn AudioHost,
        position: SpatialPosition,
    ) -> SpatialResult<PositionUpdate> {
        position.validate()?;

        let reverb_swapped = self
            .reverberator
            .as_mut()
            .map(|reverb| reverb.set_position(host, position));
        let filter_swapped = self.spatializer.set_position(host, position);

        if let Some(gain) = self.config.distance_law.gain(position.distance) {
            host.set_gain(self.output, ParamChange::Immediate(gain))?;
        }
        self.position = position;

        Ok(PositionUpdate {
            accepted: true,
            filter_swapped,
            reverb_swapped,
        })
    }

    /// Move the source
    pub fn set_position(
        &mut self,
        host: &mut dyn AudioHost,
        position: SpatialPosition,
    ) -> PositionUpdate {
        match self.try_set_position(host, position) {
            Ok(update) => update,
            Err(e) => {
                log::trace!("source position rejected: {e}");
                PositionUpdate::rejected()
            }
        }
    }

    /// Input gain
    pub fn set_volume(&mut self, host: &mut dyn AudioHost, volume: f32) -> SpatialResult<()> {
        validate_volume(volume)?;
        host.set_gain(self.input, ParamChange::Immediate(volume))?;
        self.config.volume = volume;
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.config.volume
    }

    /// HRIR transition time for later swaps
    pub fn set_transition_time(&mut self, seconds: f64) -> SpatialResult<()> {
        self.spatializer.set_transition_time(seconds)
    }

    /// HRIR spatializer ready for a swap
    pub fn is_available(&self, host: &dyn AudioHost) -> bool {
        self.spatializer.is_available(host)
    }

    /// Last valid position
    pub fn position(&self) -> SpatialPosition {
        self.position
    }

    pub fn spatializer(&self) -> &CrossfadeSpatializer {
        &self.spatializer
    }

    pub fn reverberator(&self) -> Option<&dyn Reverberator> {
        self.reverberator.as_deref()
    }

    /// Output gain stage
    pub fn output(&self) -> GainHandle {
        self.output
    }

    /// Input gain stage
    pub fn input_gain(&self) -> GainHandle {
        self.input
    }
}

fn validate_volume(volume: f32) -> SpatialResult<()> {
    if !volume.is_finite() {
        return Err(SpatialError::InvalidParameter(format!(
            "volume must be finite, got {volume}"
        )));
    }
    Ok(())
}

impl fmt::Debug for SourceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceGraph")
            .field("config", &self.config)
            .field("position", &self.position)
            .field("spatializer", &self.spatializer)
            .field("reverberator", &self.reverberator.as_ref().map(|r| r.name()))
            .finish_non_exhaustive()
    }
}

impl AudioGraphNode for SourceGraph {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ImpulseResponse;
    use crate::config::{CrossfadeConfig, DistanceLaw, SchroederConfig, SpatialConfig};
    use crate::reverb::SchroederNetwork;
    use approx::assert_relative_eq;
    use bn_core::RecordingHost;

    fn catalog() -> Arc<ImpulseResponseCatalog> {
        let positions = vec![
            SpatialPosition::new(0.0, 0.0, 1.0),
            SpatialPosition::new(90.0, 0.0, 1.0),
            SpatialPosition::new(180.0, 0.0, 1.0),
        ];
        let responses = (0..3)
            .map(|i| ImpulseResponse::new(vec![i as f32; 2], vec![i as f32; 2]))
            .collect();
        Arc::new(ImpulseResponseCatalog::from_parts(48000, 2, positions, responses).unwrap())
    }

    fn source(host: &mut RecordingHost) -> SourceGraph {
        let mut source = SourceGraph::new(host, SourceConfig::default()).unwrap();
        source.set_hrir_catalog(host, catalog()).unwrap();
        source
    }

    /// Reverberator whose input the host has never seen
    struct Unregistered;

    impl AudioGraphNode for Unregistered {
        fn input(&self) -> NodeId {
            NodeId(9999)
        }

        fn connect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()> {
            host.connect(NodeId(9999), dest)
        }

        fn disconnect(&self, host: &mut dyn AudioHost, dest: NodeId) -> CoreResult<()> {
            host.disconnect(NodeId(9999), dest)
        }
    }

    impl Reverberator for Unregistered {
        fn set_position(&mut self, _host: &mut dyn AudioHost, _position: SpatialPosition) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "unregistered"
        }
    }

    #[test]
    fn test_direct_wiring() {
        let mut host = RecordingHost::new(48000);
        let source = source(&mut host);
        let spatializer_out = source.spatializer().output().node();

        assert!(host.is_connected(source.input(), source.spatializer().input()));
        assert!(host.is_connected(spatializer_out, source.output().node()));
    }

    #[test]
    fn test_inverse_square_at_output() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);

        let update = source.set_position(&mut host, SpatialPosition::new(90.0, 0.0, 2.0));
        assert!(update.accepted);
        assert!(update.filter_swapped);
        assert_eq!(update.reverb_swapped, None);
        assert_relative_eq!(host.gain_now(source.output()).unwrap(), 0.25);

        // HRIR stage carries no attenuation of its own
        assert_eq!(host.gain_now(source.spatializer().output()), Some(1.0));
    }

    #[test]
    fn test_level_tracks_during_transition() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);

        assert!(source.set_position(&mut host, SpatialPosition::new(90.0, 0.0, 1.0)).filter_swapped);
        let update = source.set_position(&mut host, SpatialPosition::new(180.0, 0.0, 4.0));
        assert!(update.accepted);
        assert!(!update.filter_swapped);
        assert_relative_eq!(host.gain_now(source.output()).unwrap(), 0.0625);
        assert_eq!(source.position(), SpatialPosition::new(180.0, 0.0, 4.0));
    }

    #[test]
    fn test_invalid_position_untouched() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);

        let update = source.set_position(&mut host, SpatialPosition::new(0.0, 0.0, -1.0));
        assert_eq!(update, PositionUpdate::default());
        assert_eq!(host.gain_now(source.output()), Some(1.0));
        assert_eq!(source.position(), SpatialPosition::default());
        assert!(matches!(
            source.try_set_position(&mut host, SpatialPosition::new(f32::NAN, 0.0, 1.0)),
            Err(SpatialError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_custom_distance_law() {
        let mut host = RecordingHost::new(48000);
        let config = SourceConfig {
            distance_law: DistanceLaw::None,
            ..Default::default()
        };
        let mut source = SourceGraph::new(&mut host, config).unwrap();
        source.set_hrir_catalog(&mut host, catalog()).unwrap();

        assert!(source.set_position(&mut host, SpatialPosition::new(0.0, 0.0, 3.0)).accepted);
        assert_eq!(host.gain_now(source.output()), Some(1.0));
    }

    #[test]
    fn test_hrir_attenuation_forced_off() {
        let mut host = RecordingHost::new(48000);
        let config = SourceConfig {
            hrir: CrossfadeConfig::default(),
            ..Default::default()
        };
        let source = SourceGraph::new(&mut host, config).unwrap();
        assert_eq!(source.spatializer().config().distance_law, DistanceLaw::None);
    }

    #[test]
    fn test_reverberator_insert_and_remove() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);
        let spatializer_out = source.spatializer().output().node();
        let output = source.output().node();

        let reverb = SchroederNetwork::new(&mut host, SchroederConfig::default()).unwrap();
        let reverb_input = reverb.input();
        let [direct, loop_out] = reverb.outputs();

        let previous = source
            .set_reverberator(&mut host, Some(Box::new(reverb)))
            .unwrap();
        assert!(previous.is_none());
        assert!(!host.is_connected(spatializer_out, output));
        assert!(host.is_connected(spatializer_out, reverb_input));
        assert!(host.is_connected(direct.node(), output));
        assert!(host.is_connected(loop_out.node(), output));
        assert_eq!(source.reverberator().map(|r| r.name()), Some("schroeder"));

        let update = source.set_position(&mut host, SpatialPosition::new(90.0, 0.0, 1.0));
        assert_eq!(update.reverb_swapped, Some(true));

        let removed = source.set_reverberator(&mut host, None).unwrap();
        assert_eq!(removed.map(|r| r.name()), Some("schroeder"));
        assert!(host.is_connected(spatializer_out, output));
        assert!(!host.is_connected(spatializer_out, reverb_input));
        assert!(!host.is_connected(direct.node(), output));
        assert!(!host.is_connected(loop_out.node(), output));
        assert!(source.reverberator().is_none());
    }

    #[test]
    fn test_reverberator_swap_detaches_previous() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);
        let output = source.output().node();

        let first = SchroederNetwork::new(&mut host, SchroederConfig::default()).unwrap();
        let first_outputs = first.outputs();
        source.set_reverberator(&mut host, Some(Box::new(first))).unwrap();

        let room = CrossfadeSpatializer::new(&mut host, CrossfadeConfig::default()).unwrap();
        let room_output = room.output().node();
        let previous = source
            .set_reverberator(&mut host, Some(Box::new(room)))
            .unwrap()
            .unwrap();

        assert_eq!(previous.name(), "schroeder");
        for tap in first_outputs {
            assert!(!host.is_connected(tap.node(), output));
        }
        assert!(!host.is_connected(source.spatializer().output().node(), previous.input()));
        assert!(host.is_connected(room_output, output));
        assert_eq!(source.reverberator().map(|r| r.name()), Some("room"));
    }

    #[test]
    fn test_room_reverberator_follows_position() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);

        let mut room = CrossfadeSpatializer::new(&mut host, CrossfadeConfig::default()).unwrap();
        room.set_catalog(&mut host, catalog()).unwrap();
        source.set_reverberator(&mut host, Some(Box::new(room))).unwrap();

        let update = source.set_position(&mut host, SpatialPosition::new(180.0, 0.0, 1.0));
        assert_eq!(update.reverb_swapped, Some(true));
        assert!(update.filter_swapped);

        let update = source.set_position(&mut host, SpatialPosition::new(90.0, 0.0, 1.0));
        assert_eq!(update.reverb_swapped, Some(false));
        assert!(!update.filter_swapped);
    }

    #[test]
    fn test_volume() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);

        source.set_volume(&mut host, 10.0).unwrap();
        assert_eq!(host.gain_now(source.input_gain()), Some(10.0));
        assert_eq!(source.volume(), 10.0);
        assert!(source.set_volume(&mut host, f32::NAN).is_err());
        assert_eq!(source.volume(), 10.0);
    }

    #[test]
    fn test_transition_time_forwarded() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);

        source.set_transition_time(0.2).unwrap();
        assert_eq!(source.spatializer().transition_time(), 0.2);
        assert!(source.set_transition_time(-1.0).is_err());

        assert!(source.set_position(&mut host, SpatialPosition::new(90.0, 0.0, 1.0)).filter_swapped);
        host.advance(0.1);
        assert!(!source.is_available(&host));
        host.advance(0.2);
        assert!(source.is_available(&host));
    }

    #[test]
    fn test_position_before_catalog_is_loaded() {
        let mut host = RecordingHost::new(48000);
        let mut source = SourceGraph::new(&mut host, SourceConfig::default()).unwrap();

        let update = source.set_position(&mut host, SpatialPosition::new(180.0, 0.0, 1.0));
        assert!(update.accepted);
        assert!(!update.filter_swapped);

        source.set_hrir_catalog(&mut host, catalog()).unwrap();
        assert_eq!(source.spatializer().current_response().unwrap().left, vec![2.0; 2]);
        assert_eq!(source.spatializer().position(), source.position());
    }

    #[test]
    fn test_default_room_attenuates_once() {
        let config = SpatialConfig::default();

        for room_config in [config.room, CrossfadeConfig::default()] {
            let mut host = RecordingHost::new(48000);
            let mut source = SourceGraph::new(&mut host, config.source).unwrap();
            source.set_hrir_catalog(&mut host, catalog()).unwrap();

            let mut room = CrossfadeSpatializer::new(&mut host, room_config).unwrap();
            room.set_catalog(&mut host, catalog()).unwrap();
            let room_output = room.output();
            source.set_reverberator(&mut host, Some(Box::new(room))).unwrap();

            let update = source.set_position(&mut host, SpatialPosition::new(90.0, 0.0, 2.0));
            assert_eq!(update.reverb_swapped, Some(true));

            let total = host.gain_now(room_output).unwrap() * host.gain_now(source.output()).unwrap();
            assert_relative_eq!(total, 0.25);
        }
    }

    #[test]
    fn test_failed_swap_keeps_previous() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);
        let spatializer_out = source.spatializer().output().node();
        let output = source.output().node();

        let reverb = SchroederNetwork::new(&mut host, SchroederConfig::default()).unwrap();
        let reverb_input = reverb.input();
        let [direct, loop_out] = reverb.outputs();
        source.set_reverberator(&mut host, Some(Box::new(reverb))).unwrap();

        let result = source.set_reverberator(&mut host, Some(Box::new(Unregistered)));
        assert!(matches!(
            result,
            Err(SpatialError::Host(bn_core::CoreError::UnknownNode(NodeId(9999))))
        ));

        assert_eq!(source.reverberator().map(|r| r.name()), Some("schroeder"));
        assert!(host.is_connected(spatializer_out, reverb_input));
        assert!(host.is_connected(direct.node(), output));
        assert!(host.is_connected(loop_out.node(), output));
        assert!(!host.is_connected(spatializer_out, output));
    }

    #[test]
    fn test_failed_swap_keeps_direct_route() {
        let mut host = RecordingHost::new(48000);
        let mut source = source(&mut host);
        let spatializer_out = source.spatializer().output().node();
        let output = source.output().node();

        assert!(source.set_reverberator(&mut host, Some(Box::new(Unregistered))).is_err());
        assert!(source.reverberator().is_none());
        assert_eq!(host.inputs_of(output), vec![spatializer_out]);
    }
}
