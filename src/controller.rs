//! Parameter controller: the single entry point for user-facing parameter changes
//!
//! Rejects out-of-range values before they reach the graph and remembers the
//! last accepted configuration, so the next session starts where the user
//! left off.

use crate::audio::signals::{
    GainConfig, OscillatorConfig, Waveform, MAX_FREQUENCY_HZ, MAX_VOLUME, MIN_FREQUENCY_HZ,
    MIN_VOLUME,
};
use crate::error::ToneError;
use crate::graph::{validate_frequency, validate_volume, SignalGraph};

#[derive(Debug, Clone, Default)]
pub struct ParameterController {
    oscillator: OscillatorConfig,
    gain: GainConfig,
}

impl ParameterController {
    /// Start from the given configuration, clamped into range
    pub fn new(oscillator: OscillatorConfig, gain: GainConfig) -> Self {
        Self {
            oscillator: sanitize_oscillator(oscillator),
            gain: sanitize_gain(gain),
        }
    }

    pub fn oscillator(&self) -> &OscillatorConfig {
        &self.oscillator
    }

    pub fn gain(&self) -> &GainConfig {
        &self.gain
    }

    /// Validate `hz`, forward it to the graph when playing, then record it.
    /// While idle the value is only recorded.
    pub fn set_frequency(&mut self, graph: &mut SignalGraph, hz: f32) -> Result<(), ToneError> {
        validate_frequency(hz)?;
        if graph.is_playing() {
            graph.set_frequency(hz)?;
        }
        self.oscillator.frequency_hz = hz;
        Ok(())
    }

    pub fn set_waveform(
        &mut self,
        graph: &mut SignalGraph,
        waveform: Waveform,
    ) -> Result<(), ToneError> {
        if graph.is_playing() {
            graph.set_waveform(waveform)?;
        }
        self.oscillator.waveform = waveform;
        Ok(())
    }

    pub fn set_volume(&mut self, graph: &mut SignalGraph, volume: f32) -> Result<(), ToneError> {
        validate_volume(volume)?;
        if graph.is_playing() {
            graph.set_volume(volume)?;
        }
        self.gain.volume = volume;
        Ok(())
    }
}

/// Clamp a configured oscillator into range, warning when it had to
pub fn sanitize_oscillator(config: OscillatorConfig) -> OscillatorConfig {
    let frequency_hz = if config.frequency_hz.is_nan() {
        OscillatorConfig::default().frequency_hz
    } else {
        config.frequency_hz.clamp(MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ)
    };
    if frequency_hz != config.frequency_hz {
        log::warn!(
            "Frequency {} out of range, using {} Hz",
            config.frequency_hz,
            frequency_hz
        );
    }
    OscillatorConfig {
        frequency_hz,
        ..config
    }
}

pub fn sanitize_gain(config: GainConfig) -> GainConfig {
    let volume = if config.volume.is_nan() {
        GainConfig::default().volume
    } else {
        config.volume.clamp(MIN_VOLUME, MAX_VOLUME)
    };
    if volume != config.volume {
        log::warn!("Volume {} out of range, using {}", config.volume, volume);
    }
    GainConfig { volume }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::offline::OfflineDevice;
    use std::rc::Rc;

    fn setup() -> (ParameterController, SignalGraph) {
        let device = Rc::new(OfflineDevice::new(48000));
        (ParameterController::default(), SignalGraph::new(device))
    }

    #[test]
    fn test_idle_changes_are_recorded() {
        let (mut controller, mut graph) = setup();
        controller.set_frequency(&mut graph, 1000.0).unwrap();
        controller.set_waveform(&mut graph, Waveform::Triangle).unwrap();
        controller.set_volume(&mut graph, 0.25).unwrap();

        assert_eq!(controller.oscillator().frequency_hz, 1000.0);
        assert_eq!(controller.oscillator().waveform, Waveform::Triangle);
        assert_eq!(controller.gain().volume, 0.25);
        assert!(!graph.is_playing());
    }

    #[test]
    fn test_rejected_value_leaves_state_unchanged() {
        let (mut controller, mut graph) = setup();
        controller.set_frequency(&mut graph, 880.0).unwrap();
        assert!(controller.set_frequency(&mut graph, 5000.0).is_err());
        assert!(controller.set_frequency(&mut graph, f32::NAN).is_err());
        assert_eq!(controller.oscillator().frequency_hz, 880.0);

        controller.set_volume(&mut graph, 0.8).unwrap();
        assert!(controller.set_volume(&mut graph, -0.1).is_err());
        assert_eq!(controller.gain().volume, 0.8);
    }

    #[test]
    fn test_forwards_while_playing() {
        let (mut controller, mut graph) = setup();
        graph
            .start(controller.oscillator(), controller.gain())
            .unwrap();
        controller.set_frequency(&mut graph, 220.0).unwrap();
        controller.set_waveform(&mut graph, Waveform::Sawtooth).unwrap();
        assert_eq!(controller.oscillator().frequency_hz, 220.0);
        assert_eq!(controller.oscillator().waveform, Waveform::Sawtooth);
    }

    #[test]
    fn test_sanitize_clamps() {
        let osc = sanitize_oscillator(OscillatorConfig {
            frequency_hz: 5.0,
            waveform: Waveform::Square,
        });
        assert_eq!(osc.frequency_hz, MIN_FREQUENCY_HZ);
        assert_eq!(osc.waveform, Waveform::Square);

        let osc = sanitize_oscillator(OscillatorConfig {
            frequency_hz: f32::NAN,
            waveform: Waveform::Sine,
        });
        assert_eq!(osc.frequency_hz, 440.0);

        assert_eq!(sanitize_gain(GainConfig { volume: 2.0 }).volume, 1.0);
        let controller = ParameterController::new(
            OscillatorConfig {
                frequency_hz: 9000.0,
                waveform: Waveform::Sine,
            },
            GainConfig { volume: -1.0 },
        );
        assert_eq!(controller.oscillator().frequency_hz, MAX_FREQUENCY_HZ);
        assert_eq!(controller.gain().volume, 0.0);
    }
}
