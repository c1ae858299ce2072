//! Signal graph: one playback session's generator → gain → analyser chain
//!
//! The graph is the only owner of a session's node handles. Other components
//! get a `Weak<SignalSession>` that stops upgrading once the session is torn
//! down.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::audio::device::{AudioDevice, Endpoint, NodeId, ParamRef};
use crate::audio::signals::{
    AnalyserConfig, GainConfig, OscillatorConfig, Waveform, ANALYSER_BUFFER_SIZE, MAX_FREQUENCY_HZ,
    MAX_VOLUME, MIN_FREQUENCY_HZ, MIN_VOLUME, VOLUME_TIME_CONSTANT,
};
use crate::error::{DeviceError, ToneError};

/// One snapshot of the analyser: unsigned bytes centered at 128
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFrame {
    samples: Vec<u8>,
}

impl SampleFrame {
    /// A frame of silence
    pub fn new() -> Self {
        Self {
            samples: vec![128; ANALYSER_BUFFER_SIZE],
        }
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Peak absolute amplitude in [0, 1]
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .map(|&s| (s as f32 - 128.0).abs() / 128.0)
            .fold(0.0f32, f32::max)
            .min(1.0)
    }
}

impl Default for SampleFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// The live node triple of a playing session
pub struct SignalSession {
    device: Rc<dyn AudioDevice>,
    generator: NodeId,
    gain: NodeId,
    analyser: NodeId,
    live: Cell<bool>,
}

impl SignalSession {
    /// False once teardown has begun
    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    /// Copy the analyser's latest snapshot into `frame`
    pub fn read_frame(&self, frame: &mut SampleFrame) -> Result<(), ToneError> {
        if !self.is_live() {
            return Err(ToneError::NotPlaying);
        }
        self.device
            .read_time_domain(self.analyser, &mut frame.samples)
            .map_err(ToneError::from)
    }
}

pub struct SignalGraph {
    device: Rc<dyn AudioDevice>,
    session: Option<Rc<SignalSession>>,
}

impl SignalGraph {
    pub fn new(device: Rc<dyn AudioDevice>) -> Self {
        Self {
            device,
            session: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// Non-owning reference to the active session
    pub fn session(&self) -> Option<Weak<SignalSession>> {
        self.session.as_ref().map(Rc::downgrade)
    }

    /// Build the chain and begin generating
    pub fn start(
        &mut self,
        osc: &OscillatorConfig,
        gain: &GainConfig,
    ) -> Result<Weak<SignalSession>, ToneError> {
        if self.session.is_some() {
            return Err(ToneError::AlreadyPlaying);
        }
        validate_frequency(osc.frequency_hz)?;
        validate_volume(gain.volume)?;

        self.device
            .resume()
            .map_err(|e| ToneError::AudioUnavailable(e.to_string()))?;

        let mut created = Vec::with_capacity(3);
        match self.build(osc, gain, &mut created) {
            Ok(session) => {
                let session = Rc::new(session);
                let weak = Rc::downgrade(&session);
                self.session = Some(session);
                log::info!(
                    "Signal started: {} Hz {} at volume {:.2}",
                    osc.frequency_hz,
                    osc.waveform,
                    gain.volume
                );
                Ok(weak)
            }
            Err(e) => {
                log::error!("Failed to build signal graph: {}", e);
                for node in created {
                    if let Err(release_err) = self.device.release(node) {
                        log::warn!("Failed to release node {}: {}", node, release_err);
                    }
                }
                Err(e.into())
            }
        }
    }

    fn build(
        &self,
        osc: &OscillatorConfig,
        gain: &GainConfig,
        created: &mut Vec<NodeId>,
    ) -> Result<SignalSession, DeviceError> {
        let device = &self.device;

        let generator = device.create_oscillator()?;
        created.push(generator);
        let gain_node = device.create_gain()?;
        created.push(gain_node);
        let analyser = device.create_analyser(AnalyserConfig::default().buffer_size)?;
        created.push(analyser);

        // Generator -> Gain -> Analyser -> Output
        device.connect(generator, Endpoint::Node(gain_node))?;
        device.connect(gain_node, Endpoint::Node(analyser))?;
        device.connect(analyser, Endpoint::Destination)?;

        let now = device.current_time();
        device.set_waveform(generator, osc.waveform)?;
        device.set_value_at_time(ParamRef::frequency(generator), osc.frequency_hz, now)?;
        device.set_value_at_time(ParamRef::gain(gain_node), gain.volume, now)?;
        device.start(generator, now)?;

        Ok(SignalSession {
            device: Rc::clone(device),
            generator,
            gain: gain_node,
            analyser,
            live: Cell::new(true),
        })
    }

    /// Tear the session down. Every node is released even if one step fails;
    /// the graph is idle afterwards and the first failure is returned.
    pub fn stop(&mut self) -> Result<(), ToneError> {
        let session = self.session.take().ok_or(ToneError::NotPlaying)?;
        session.live.set(false);

        let device = &self.device;
        let mut first_error: Option<DeviceError> = None;
        let mut note = |result: Result<(), DeviceError>| {
            if let Err(e) = result {
                log::warn!("Teardown step failed: {}", e);
                first_error.get_or_insert(e);
            }
        };

        note(device.stop(session.generator, device.current_time()));
        for node in [session.generator, session.gain, session.analyser] {
            note(device.disconnect(node));
        }
        for node in [session.generator, session.gain, session.analyser] {
            note(device.release(node));
        }

        if Rc::strong_count(&session) > 1 {
            log::warn!("Signal session still referenced after stop");
        }
        drop(session);
        log::info!("Signal stopped");

        match first_error {
            Some(e) => Err(ToneError::Device(e)),
            None => Ok(()),
        }
    }

    fn active(&self, op: &'static str) -> Result<&SignalSession, ToneError> {
        self.session.as_deref().ok_or(ToneError::InvalidState(op))
    }

    /// Jump the generator to `hz` at the device clock's current time
    pub fn set_frequency(&mut self, hz: f32) -> Result<(), ToneError> {
        validate_frequency(hz)?;
        let session = self.active("set frequency")?;
        let now = self.device.current_time();
        self.device
            .set_value_at_time(ParamRef::frequency(session.generator), hz, now)?;
        log::debug!("Frequency -> {} Hz at t={:.4}", hz, now);
        Ok(())
    }

    /// Change the generator shape in place
    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<(), ToneError> {
        let session = self.active("set waveform")?;
        self.device.set_waveform(session.generator, waveform)?;
        log::debug!("Waveform -> {}", waveform);
        Ok(())
    }

    /// Glide the volume toward `volume` with a short time constant
    pub fn set_volume(&mut self, volume: f32) -> Result<(), ToneError> {
        validate_volume(volume)?;
        let session = self.active("set volume")?;
        let now = self.device.current_time();
        self.device.set_target_at_time(
            ParamRef::gain(session.gain),
            volume,
            now,
            VOLUME_TIME_CONSTANT,
        )?;
        log::debug!("Volume -> {:.2} at t={:.4}", volume, now);
        Ok(())
    }

    pub fn read_frame(&self, frame: &mut SampleFrame) -> Result<(), ToneError> {
        match &self.session {
            Some(session) => session.read_frame(frame),
            None => Err(ToneError::NotPlaying),
        }
    }
}

pub(crate) fn validate_frequency(hz: f32) -> Result<(), ToneError> {
    if (MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&hz) {
        Ok(())
    } else {
        Err(ToneError::InvalidParameter {
            name: "frequency",
            value: hz,
            min: MIN_FREQUENCY_HZ,
            max: MAX_FREQUENCY_HZ,
        })
    }
}

pub(crate) fn validate_volume(volume: f32) -> Result<(), ToneError> {
    if (MIN_VOLUME..=MAX_VOLUME).contains(&volume) {
        Ok(())
    } else {
        Err(ToneError::InvalidParameter {
            name: "volume",
            value: volume,
            min: MIN_VOLUME,
            max: MAX_VOLUME,
        })
    }
}
