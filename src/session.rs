//! Session lifecycle and the tone generator facade
//!
//! `ToneGenerator` is what callers hold. It gates every operation on the
//! Idle/Playing state machine, routes parameter changes through the
//! controller and makes sure the monitor loop runs exactly while a session
//! is playing.
//!
//! Parameter setters called while idle are deferred: the value is validated
//! and remembered, and the next `start()` uses it. They do not fail with
//! `InvalidState`; that error is reserved for the lower-level
//! [`SignalGraph`] setters.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::audio::device::AudioDevice;
use crate::audio::signals::{GainConfig, OscillatorConfig, Waveform};
use crate::controller::ParameterController;
use crate::error::ToneError;
use crate::graph::{SampleFrame, SignalGraph};
use crate::monitor::{DrawingSurface, FrameScheduler, Monitor};

/// Current state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Playing,
}

/// Idle/Playing state machine
#[derive(Debug, Default)]
pub struct SessionLifecycle {
    state: SessionState,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check that `start` is legal without transitioning
    pub fn check_start(&self) -> Result<(), ToneError> {
        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::Playing => Err(ToneError::AlreadyPlaying),
        }
    }

    pub fn started(&mut self) -> Result<(), ToneError> {
        self.check_start()?;
        self.state = SessionState::Playing;
        Ok(())
    }

    pub fn stopped(&mut self) -> Result<(), ToneError> {
        match self.state {
            SessionState::Playing => {
                self.state = SessionState::Idle;
                Ok(())
            }
            SessionState::Idle => Err(ToneError::NotPlaying),
        }
    }
}

pub struct ToneGenerator {
    graph: SignalGraph,
    controller: ParameterController,
    monitor: Monitor,
    lifecycle: SessionLifecycle,
}

impl ToneGenerator {
    pub fn new(device: Rc<dyn AudioDevice>, scheduler: Rc<dyn FrameScheduler>) -> Self {
        Self::with_config(
            device,
            scheduler,
            OscillatorConfig::default(),
            GainConfig::default(),
        )
    }

    /// Create with initial parameters (clamped into range)
    pub fn with_config(
        device: Rc<dyn AudioDevice>,
        scheduler: Rc<dyn FrameScheduler>,
        oscillator: OscillatorConfig,
        gain: GainConfig,
    ) -> Self {
        Self {
            graph: SignalGraph::new(device),
            controller: ParameterController::new(oscillator, gain),
            monitor: Monitor::new(scheduler),
            lifecycle: SessionLifecycle::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == SessionState::Playing
    }

    pub fn oscillator(&self) -> &OscillatorConfig {
        self.controller.oscillator()
    }

    pub fn gain(&self) -> &GainConfig {
        self.controller.gain()
    }

    /// Render ticks the monitor has completed
    pub fn monitor_ticks(&self) -> u64 {
        self.monitor.ticks()
    }

    /// Build the graph with the current parameters and arm the monitor
    pub fn start(&mut self) -> Result<(), ToneError> {
        self.lifecycle.check_start()?;
        let session = self
            .graph
            .start(self.controller.oscillator(), self.controller.gain())?;
        self.monitor.arm(session);
        self.lifecycle.started()?;
        log::info!("Session playing");
        Ok(())
    }

    /// Stop playback. Succeeds when already idle.
    ///
    /// The monitor is disarmed first, so no render tick fires once this
    /// returns. A device error during teardown is returned after everything
    /// has been released and the state is Idle.
    pub fn stop(&mut self) -> Result<(), ToneError> {
        if self.lifecycle.stopped().is_err() {
            log::debug!("stop() while idle ignored");
            return Ok(());
        }
        self.monitor.disarm();
        let result = match self.graph.stop() {
            Err(ToneError::NotPlaying) => Ok(()),
            other => other,
        };
        log::info!("Session idle");
        result
    }

    pub fn set_frequency(&mut self, hz: f32) -> Result<(), ToneError> {
        self.controller.set_frequency(&mut self.graph, hz)
    }

    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<(), ToneError> {
        self.controller.set_waveform(&mut self.graph, waveform)
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ToneError> {
        self.controller.set_volume(&mut self.graph, volume)
    }

    /// Bind the monitor's drawing surface. Works before or after `start()`.
    pub fn attach_visualizer(&mut self, surface: Box<dyn DrawingSurface>) {
        self.monitor.attach(surface);
    }

    pub fn detach_visualizer(&mut self) -> Option<Box<dyn DrawingSurface>> {
        self.monitor.detach()
    }

    /// Read the analyser snapshot directly (outside the monitor loop)
    pub fn read_frame(&self, frame: &mut SampleFrame) -> Result<(), ToneError> {
        self.graph.read_frame(frame)
    }
}

impl Drop for ToneGenerator {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Error stopping tone generator on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::offline::OfflineDevice;
    use crate::error::DeviceError;
    use crate::monitor::FrameLoop;
    use crate::testing::{rising_crossings, FaultyDevice, RecordingSurface};
    use std::cell::RefCell;

    struct Fixture {
        device: Rc<OfflineDevice>,
        frames: Rc<FrameLoop>,
        tone: ToneGenerator,
    }

    fn fixture() -> Fixture {
        let device = Rc::new(OfflineDevice::new(48000));
        let frames = Rc::new(FrameLoop::new());
        let tone = ToneGenerator::new(device.clone(), frames.clone());
        Fixture {
            device,
            frames,
            tone,
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut lifecycle = SessionLifecycle::new();
        assert_eq!(lifecycle.state(), SessionState::Idle);
        assert_eq!(lifecycle.stopped().unwrap_err(), ToneError::NotPlaying);
        lifecycle.started().unwrap();
        assert_eq!(lifecycle.state(), SessionState::Playing);
        assert_eq!(lifecycle.started().unwrap_err(), ToneError::AlreadyPlaying);
        lifecycle.stopped().unwrap();
        assert_eq!(lifecycle.state(), SessionState::Idle);
    }

    #[test]
    fn test_start_stop_cycle() {
        let mut fx = fixture();
        fx.tone.start().unwrap();
        assert_eq!(fx.tone.state(), SessionState::Playing);
        assert_eq!(fx.device.live_nodes(), 3);

        fx.tone.stop().unwrap();
        assert_eq!(fx.tone.state(), SessionState::Idle);
        assert_eq!(fx.device.live_nodes(), 0);

        fx.tone.start().unwrap();
        assert!(fx.tone.is_playing());
    }

    #[test]
    fn test_double_start_keeps_session() {
        let mut fx = fixture();
        fx.tone.start().unwrap();
        assert_eq!(fx.tone.start().unwrap_err(), ToneError::AlreadyPlaying);
        assert_eq!(fx.tone.state(), SessionState::Playing);
        assert_eq!(fx.device.live_nodes(), 3);
        assert_eq!(fx.frames.pending(), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut fx = fixture();
        assert!(fx.tone.stop().is_ok());
        fx.tone.start().unwrap();
        assert!(fx.tone.stop().is_ok());
        assert!(fx.tone.stop().is_ok());
        assert_eq!(fx.tone.state(), SessionState::Idle);
    }

    #[test]
    fn test_no_tick_after_stop() {
        let mut fx = fixture();
        let surface = RecordingSurface::new(300, 100);
        let strokes = surface.stroke_counter();
        fx.tone.attach_visualizer(Box::new(surface));

        fx.tone.start().unwrap();
        fx.device.render(2048);
        for _ in 0..3 {
            fx.frames.run_frame();
        }
        assert_eq!(strokes.get(), 3);

        fx.tone.stop().unwrap();
        assert_eq!(fx.frames.pending(), 0);
        // Grace period: keep driving frames and audio
        for _ in 0..10 {
            fx.device.render(128);
            fx.frames.run_frame();
        }
        assert_eq!(strokes.get(), 3);
        assert_eq!(fx.tone.monitor_ticks(), 3);
    }

    #[test]
    fn test_stop_during_frame_skips_pending_tick() {
        let device = Rc::new(OfflineDevice::new(48000));
        let frames = Rc::new(FrameLoop::new());
        let tone = Rc::new(RefCell::new(ToneGenerator::new(
            device.clone(),
            frames.clone(),
        )));
        let surface = RecordingSurface::new(300, 100);
        let strokes = surface.stroke_counter();
        tone.borrow_mut().attach_visualizer(Box::new(surface));

        tone.borrow_mut().start().unwrap();
        device.render(2048);
        frames.run_frame();
        frames.run_frame();
        assert_eq!(strokes.get(), 2);
        tone.borrow_mut().stop().unwrap();

        // Queue a stop ahead of the next session's first tick, so both run
        // in the same frame and the tick is already out of the queue
        let stopper = Rc::clone(&tone);
        frames.request_frame(Box::new(move || {
            stopper.borrow_mut().stop().unwrap();
        }));
        tone.borrow_mut().start().unwrap();
        assert_eq!(frames.pending(), 2);

        assert_eq!(frames.run_frame(), 2);
        assert_eq!(tone.borrow().state(), SessionState::Idle);
        assert_eq!(strokes.get(), 2);
        assert_eq!(frames.pending(), 0);
        for _ in 0..5 {
            device.render(128);
            frames.run_frame();
        }
        assert_eq!(strokes.get(), 2);
        assert_eq!(tone.borrow().monitor_ticks(), 2);
    }

    #[test]
    fn test_visualizer_attached_after_start() {
        let mut fx = fixture();
        fx.tone.start().unwrap();
        fx.frames.run_frame();

        let surface = RecordingSurface::new(300, 100);
        let strokes = surface.stroke_counter();
        fx.tone.attach_visualizer(Box::new(surface));
        fx.frames.run_frame();
        assert_eq!(strokes.get(), 1);
        assert_eq!(fx.tone.monitor_ticks(), 2);
    }

    #[test]
    fn test_idle_setters_are_deferred() {
        let mut fx = fixture();
        fx.tone.set_frequency(880.0).unwrap();
        fx.tone.set_volume(1.0).unwrap();
        fx.tone.set_waveform(Waveform::Sine).unwrap();
        assert_eq!(fx.device.live_nodes(), 0);

        fx.tone.start().unwrap();
        let out = fx.device.render(48000);
        assert!((879..=881).contains(&rising_crossings(&out)));
    }

    #[test]
    fn test_invalid_parameters_rejected_in_any_state() {
        let mut fx = fixture();
        assert!(matches!(
            fx.tone.set_frequency(10.0),
            Err(ToneError::InvalidParameter { .. })
        ));
        fx.tone.start().unwrap();
        assert!(matches!(
            fx.tone.set_frequency(2001.0),
            Err(ToneError::InvalidParameter { .. })
        ));
        assert!(matches!(
            fx.tone.set_volume(1.01),
            Err(ToneError::InvalidParameter { .. })
        ));
        assert_eq!(fx.tone.oscillator().frequency_hz, 440.0);
        assert_eq!(fx.tone.gain().volume, 0.5);
    }

    #[test]
    fn test_frequency_sweep_without_restart() {
        let mut fx = fixture();
        fx.tone.start().unwrap();
        for hz in (20..=2000).step_by(110) {
            fx.tone.set_frequency(hz as f32).unwrap();
            fx.device.render(128);
        }
        assert_eq!(fx.tone.state(), SessionState::Playing);
        assert_eq!(fx.device.live_nodes(), 3);
    }

    #[test]
    fn test_waveform_round_trip_releases_handles() {
        let mut fx = fixture();
        fx.tone.start().unwrap();
        fx.tone.set_waveform(Waveform::Square).unwrap();
        fx.tone.set_waveform(Waveform::Sine).unwrap();
        fx.tone.stop().unwrap();

        assert_eq!(fx.tone.state(), SessionState::Idle);
        assert_eq!(fx.device.live_nodes(), 0);
        fx.device.render(128);
        assert_eq!(fx.device.rendered_nodes(), 0);
        assert_eq!(fx.tone.oscillator().waveform, Waveform::Sine);
    }

    #[test]
    fn test_880_tick_frame() {
        let mut fx = fixture();
        fx.tone.start().unwrap();
        fx.tone.set_frequency(880.0).unwrap();
        fx.device.render(2048);
        fx.frames.run_frame();

        let mut frame = SampleFrame::new();
        fx.tone.read_frame(&mut frame).unwrap();
        assert_eq!(frame.samples().len(), 2048);
        assert!(frame.samples().iter().any(|&b| b != 128));
    }

    #[test]
    fn test_audio_unavailable_then_retry() {
        let device = Rc::new(FaultyDevice::new());
        let frames = Rc::new(FrameLoop::new());
        let mut tone = ToneGenerator::new(device.clone(), frames.clone());

        device.fail_resume.set(true);
        assert!(matches!(tone.start(), Err(ToneError::AudioUnavailable(_))));
        assert_eq!(tone.state(), SessionState::Idle);
        assert_eq!(frames.pending(), 0);

        device.fail_resume.set(false);
        tone.start().unwrap();
        assert!(tone.is_playing());
    }

    #[test]
    fn test_failed_teardown_still_goes_idle() {
        let device = Rc::new(FaultyDevice::new());
        let frames = Rc::new(FrameLoop::new());
        let mut tone = ToneGenerator::new(device.clone(), frames.clone());
        tone.start().unwrap();

        device.fail_disconnect.set(true);
        let err = tone.stop().unwrap_err();
        assert!(matches!(err, ToneError::Device(DeviceError::Stream(_))));
        assert_eq!(tone.state(), SessionState::Idle);
        assert_eq!(device.inner.live_nodes(), 0);
        assert_eq!(frames.pending(), 0);
        assert!(tone.stop().is_ok());
    }

    #[test]
    fn test_drop_stops_session() {
        let device = Rc::new(OfflineDevice::new(48000));
        let frames = Rc::new(FrameLoop::new());
        {
            let mut tone = ToneGenerator::new(device.clone(), frames.clone());
            tone.start().unwrap();
            assert_eq!(device.live_nodes(), 3);
        }
        assert_eq!(device.live_nodes(), 0);
        assert_eq!(frames.pending(), 0);
    }
}
