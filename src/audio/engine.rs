//! Live audio device using cpal for real-time audio output
//!
//! The cpal callback thread is the real-time context: it owns the render
//! graph, drains graph commands before every quantum and writes the mono
//! destination signal to every output channel.

use cpal::traits::{DeviceTrait, StreamTrait};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::commands::{command_queue, COMMAND_QUEUE_CAPACITY};
use super::context::DeviceCore;
use super::device::{
    get_output_device, get_supported_config, AudioConfig, AudioDevice, Endpoint, NodeId, ParamRef,
};
use super::render::{RenderGraph, RENDER_QUANTUM};
use super::signals::Waveform;
use crate::error::DeviceError;

/// State shared between the control thread and the audio thread
struct StreamShared {
    /// Frames rendered so far, published after every callback
    frames_rendered: AtomicU64,
    /// Set when the output had to be limited (cleared after being read)
    clipped: AtomicBool,
}

/// The live audio device. Created suspended; `resume()` starts the stream.
pub struct CpalDevice {
    stream: cpal::Stream,
    core: DeviceCore,
    shared: Arc<StreamShared>,
    running: Cell<bool>,
    device_name: String,
    channels: u16,
}

impl CpalDevice {
    /// Open an output device (the default one when `device_name` is None)
    pub fn open(device_name: Option<&str>, config: &AudioConfig) -> Result<Self, DeviceError> {
        let device = get_output_device(device_name)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let stream_config = get_supported_config(&device, config)?;

        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        log::info!(
            "Opening audio device '{}': {} Hz, {} channels",
            device_name,
            sample_rate,
            channels
        );

        let (sender, mut receiver) = command_queue(COMMAND_QUEUE_CAPACITY);
        let shared = Arc::new(StreamShared {
            frames_rendered: AtomicU64::new(0),
            clipped: AtomicBool::new(false),
        });
        let shared_clone = Arc::clone(&shared);

        let mut graph = RenderGraph::new(sample_rate);
        // Mono scratch buffer, allocated once. Steady-state rendering does not
        // allocate; graph edits (node creation and release) still do.
        let mut mono = vec![0.0f32; RENDER_QUANTUM];

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut clipped = false;
                    for chunk in data.chunks_mut(RENDER_QUANTUM * channels) {
                        let frames = chunk.len() / channels;
                        receiver.drain(|cmd| graph.apply(cmd));
                        graph.process(&mut mono[..frames]);

                        for (frame, &sample) in chunk.chunks_mut(channels).zip(&mono[..frames]) {
                            // Safety limiter: never send NaN or >0dBFS to the speakers
                            let sample = if !sample.is_finite() {
                                clipped = true;
                                0.0
                            } else if sample.abs() > 1.0 {
                                clipped = true;
                                sample.clamp(-1.0, 1.0)
                            } else {
                                sample
                            };
                            frame.fill(sample);
                        }
                    }
                    if clipped {
                        shared_clone.clipped.store(true, Ordering::Relaxed);
                    }
                    shared_clone
                        .frames_rendered
                        .store(graph.frame(), Ordering::Release);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None, // No timeout
            )
            .map_err(|e| DeviceError::Unavailable(format!("Failed to build output stream: {}", e)))?;

        // Some hosts start streams immediately; hold it until resume()
        if let Err(e) = stream.pause() {
            log::debug!("Stream could not be paused after creation: {}", e);
        }

        Ok(Self {
            stream,
            core: DeviceCore::new(sample_rate, sender),
            shared,
            running: Cell::new(false),
            device_name,
            channels: stream_config.channels,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Pause the stream. The clock stops with it.
    pub fn suspend(&self) -> Result<(), DeviceError> {
        if self.running.get() {
            self.stream
                .pause()
                .map_err(|e| DeviceError::Stream(format!("Failed to pause stream: {}", e)))?;
            self.running.set(false);
            log::info!("Audio device '{}' suspended", self.device_name);
        }
        Ok(())
    }

    /// Get and clear the clipping indicator
    pub fn take_clipping(&self) -> bool {
        self.shared.clipped.swap(false, Ordering::Relaxed)
    }
}

impl AudioDevice for CpalDevice {
    fn sample_rate(&self) -> u32 {
        self.core.sample_rate()
    }

    fn current_time(&self) -> f64 {
        self.shared.frames_rendered.load(Ordering::Acquire) as f64 / self.core.sample_rate() as f64
    }

    fn resume(&self) -> Result<(), DeviceError> {
        if !self.running.get() {
            self.stream
                .play()
                .map_err(|e| DeviceError::Unavailable(format!("Failed to start stream: {}", e)))?;
            self.running.set(true);
            log::info!("Audio device '{}' running", self.device_name);
        }
        Ok(())
    }

    fn create_oscillator(&self) -> Result<NodeId, DeviceError> {
        self.core.create_oscillator()
    }

    fn create_gain(&self) -> Result<NodeId, DeviceError> {
        self.core.create_gain()
    }

    fn create_analyser(&self, fft_size: usize) -> Result<NodeId, DeviceError> {
        self.core.create_analyser(fft_size)
    }

    fn connect(&self, from: NodeId, to: Endpoint) -> Result<(), DeviceError> {
        self.core.connect(from, to)
    }

    fn disconnect(&self, node: NodeId) -> Result<(), DeviceError> {
        self.core.disconnect(node)
    }

    fn start(&self, oscillator: NodeId, when: f64) -> Result<(), DeviceError> {
        self.core.start(oscillator, when)
    }

    fn stop(&self, oscillator: NodeId, when: f64) -> Result<(), DeviceError> {
        self.core.stop(oscillator, when)
    }

    fn set_waveform(&self, oscillator: NodeId, waveform: Waveform) -> Result<(), DeviceError> {
        self.core.set_waveform(oscillator, waveform)
    }

    fn set_value_at_time(&self, param: ParamRef, value: f32, time: f64) -> Result<(), DeviceError> {
        self.core.set_value_at_time(param, value, time)
    }

    fn set_target_at_time(
        &self,
        param: ParamRef,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<(), DeviceError> {
        self.core
            .set_target_at_time(param, target, start_time, time_constant)
    }

    fn read_time_domain(&self, analyser: NodeId, out: &mut [u8]) -> Result<(), DeviceError> {
        self.core.read_time_domain(analyser, out)
    }

    fn release(&self, node: NodeId) -> Result<(), DeviceError> {
        self.core.release(node)
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        log::info!("Audio device closed: {}", self.device_name);
    }
}
