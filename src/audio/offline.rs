//! Offline audio device
//!
//! Runs the same render graph as the cpal engine, but only when asked to.
//! The clock advances exactly by the frames rendered, which makes playback
//! fully deterministic.

use std::cell::{Cell, RefCell};

use super::commands::{command_queue, CommandReceiver, COMMAND_QUEUE_CAPACITY};
use super::context::DeviceCore;
use super::device::{AudioDevice, Endpoint, NodeId, ParamRef};
use super::render::RenderGraph;
use super::signals::Waveform;
use crate::error::DeviceError;

pub struct OfflineDevice {
    core: DeviceCore,
    receiver: RefCell<CommandReceiver>,
    graph: RefCell<RenderGraph>,
    resumed: Cell<bool>,
}

impl OfflineDevice {
    pub fn new(sample_rate: u32) -> Self {
        let (sender, receiver) = command_queue(COMMAND_QUEUE_CAPACITY);
        Self {
            core: DeviceCore::new(sample_rate, sender),
            receiver: RefCell::new(receiver),
            graph: RefCell::new(RenderGraph::new(sample_rate)),
            resumed: Cell::new(false),
        }
    }

    /// Render `frames` frames of destination output. Pending commands are
    /// applied before every quantum, as on a live device.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        let mut receiver = self.receiver.borrow_mut();
        let mut graph = self.graph.borrow_mut();
        for chunk in out.chunks_mut(super::render::RENDER_QUANTUM) {
            receiver.drain(|cmd| graph.apply(cmd));
            graph.process(chunk);
        }
        out
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed.get()
    }

    /// Nodes alive on the control side
    pub fn live_nodes(&self) -> usize {
        self.core.live_nodes()
    }

    /// Nodes alive in the render graph (as of the last render)
    pub fn rendered_nodes(&self) -> usize {
        self.graph.borrow().node_count()
    }
}

impl AudioDevice for OfflineDevice {
    fn sample_rate(&self) -> u32 {
        self.core.sample_rate()
    }

    fn current_time(&self) -> f64 {
        self.graph.borrow().frame() as f64 / self.core.sample_rate() as f64
    }

    fn resume(&self) -> Result<(), DeviceError> {
        self.resumed.set(true);
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
