//! Shared test doubles

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::audio::device::{AudioDevice, Endpoint, NodeId, ParamRef};
use crate::audio::offline::OfflineDevice;
use crate::audio::signals::Waveform;
use crate::error::DeviceError;
use crate::monitor::DrawingSurface;

/// Count upward zero crossings
pub fn rising_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|pair| pair[0] < 0.0 && pair[1] >= 0.0)
        .count()
}

/// Surface that records draw calls instead of drawing
pub struct RecordingSurface {
    width: u32,
    height: u32,
    pub clears: usize,
    pub strokes: usize,
    pub points: Vec<(f64, f64)>,
    stroked: Rc<RefCell<Vec<(f64, f64)>>>,
    stroke_count: Rc<Cell<usize>>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            clears: 0,
            strokes: 0,
            points: Vec::new(),
            stroked: Rc::new(RefCell::new(Vec::new())),
            stroke_count: Rc::new(Cell::new(0)),
        }
    }

    /// Points of the last stroked path, readable after the surface is boxed
    pub fn log(&self) -> Rc<RefCell<Vec<(f64, f64)>>> {
        Rc::clone(&self.stroked)
    }

    pub fn stroke_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.stroke_count)
    }
}

impl DrawingSurface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.clears += 1;
    }

    fn begin_path(&mut self) {
        self.points.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.points.push((x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.points.push((x, y));
    }

    fn stroke(&mut self) {
        self.strokes += 1;
        self.stroke_count.set(self.strokes);
        *self.stroked.borrow_mut() = self.points.clone();
    }
}

/// Offline device with switchable failures
pub struct FaultyDevice {
    pub inner: OfflineDevice,
    pub fail_resume: Cell<bool>,
    pub fail_create_analyser: Cell<bool>,
    pub fail_disconnect: Cell<bool>,
    pub fail_read: Cell<bool>,
}

impl FaultyDevice {
    pub fn new() -> Self {
        Self {
            inner: OfflineDevice::new(48000),
            fail_resume: Cell::new(false),
            fail_create_analyser: Cell::new(false),
            fail_disconnect: Cell::new(false),
            fail_read: Cell::new(false),
        }
    }
}

impl AudioDevice for FaultyDevice {
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn current_time(&self) -> f64 {
        self.inner.current_time()
    }

    fn resume(&self) -> Result<(), DeviceError> {
        if self.fail_resume.get() {
            return Err(DeviceError::Unavailable("no output device".into()));
        }
        self.inner.resume()
    }

    fn create_oscillator(&self) -> Result<NodeId, DeviceError> {
        self.inner.create_oscillator()
    }

    fn create_gain(&self) -> Result<NodeId, DeviceError> {
        self.inner.create_gain()
    }

    fn create_analyser(&self, fft_size: usize) -> Result<NodeId, DeviceError> {
        if self.fail_create_analyser.get() {
            return Err(DeviceError::Stream("analyser allocation failed".into()));
        }
        self.inner.create_analyser(fft_size)
    }

    fn connect(&self, from: NodeId, to: Endpoint) -> Result<(), DeviceError> {
        self.inner.connect(from, to)
    }

    fn disconnect(&self, node: NodeId) -> Result<(), DeviceError> {
        if self.fail_disconnect.get() {
            return Err(DeviceError::Stream(format!("disconnect {} failed", node)));
        }
        self.inner.disconnect(node)
    }

    fn start(&self, oscillator: NodeId, when: f64) -> Result<(), DeviceError> {
        self.inner.start(oscillator, when)
    }

    fn stop(&self, oscillator: NodeId, when: f64) -> Result<(), DeviceError> {
        self.inner.stop(oscillator, when)
    }

    fn set_waveform(&self, oscillator: NodeId, waveform: Waveform) -> Result<(), DeviceError> {
        self.inner.set_waveform(oscillator, waveform)
    }

    fn set_value_at_time(&self, param: ParamRef, value: f32, time: f64) -> Result<(), DeviceError> {
        self.inner.set_value_at_time(param, value, time)
    }

    fn set_target_at_time(
        &self,
        param: ParamRef,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<(), DeviceError> {
        self.inner
            .set_target_at_time(param, target, start_time, time_constant)
    }

    fn read_time_domain(&self, analyser: NodeId, out: &mut [u8]) -> Result<(), DeviceError> {
        if self.fail_read.get() {
            return Err(DeviceError::Stream("analyser read failed".into()));
        }
        self.inner.read_time_domain(analyser, out)
    }

    fn release(&self, node: NodeId) -> Result<(), DeviceError> {
        self.inner.release(node)
    }
}
