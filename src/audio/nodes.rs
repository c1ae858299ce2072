//! Render-side node implementations: oscillator, gain and analyser tap

use parking_lot::Mutex;
use std::f32::consts::PI;
use std::sync::Arc;

use super::params::AudioParam;
use super::signals::Waveform;

/// Oscillator shape as the render graph understands it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Sine,
    Square,
    Saw,
    Triangle,
}

impl From<Waveform> for Shape {
    fn from(waveform: Waveform) -> Self {
        match waveform {
            Waveform::Sine => Shape::Sine,
            Waveform::Square => Shape::Square,
            Waveform::Sawtooth => Shape::Saw,
            Waveform::Triangle => Shape::Triangle,
        }
    }
}

impl Shape {
    /// Sample the shape at `phase` in [0, 1)
    #[inline]
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Shape::Sine => (2.0 * PI * phase).sin(),
            Shape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Shape::Saw => 2.0 * phase - 1.0,
            Shape::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
        }
    }
}

/// Periodic source with a scheduled start and stop
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub shape: Shape,
    pub frequency: AudioParam,
    phase: f32,
    start_at: Option<f64>,
    stop_at: Option<f64>,
}

impl Oscillator {
    pub fn new(sample_rate: f64) -> Self {
        let nyquist = (sample_rate / 2.0) as f32;
        Self {
            shape: Shape::Sine,
            frequency: AudioParam::new(440.0, -nyquist, nyquist),
            phase: 0.0,
            start_at: None,
            stop_at: None,
        }
    }

    pub fn start(&mut self, when: f64) {
        if self.start_at.is_none() {
            self.start_at = Some(when);
        }
    }

    pub fn stop(&mut self, when: f64) {
        self.stop_at = Some(when);
    }

    #[inline]
    fn is_sounding(&self, time: f64) -> bool {
        match (self.start_at, self.stop_at) {
            (Some(start), Some(stop)) => time >= start && time < stop,
            (Some(start), None) => time >= start,
            _ => false,
        }
    }

    pub fn render(&mut self, output: &mut [f32], first_frame: u64, sample_rate: f64) {
        for (i, out) in output.iter_mut().enumerate() {
            let time = (first_frame + i as u64) as f64 / sample_rate;
            let freq = self.frequency.next_value(time, sample_rate);
            if self.is_sounding(time) {
                *out = self.shape.sample(self.phase);
                self.phase += freq / sample_rate as f32;
                self.phase -= self.phase.floor();
            } else {
                *out = 0.0;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gain {
    pub gain: AudioParam,
}

impl Gain {
    pub fn new() -> Self {
        Self {
            gain: AudioParam::new(1.0, f32::MIN, f32::MAX),
        }
    }

    pub fn render(&mut self, input: &[f32], output: &mut [f32], first_frame: u64, sample_rate: f64) {
        for (i, (out, &x)) in output.iter_mut().zip(input).enumerate() {
            let time = (first_frame + i as u64) as f64 / sample_rate;
            *out = x * self.gain.next_value(time, sample_rate);
        }
    }
}

/// Rolling history written by the audio thread and read by the control thread
#[derive(Debug)]
struct TapBuffer {
    samples: Vec<f32>,
    write_pos: usize,
}

/// Shared snapshot buffer of an analyser node
#[derive(Debug)]
pub struct AnalyserTap {
    history: Mutex<TapBuffer>,
    size: usize,
}

impl AnalyserTap {
    pub fn new(size: usize) -> Self {
        Self {
            history: Mutex::new(TapBuffer {
                samples: vec![0.0; size],
                write_pos: 0,
            }),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Append samples from the audio thread. Never blocks: if the control
    /// thread is mid-read the block is skipped.
    #[inline]
    pub fn write(&self, block: &[f32]) -> bool {
        let Some(mut history) = self.history.try_lock() else {
            return false;
        };
        for &sample in block {
            let pos = history.write_pos;
            history.samples[pos] = sample;
            history.write_pos = (pos + 1) % self.size;
        }
        true
    }

    /// Copy the most recent samples, oldest first, as unsigned bytes where
    /// 128 is zero amplitude
    pub fn read_bytes(&self, out: &mut [u8]) {
        let history = self.history.lock();
        let n = out.len().min(self.size);
        let start = (history.write_pos + self.size - n) % self.size;
        for (i, byte) in out.iter_mut().take(n).enumerate() {
            let sample = history.samples[(start + i) % self.size];
            *byte = sample_to_byte(sample);
        }
    }
}

/// Quantize a sample in [-1, 1] to a byte centered at 128
#[inline]
pub fn sample_to_byte(sample: f32) -> u8 {
    if !sample.is_finite() {
        return 128;
    }
    (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8
}

/// Pass-through node that records what flows through it
#[derive(Debug, Clone)]
pub struct Analyser {
    pub tap: Arc<AnalyserTap>,
}

impl Analyser {
    pub fn render(&mut self, input: &[f32], output: &mut [f32]) {
        output.copy_from_slice(input);
        self.tap.write(input);
    }
}
