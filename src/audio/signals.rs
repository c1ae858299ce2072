//! Signal configuration types shared by the graph, controller and devices

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest accepted generator frequency in Hz
pub const MIN_FREQUENCY_HZ: f32 = 20.0;
/// Highest accepted generator frequency in Hz
pub const MAX_FREQUENCY_HZ: f32 = 2000.0;

pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 1.0;

/// Time constant of the volume approach curve, in seconds
pub const VOLUME_TIME_CONSTANT: f64 = 0.010;

/// Number of samples in one analyser snapshot
pub const ANALYSER_BUFFER_SIZE: usize = 2048;

/// Generator waveform shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            _ => Err(format!("Unknown waveform: {}", s)),
        }
    }
}

/// Generator settings, mutable for the life of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorConfig {
    pub frequency_hz: f32,
    pub waveform: Waveform,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            waveform: Waveform::Sine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainConfig {
    pub volume: f32,
}

impl Default for GainConfig {
    fn default() -> Self {
        Self { volume: 0.5 }
    }
}

/// Analyser settings. The buffer size is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyserConfig {
    pub buffer_size: usize,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            buffer_size: ANALYSER_BUFFER_SIZE,
        }
    }
}
