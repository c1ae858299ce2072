//! Real-time tone generation with a live waveform monitor.
//!
//! [`ToneGenerator`] plays a generator → gain → analyser chain on an
//! [`AudioDevice`], accepts frequency, waveform and volume changes while
//! sound is playing, and traces the live signal onto a [`DrawingSurface`]
//! once per display frame.

pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod logging;
pub mod monitor;
pub mod session;

#[cfg(test)]
mod testing;

pub use audio::device::AudioDevice;
pub use audio::engine::CpalDevice;
pub use audio::offline::OfflineDevice;
pub use audio::signals::{GainConfig, OscillatorConfig, Waveform};
pub use error::{DeviceError, ToneError};
pub use graph::SampleFrame;
pub use monitor::{AsciiSurface, DrawingSurface, FrameLoop, FrameScheduler};
pub use session::{SessionState, ToneGenerator};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
