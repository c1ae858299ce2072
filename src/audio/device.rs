//! Audio device capability and output device enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::signals::Waveform;
use crate::error::DeviceError;

/// Handle to a node living inside an audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a node's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Node(NodeId),
    /// The device's speakers
    Destination,
}

/// Automatable parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Oscillator frequency in Hz
    Frequency,
    /// Linear gain factor
    Gain,
}

/// A parameter of a specific node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRef {
    pub node: NodeId,
    pub kind: ParamKind,
}

impl ParamRef {
    pub fn frequency(node: NodeId) -> Self {
        Self {
            node,
            kind: ParamKind::Frequency,
        }
    }

    pub fn gain(node: NodeId) -> Self {
        Self {
            node,
            kind: ParamKind::Gain,
        }
    }
}

/// Host audio capability the signal graph is built on.
///
/// Methods take `&self`: the device is a shared context, used from the single
/// control thread. Everything that touches generated samples happens on the
/// device's own real-time context; these calls only enqueue timestamped
/// commands for it and never wait on it.
pub trait AudioDevice {
    fn sample_rate(&self) -> u32;

    /// Device clock in seconds: frames rendered so far divided by the sample rate
    fn current_time(&self) -> f64;

    /// Start the real-time context if it is suspended
    fn resume(&self) -> Result<(), DeviceError>;

    fn create_oscillator(&self) -> Result<NodeId, DeviceError>;
    fn create_gain(&self) -> Result<NodeId, DeviceError>;
    /// `fft_size` must be a power of two in [32, 32768]
    fn create_analyser(&self, fft_size: usize) -> Result<NodeId, DeviceError>;

    fn connect(&self, from: NodeId, to: Endpoint) -> Result<(), DeviceError>;
    /// Remove all outgoing connections of `node`
    fn disconnect(&self, node: NodeId) -> Result<(), DeviceError>;

    fn start(&self, oscillator: NodeId, when: f64) -> Result<(), DeviceError>;
    fn stop(&self, oscillator: NodeId, when: f64) -> Result<(), DeviceError>;
    fn set_waveform(&self, oscillator: NodeId, waveform: Waveform) -> Result<(), DeviceError>;

    fn set_value_at_time(&self, param: ParamRef, value: f32, time: f64) -> Result<(), DeviceError>;
    /// Approach `target` exponentially starting at `start_time`
    fn set_target_at_time(
        &self,
        param: ParamRef,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<(), DeviceError>;

    /// Fill `out` with the analyser's most recent samples as bytes (128 = silence)
    fn read_time_domain(&self, analyser: NodeId, out: &mut [u8]) -> Result<(), DeviceError>;

    /// Destroy a node. The handle is invalid once this returns.
    fn release(&self, node: NodeId) -> Result<(), DeviceError>;
}

// ============================================================================
// Output device enumeration (cpal)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 512,
        }
    }
}

/// Get list of available output devices
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .map_err(|e| DeviceError::Unavailable(format!("Failed to enumerate devices: {}", e)))?;

    let mut result = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            result.push(AudioDeviceInfo {
                is_default: Some(&name) == default_name.as_ref(),
                name,
            });
        }
    }

    Ok(result)
}

/// Get output device by name, or default if name is None
pub fn get_output_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();

    match name {
        Some(device_name) => {
            let devices = host.output_devices().map_err(|e| {
                DeviceError::Unavailable(format!("Failed to enumerate devices: {}", e))
            })?;

            for device in devices {
                if let Ok(n) = device.name() {
                    if n == device_name {
                        return Ok(device);
                    }
                }
            }
            Err(DeviceError::Unavailable(format!(
                "Device '{}' not found",
                device_name
            )))
        }
        None => host
            .default_output_device()
            .ok_or_else(|| DeviceError::Unavailable("No default output device found".to_string())),
    }
}

/// Get supported config for a device, falling back to its default
pub fn get_supported_config(
    device: &cpal::Device,
    preferred: &AudioConfig,
) -> Result<cpal::StreamConfig, DeviceError> {
    let supported_configs = device.supported_output_configs().map_err(|e| {
        DeviceError::Unavailable(format!("Failed to get supported configs: {}", e))
    })?;

    for config in supported_configs {
        let min_rate = config.min_sample_rate().0;
        let max_rate = config.max_sample_rate().0;

        if preferred.sample_rate >= min_rate
            && preferred.sample_rate <= max_rate
            && config.channels() >= preferred.channels
            && config.sample_format() == cpal::SampleFormat::F32
        {
            return Ok(cpal::StreamConfig {
                channels: preferred.channels,
                sample_rate: cpal::SampleRate(preferred.sample_rate),
                buffer_size: cpal::BufferSize::Fixed(preferred.buffer_size),
            });
        }
    }

    let default_config = device
        .default_output_config()
        .map_err(|e| DeviceError::Unavailable(format!("Failed to get default config: {}", e)))?;

    Ok(cpal::StreamConfig {
        channels: default_config.channels().min(2),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    })
}
