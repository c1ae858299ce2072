//! Error types for the signal core and the audio devices behind it

use std::fmt;

use crate::audio::device::NodeId;

/// Errors reported by an [`AudioDevice`](crate::audio::device::AudioDevice)
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The host audio context could not be opened or resumed
    Unavailable(String),
    /// The node was never created or has already been released
    UnknownNode(NodeId),
    /// The operation does not apply to this kind of node
    WrongNodeKind { node: NodeId, expected: &'static str },
    InvalidArgument(String),
    /// The command queue to the real-time thread is full
    QueueFull,
    Stream(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Unavailable(msg) => write!(f, "Audio device unavailable: {msg}"),
            DeviceError::UnknownNode(node) => write!(f, "Unknown audio node {node}"),
            DeviceError::WrongNodeKind { node, expected } => {
                write!(f, "Audio node {node} is not a {expected} node")
            }
            DeviceError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            DeviceError::QueueFull => write!(f, "Audio command queue is full"),
            DeviceError::Stream(msg) => write!(f, "Audio stream error: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Errors surfaced to callers of the tone generator
#[derive(Debug, Clone, PartialEq)]
pub enum ToneError {
    /// The audio context could not be created or resumed (e.g. blocked until a
    /// user gesture). Retrying `start()` later is fine.
    AudioUnavailable(String),
    AlreadyPlaying,
    NotPlaying,
    InvalidParameter {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    /// A graph-level setter was called without an active session
    InvalidState(&'static str),
    Device(DeviceError),
}

impl fmt::Display for ToneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToneError::AudioUnavailable(msg) => write!(f, "Audio unavailable: {msg}"),
            ToneError::AlreadyPlaying => write!(f, "A signal session is already playing"),
            ToneError::NotPlaying => write!(f, "No signal session is playing"),
            ToneError::InvalidParameter {
                name,
                value,
                min,
                max,
            } => write!(f, "Invalid {name} {value}: expected a value in [{min}, {max}]"),
            ToneError::InvalidState(op) => write!(f, "Cannot {op} while idle"),
            ToneError::Device(e) => write!(f, "Device error: {e}"),
        }
    }
}

impl std::error::Error for ToneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToneError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for ToneError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Unavailable(msg) => ToneError::AudioUnavailable(msg),
            other => ToneError::Device(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_maps_to_audio_unavailable() {
        let err: ToneError = DeviceError::Unavailable("gesture required".into()).into();
        assert_eq!(err, ToneError::AudioUnavailable("gesture required".into()));

        let err: ToneError = DeviceError::QueueFull.into();
        assert_eq!(err, ToneError::Device(DeviceError::QueueFull));
    }

    #[test]
    fn test_display_messages() {
        let err = ToneError::InvalidParameter {
            name: "frequency",
            value: 5.0,
            min: 20.0,
            max: 2000.0,
        };
        assert_eq!(
            err.to_string(),
            "Invalid frequency 5: expected a value in [20, 2000]"
        );
        assert_eq!(
            ToneError::InvalidState("set waveform").to_string(),
            "Cannot set waveform while idle"
        );
    }
}
