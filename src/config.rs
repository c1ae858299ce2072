//! User settings, read from `<config_dir>/tonescope/settings.json`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::audio::device::AudioConfig;
use crate::audio::signals::{GainConfig, OscillatorConfig, Waveform};
use crate::controller::{sanitize_gain, sanitize_oscillator};

pub const MIN_REFRESH_RATE_HZ: u32 = 1;
pub const MAX_REFRESH_RATE_HZ: u32 = 240;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Invalid settings in {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Initial tone of a new session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneSettings {
    pub frequency_hz: f32,
    pub waveform: Waveform,
    pub volume: f32,
}

impl Default for ToneSettings {
    fn default() -> Self {
        let osc = OscillatorConfig::default();
        Self {
            frequency_hz: osc.frequency_hz,
            waveform: osc.waveform,
            volume: GainConfig::default().volume,
        }
    }
}

impl ToneSettings {
    pub fn oscillator(&self) -> OscillatorConfig {
        OscillatorConfig {
            frequency_hz: self.frequency_hz,
            waveform: self.waveform,
        }
    }

    pub fn gain(&self) -> GainConfig {
        GainConfig {
            volume: self.volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Output device name; `None` uses the host default
    pub output_device: Option<String>,
    pub audio: AudioConfig,
    pub tone: ToneSettings,
    pub refresh_rate_hz: u32,
    pub log_to_file: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_device: None,
            audio: AudioConfig::default(),
            tone: ToneSettings::default(),
            refresh_rate_hz: 60,
            log_to_file: false,
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tonescope").join("settings.json"))
    }

    /// Load from the default location. A missing file yields defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => {
                log::warn!("No config directory on this platform, using default settings");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`. A missing file yields defaults; out-of-range values
    /// are clamped.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let settings: Settings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings.sanitized())
    }

    fn sanitized(self) -> Self {
        let osc = sanitize_oscillator(self.tone.oscillator());
        let gain = sanitize_gain(self.tone.gain());
        let refresh_rate_hz = self
            .refresh_rate_hz
            .clamp(MIN_REFRESH_RATE_HZ, MAX_REFRESH_RATE_HZ);
        if refresh_rate_hz != self.refresh_rate_hz {
            log::warn!(
                "Refresh rate {} out of range, using {} Hz",
                self.refresh_rate_hz,
                refresh_rate_hz
            );
        }
        Self {
            tone: ToneSettings {
                frequency_hz: osc.frequency_hz,
                waveform: osc.waveform,
                volume: gain.volume,
            },
            refresh_rate_hz,
            ..self
        }
    }
}
