//! Configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file) yields a working
//! setup for a 24 kHz Opus speaker on the "default" ALSA device.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::DriftPolicy;
use crate::audio::gain::MAX_VOLUME;
use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub speaker: SpeakerConfig,
    pub drift: DriftPolicy,
}

/// Settings of one physical audio output and its stream pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerConfig {
    /// ALSA playback device name
    pub device: String,
    /// Number of concurrently playable streams
    pub max_streams: usize,
    /// Raw decode/playback rate, independent of the negotiated codec rate
    pub raw_sample_rate: u32,
    /// Longest accepted packet time in ms
    pub max_packet_time_ms: u32,
    /// Length of the device jitter buffer in ms
    pub buffer_time_ms: u32,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            max_streams: 1,
            raw_sample_rate: 24_000,
            max_packet_time_ms: 60,
            buffer_time_ms: 300,
        }
    }
}

impl SpeakerConfig {
    /// Device buffer depth in samples at `sample_rate`.
    pub fn buffer_size(&self, sample_rate: u32) -> usize {
        samples_in(sample_rate, self.buffer_time_ms)
    }
}

/// Longest accepted device buffer.
pub const MAX_BUFFER_TIME_MS: u32 = 10_000;

/// Number of samples covering `millis` ms at `sample_rate`, rounded down.
pub(crate) fn samples_in(sample_rate: u32, millis: u32) -> usize {
    (u64::from(sample_rate) * u64::from(millis) / 1000) as usize
}

/// Settings of the UDP packet bridge binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub listen_port: u16,
    /// Packet time negotiated for the incoming stream
    pub packet_time_ms: u32,
    pub volume: u8,
    pub muted: bool,
    /// Packets queued between the socket task and the playback thread
    pub channel_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_port: 5004,
            packet_time_ms: 20,
            volume: MAX_VOLUME,
            muted: false,
            channel_capacity: 64,
        }
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let speaker = &self.speaker;
        if speaker.max_streams == 0 {
            return Err(invalid("speaker.max_streams must be at least 1"));
        }
        if speaker.raw_sample_rate < 1000 {
            return Err(invalid(format!(
                "speaker.raw_sample_rate {} is below 1000 Hz",
                speaker.raw_sample_rate
            )));
        }
        if speaker.max_packet_time_ms == 0 {
            return Err(invalid("speaker.max_packet_time_ms must be non-zero"));
        }
        if speaker.buffer_time_ms < speaker.max_packet_time_ms {
            return Err(invalid(format!(
                "speaker.buffer_time_ms {} is shorter than max packet time {}",
                speaker.buffer_time_ms, speaker.max_packet_time_ms
            )));
        }
        if speaker.buffer_time_ms > MAX_BUFFER_TIME_MS {
            return Err(invalid(format!(
                "speaker.buffer_time_ms {} exceeds {} ms",
                speaker.buffer_time_ms, MAX_BUFFER_TIME_MS
            )));
        }
        if self.bridge.volume > MAX_VOLUME {
            return Err(invalid(format!("bridge.volume {} exceeds 100", self.bridge.volume)));
        }
        if self.bridge.packet_time_ms == 0
            || self.bridge.packet_time_ms > speaker.max_packet_time_ms
        {
            return Err(invalid(format!(
                "bridge.packet_time_ms {} must be within 1..={}",
                self.bridge.packet_time_ms, speaker.max_packet_time_ms
            )));
        }
        if self.bridge.channel_capacity == 0 {
            return Err(invalid("bridge.channel_capacity must be non-zero"));
        }
        self.drift.validate().map_err(ConfigError::Invalid)
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
