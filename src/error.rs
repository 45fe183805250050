//! Error types for the speaker pipeline.

use std::error::Error as StdError;

use thiserror::Error;

use crate::speaker::{StreamHandle, StreamState};

/// Errors surfaced by [`crate::Speaker`] operations.
#[derive(Debug, Error)]
pub enum SpeakerError {
    /// Every stream slot of the output is busy. Callers should reject the new session.
    #[error("no additional concurrent speaker streams may be started")]
    OutOfResources,

    #[error("stale or unknown stream handle {0:?}")]
    InvalidHandle(StreamHandle),

    #[error("stream {handle:?} is {actual}, operation requires {expected}")]
    InvalidState {
        handle: StreamHandle,
        actual: StreamState,
        expected: &'static str,
    },

    #[error("packet time {requested} ms outside supported range 1..={max} ms")]
    InvalidPacketTime { requested: u32, max: u32 },

    #[error("unsupported sample rate {0} Hz")]
    InvalidSampleRate(u32),

    #[error("invalid volume {0}, expected 0..=100")]
    InvalidVolume(u8),

    #[error("failed to open playback sink: {0}")]
    SinkOpen(#[source] SinkError),

    #[error("failed to create decoder: {0}")]
    DecoderInit(#[source] CodecError),

    #[error("failed to reset decoder: {0}")]
    DecoderReset(#[source] CodecError),
}

/// Errors reported by a [`crate::audio::PlaybackSink`] backend.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The device buffer ran dry; it needs to be prepared again before playback resumes.
    #[error("playback buffer underrun")]
    Underrun,

    #[error("playback call interrupted")]
    Interrupted,

    #[error("playback device error: {0}")]
    Device(#[source] Box<dyn StdError + Send + Sync>),
}

impl SinkError {
    pub fn device<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        SinkError::Device(err.into())
    }
}

/// Errors reported by a [`crate::audio::StreamDecoder`] backend.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("decoder initialization failed: {0}")]
    Init(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("decoder reset failed: {0}")]
    Reset(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SpeakerError>;
