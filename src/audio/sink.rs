//! Playback sink abstraction: a buffered, fixed-rate mono output device.

use crate::error::SinkError;

/// Parameters requested when opening a playback sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkParams {
    /// Device name (e.g. "default", "plughw:0,0")
    pub device: String,
    pub sample_rate: u32,
    /// Always 1; samples are signed 16-bit.
    pub channels: u32,
    /// Requested ring buffer depth in samples. The device may round it.
    pub buffer_size: usize,
    /// Requested period size in samples, normally one packet.
    pub period_size: usize,
}

/// An opened playback device owned by exactly one stream.
///
/// Dropping the sink closes the device.
pub trait PlaybackSink: Send {
    /// Actual buffer depth in samples after the device negotiated it.
    fn buffer_size(&self) -> usize;

    /// Number of samples that can currently be written without blocking.
    fn free_space(&mut self) -> Result<usize, SinkError>;

    /// Queue samples for playback and return how many were accepted.
    fn write(&mut self, samples: &[i16]) -> Result<usize, SinkError>;

    /// Set the start threshold in samples and prepare the device for (re)starting.
    fn prepare(&mut self, start_threshold: usize) -> Result<(), SinkError>;

    /// Discard everything still queued in the device buffer.
    fn drop_buffered(&mut self) -> Result<(), SinkError>;
}

/// Opens playback sinks for newly started streams.
pub trait SinkOpener: Send + Sync {
    fn open(&self, params: &SinkParams) -> Result<Box<dyn PlaybackSink>, SinkError>;
}
