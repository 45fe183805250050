//! audio - Codec, playback device and signal helpers for the speaker pipeline
//!
//! Backends are pluggable: any codec implementing [`StreamDecoder`] and any
//! output implementing [`PlaybackSink`] can drive a stream. ALSA and Opus
//! backends are available behind the `alsa-sink` and `opus-codec` features.

#[cfg(feature = "alsa-sink")]
mod alsa_device;
pub mod drift;
pub mod gain;
#[cfg(feature = "opus-codec")]
mod opus_codec;
pub mod sink;
pub mod stream_decoder;

#[cfg(feature = "alsa-sink")]
pub use alsa_device::{AlsaSink, AlsaSinkOpener};
pub use drift::{DriftPolicy, GapAction, SkewAdjustment};
pub use gain::{Gain, GainControl};
#[cfg(feature = "opus-codec")]
pub use opus_codec::{OpusDecoder, OpusDecoderFactory};
pub use sink::{PlaybackSink, SinkOpener, SinkParams};
pub use stream_decoder::{DecoderFactory, StreamDecoder};
