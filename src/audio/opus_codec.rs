//! Opus decoder backend.
//!
//! Decodes at the stream's raw rate directly, so no resampling or channel
//! conversion is needed on the playback path.

use super::stream_decoder::{DecoderFactory, StreamDecoder};
use crate::error::CodecError;

/// Creates mono or stereo Opus decoders.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpusDecoderFactory;

impl DecoderFactory for OpusDecoderFactory {
    fn create(&self, sample_rate: u32, channels: u32) -> Result<Box<dyn StreamDecoder>, CodecError> {
        Ok(Box::new(OpusDecoder::new(sample_rate, channels)?))
    }
}

pub struct OpusDecoder {
    decoder: opus::Decoder,
}

impl OpusDecoder {
    /// Create a new Opus decoder.
    ///
    /// * `sample_rate` - Output rate (8000, 12000, 16000, 24000 or 48000)
    /// * `channels`    - 1 for mono, 2 for stereo
    pub fn new(sample_rate: u32, channels: u32) -> Result<Self, CodecError> {
        let channels = if channels == 1 {
            opus::Channels::Mono
        } else {
            opus::Channels::Stereo
        };

        let decoder = opus::Decoder::new(sample_rate, channels)
            .map_err(|e| CodecError::Init(e.to_string()))?;
        Ok(Self { decoder })
    }
}

impl StreamDecoder for OpusDecoder {
    fn decode(&mut self, packet: Option<&[u8]>, pcm: &mut [i16]) -> Result<usize, CodecError> {
        // An empty input makes libopus run packet loss concealment for `pcm.len()` samples.
        let input = packet.unwrap_or(&[]);
        self.decoder
            .decode(input, pcm, false)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        self.decoder
            .reset_state()
            .map_err(|e| CodecError::Reset(e.to_string()))
    }
}
