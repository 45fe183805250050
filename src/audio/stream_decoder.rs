//! Generic stream decoder trait so any codec backend can feed the speaker pipeline.

use crate::error::CodecError;

/// A stateful decoder that turns one compressed packet into a block of mono
/// i16 PCM samples at the stream's raw sample rate.
///
/// Dropping the decoder releases the codec instance.
pub trait StreamDecoder: Send {
    /// Decode one packet into `pcm` and return the number of samples produced.
    ///
    /// `pcm.len()` is the expected frame size. `None` asks the codec for a
    /// concealment frame continuing the previous output.
    fn decode(&mut self, packet: Option<&[u8]>, pcm: &mut [i16]) -> Result<usize, CodecError>;

    /// Return the codec to a fresh, silence-equivalent state without reallocating it.
    fn reset(&mut self) -> Result<(), CodecError>;
}

/// Creates decoder instances for newly started streams.
pub trait DecoderFactory: Send + Sync {
    fn create(&self, sample_rate: u32, channels: u32) -> Result<Box<dyn StreamDecoder>, CodecError>;
}
