//! speaker_pipeline - Real-time playback of timestamped, codec-compressed audio packets
//!
//! A [`Speaker`] owns a fixed pool of streams for one audio output. Each
//! started stream binds one decoder and one playback sink, conceals lost
//! packets, resynchronizes after long stalls and corrects clock drift by
//! dropping or repeating a single sample per packet.
//!
//! ```no_run
//! # use speaker_pipeline::Speaker;
//! # fn run(speaker: &Speaker, packets: &[(u64, Vec<u8>)]) -> speaker_pipeline::error::Result<()> {
//! let handle = speaker.start_stream(20, 24_000)?;
//! speaker.set_volume(handle, 80)?;
//! for (sample_time, packet) in packets {
//!     speaker.push(handle, packet, *sample_time)?;
//! }
//! speaker.stop_stream(handle)?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod speaker;

pub use config::{Config, SpeakerConfig};
pub use error::{CodecError, SinkError, SpeakerError};
pub use speaker::{Speaker, StreamHandle, StreamState, StreamStats};
