//! Recording mock backends for driving a `Speaker` without audio hardware.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use speaker_pipeline::audio::{
    DecoderFactory, DriftPolicy, PlaybackSink, SinkOpener, SinkParams, StreamDecoder,
};
use speaker_pipeline::{CodecError, SinkError, Speaker, SpeakerConfig};

/// Sample value produced by a concealment decode.
pub const CONCEAL_SAMPLE: i16 = 7;

/// Packet content that makes the mock decoder fail.
pub const BAD_PACKET: &[u8] = b"bad";

/// Free space between the default refill threshold (1800) and 3x of it.
pub const NEUTRAL_FREE_SPACE: usize = 3_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SinkOpened(SinkParams),
    Prepare(usize),
    DropBuffered,
    Write(Vec<i16>),
    SinkClosed,
    DecoderCreated { sample_rate: u32, channels: u32 },
    Decode { conceal: bool },
    DecoderReset,
    DecoderDestroyed,
}

/// Shared state of all mock backends created by one speaker.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    pub free_space: AtomicUsize,
    pub underrun_next_write: AtomicBool,
    pub device_error_next_write: AtomicBool,
    pub fail_sink_open: AtomicBool,
    pub fail_decoder_create: AtomicBool,
    pub fail_decoder_reset: AtomicBool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        let recorder = Recorder::default();
        recorder.free_space.store(NEUTRAL_FREE_SPACE, Ordering::SeqCst);
        Arc::new(recorder)
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Return and forget everything recorded so far.
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn writes(&self) -> Vec<Vec<i16>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write(samples) => Some(samples),
                _ => None,
            })
            .collect()
    }

    pub fn set_free_space(&self, free: usize) {
        self.free_space.store(free, Ordering::SeqCst);
    }
}

pub fn count(events: &[Event], wanted: &Event) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}

pub fn conceal_decodes(events: &[Event]) -> usize {
    count(events, &Event::Decode { conceal: true })
}

pub struct MockSinkOpener(pub Arc<Recorder>);

impl SinkOpener for MockSinkOpener {
    fn open(&self, params: &SinkParams) -> Result<Box<dyn PlaybackSink>, SinkError> {
        if self.0.fail_sink_open.load(Ordering::SeqCst) {
            return Err(SinkError::device("no such device"));
        }
        self.0.record(Event::SinkOpened(params.clone()));
        Ok(Box::new(MockSink {
            recorder: self.0.clone(),
            buffer_size: params.buffer_size,
        }))
    }
}

pub struct MockSink {
    recorder: Arc<Recorder>,
    buffer_size: usize,
}

impl PlaybackSink for MockSink {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn free_space(&mut self) -> Result<usize, SinkError> {
        Ok(self.recorder.free_space.load(Ordering::SeqCst))
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize, SinkError> {
        if self.recorder.underrun_next_write.swap(false, Ordering::SeqCst) {
            return Err(SinkError::Underrun);
        }
        if self.recorder.device_error_next_write.swap(false, Ordering::SeqCst) {
            return Err(SinkError::device("input/output error"));
        }
        self.recorder.record(Event::Write(samples.to_vec()));
        Ok(samples.len())
    }

    fn prepare(&mut self, start_threshold: usize) -> Result<(), SinkError> {
        self.recorder.record(Event::Prepare(start_threshold));
        Ok(())
    }

    fn drop_buffered(&mut self) -> Result<(), SinkError> {
        self.recorder.record(Event::DropBuffered);
        Ok(())
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        self.recorder.record(Event::SinkClosed);
    }
}

pub struct MockDecoderFactory(pub Arc<Recorder>);

impl DecoderFactory for MockDecoderFactory {
    fn create(&self, sample_rate: u32, channels: u32) -> Result<Box<dyn StreamDecoder>, CodecError> {
        if self.0.fail_decoder_create.load(Ordering::SeqCst) {
            return Err(CodecError::Init("out of memory".to_string()));
        }
        self.0.record(Event::DecoderCreated {
            sample_rate,
            channels,
        });
        Ok(Box::new(MockDecoder {
            recorder: self.0.clone(),
        }))
    }
}

/// Produces a constant block: `packet[0] * 100` for real packets, [`CONCEAL_SAMPLE`] otherwise.
pub struct MockDecoder {
    recorder: Arc<Recorder>,
}

impl StreamDecoder for MockDecoder {
    fn decode(&mut self, packet: Option<&[u8]>, pcm: &mut [i16]) -> Result<usize, CodecError> {
        self.recorder.record(Event::Decode {
            conceal: packet.is_none(),
        });
        let value = match packet {
            Some(BAD_PACKET) => return Err(CodecError::Decode("corrupted stream".to_string())),
            Some(data) => i16::from(data[0]) * 100,
            None => CONCEAL_SAMPLE,
        };
        pcm.fill(value);
        Ok(pcm.len())
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        if self.recorder.fail_decoder_reset.load(Ordering::SeqCst) {
            return Err(CodecError::Reset("decoder state lost".to_string()));
        }
        self.recorder.record(Event::DecoderReset);
        Ok(())
    }
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        self.recorder.record(Event::DecoderDestroyed);
    }
}

/// Speaker with `max_streams` slots on top of the mock backends, default 24 kHz setup.
pub fn mock_speaker(max_streams: usize) -> (Speaker, Arc<Recorder>) {
    let recorder = Recorder::new();
    let config = SpeakerConfig {
        device: "mock".to_string(),
        max_streams,
        ..SpeakerConfig::default()
    };
    let speaker = Speaker::new(
        config,
        DriftPolicy::default(),
        Box::new(MockSinkOpener(recorder.clone())),
        Box::new(MockDecoderFactory(recorder.clone())),
    );
    (speaker, recorder)
}

pub const MS: u64 = 1_000_000;
