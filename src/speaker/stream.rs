//! Per-stream playback state: one decoder, one sink and the push algorithm.

use serde::Serialize;

use crate::audio::{DriftPolicy, Gain, GapAction, PlaybackSink, SkewAdjustment, StreamDecoder};
use crate::error::SinkError;

/// Extra room in the PCM scratch buffer for the duplicated skew sample.
const PCM_HEADROOM: usize = 4;

/// Counters describing what happened on one stream since it was started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Packets handed to `push` while the stream was playing.
    pub packets: u64,
    /// Concealment frames synthesized for lost packets.
    pub concealed_frames: u64,
    /// Resynchronizations after a long gap.
    pub resyncs: u64,
    pub underruns: u64,
    /// Packets whose decode failed and were dropped.
    pub codec_errors: u64,
    pub samples_dropped: u64,
    pub samples_inserted: u64,
    /// Device errors other than underruns.
    pub write_errors: u64,
}

/// Resources and timing state of a started stream.
///
/// Owns the decoder and the sink; dropping it destroys the decoder and
/// closes the device.
pub(crate) struct ActiveStream {
    decoder: Box<dyn StreamDecoder>,
    sink: Box<dyn PlaybackSink>,
    policy: DriftPolicy,
    packet_time_ms: u32,
    frame_size: usize,
    refill_threshold: usize,
    /// Sample time of the previous packet; `None` until the first packet after (re)start.
    last_timestamp: Option<u64>,
    pcm: Vec<i16>,
    stats: StreamStats,
}

impl ActiveStream {
    pub(crate) fn new(
        decoder: Box<dyn StreamDecoder>,
        sink: Box<dyn PlaybackSink>,
        policy: DriftPolicy,
        packet_time_ms: u32,
        frame_size: usize,
    ) -> Self {
        let refill_threshold = policy.refill_threshold(sink.buffer_size());
        Self {
            decoder,
            sink,
            policy,
            packet_time_ms,
            frame_size,
            refill_threshold,
            last_timestamp: None,
            pcm: vec![0; frame_size + PCM_HEADROOM],
            stats: StreamStats::default(),
        }
    }

    pub(crate) fn refill_threshold(&self) -> usize {
        self.refill_threshold
    }

    pub(crate) fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Restart decoding from silence; the next packet is treated as the first one.
    pub(crate) fn reset(&mut self) -> Result<(), crate::error::CodecError> {
        self.decoder.reset()?;
        self.last_timestamp = None;
        Ok(())
    }

    /// Handle one incoming packet. An empty packet is concealed.
    pub(crate) fn push(&mut self, packet: &[u8], sample_time: u64, gain: Gain) {
        self.stats.packets += 1;

        match self.last_timestamp {
            None => {
                // Start stream.
                self.prepare(self.policy.priming_threshold(self.refill_threshold));
            }
            Some(last) => {
                let gap = sample_time.saturating_sub(last);
                match self.policy.classify_gap(gap, self.packet_time_ms) {
                    GapAction::InSequence => {}
                    GapAction::Conceal(count) => {
                        for _ in 0..count {
                            self.stats.concealed_frames += 1;
                            self.decode_and_write(None, gain);
                        }
                    }
                    GapAction::Resync => self.resync(gap),
                }
            }
        }
        self.last_timestamp = Some(sample_time);

        let packet = if packet.is_empty() { None } else { Some(packet) };
        self.decode_and_write(packet, gain);
    }

    /// Restart the stream after a long gap.
    fn resync(&mut self, gap: u64) {
        log::debug!(
            "Speaker stream gap of {} us exceeds resync threshold, restarting",
            gap / 1_000
        );
        self.stats.resyncs += 1;
        if let Err(e) = self.sink.drop_buffered() {
            log::error!("Failed to drop speaker buffer: {}", e);
        }
        self.prepare(self.policy.priming_threshold(self.refill_threshold));
        if let Err(e) = self.decoder.reset() {
            log::error!("Failed to reset speaker decoder: {}", e);
        }
    }

    fn prepare(&mut self, start_threshold: usize) {
        if let Err(e) = self.sink.prepare(start_threshold) {
            log::error!("Failed to prepare speaker output: {}", e);
        }
    }

    /// Decode one frame (or a concealment frame), apply gain and skew correction, write it.
    fn decode_and_write(&mut self, packet: Option<&[u8]>, gain: Gain) {
        let frame_size = self.frame_size;
        let mut num = match self.decoder.decode(packet, &mut self.pcm[..frame_size]) {
            Ok(n) => n.min(frame_size),
            Err(e) => {
                log::error!("Speaker decode failed: {}", e);
                self.stats.codec_errors += 1;
                return;
            }
        };

        gain.apply(&mut self.pcm[..num]);

        // Clock skew compensation. Buffer errors from the query surface again on write.
        if num > 0 {
            if let Ok(free) = self.sink.free_space() {
                match self.policy.skew_adjustment(free, self.refill_threshold) {
                    SkewAdjustment::None => {}
                    SkewAdjustment::DropSample => {
                        num -= 1;
                        self.stats.samples_dropped += 1;
                    }
                    SkewAdjustment::DuplicateSample => {
                        self.pcm[num] = self.pcm[num - 1];
                        num += 1;
                        self.stats.samples_inserted += 1;
                    }
                }
            }
        }

        match self.sink.write(&self.pcm[..num]) {
            Ok(_) | Err(SinkError::Interrupted) => {}
            Err(SinkError::Underrun) => {
                // Recover with the smaller threshold so late packets do not overflow the buffer.
                self.stats.underruns += 1;
                self.prepare(self.refill_threshold);
                log::debug!("Recovered from speaker buffer underrun.");
            }
            Err(e) => {
                self.stats.write_errors += 1;
                log::error!("Speaker write failed: {}", e);
            }
        }
    }
}
