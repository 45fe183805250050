//! Packet gap classification and per-packet clock skew correction.
//!
//! Two decisions are made for every pushed packet:
//! - from the timestamp gap to the previous packet: play on, conceal one or
//!   two lost packets, or drop the device buffer and resynchronize;
//! - from the free space in the device buffer: drop or duplicate one sample
//!   so the local clock slowly follows the sender's clock.

use serde::{Deserialize, Serialize};

const NANOS_PER_MILLI_PER_PERMILLE: u64 = 1_000;

/// What to do before decoding a packet, based on its gap to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapAction {
    /// Roughly one packet time since the previous packet.
    InSequence,
    /// Synthesize this many concealment frames (1 or 2) first.
    Conceal(u8),
    /// Long stall: drop buffered audio, re-prime the device and reset the decoder.
    Resync,
}

/// One-sample correction applied to a decoded block before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkewAdjustment {
    None,
    /// The device buffer is nearly full: write one sample less.
    DropSample,
    /// The device buffer is draining: repeat the last sample once.
    DuplicateSample,
}

/// Tuning constants for gap handling and skew correction.
///
/// Gap thresholds are expressed in thousandths of the packet time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftPolicy {
    /// Above this gap one concealment frame is generated.
    pub conceal_once_permille: u32,
    /// Above this gap a second concealment frame is generated.
    pub conceal_twice_permille: u32,
    /// Above this gap the stream is resynchronized instead of concealed.
    pub resync_permille: u32,
    /// Refill threshold = device buffer size / this.
    pub refill_divisor: u32,
    /// Free space above refill threshold * this inserts a sample.
    pub overfill_factor: u32,
    /// Start threshold after a (re)start = refill threshold * this.
    pub prime_factor: u32,
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self {
            conceal_once_permille: 1_500,
            conceal_twice_permille: 2_500,
            resync_permille: 3_500,
            refill_divisor: 4,
            overfill_factor: 3,
            prime_factor: 2,
        }
    }
}

impl DriftPolicy {
    /// Check the policy is internally consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.refill_divisor == 0 {
            return Err("drift.refill_divisor must be non-zero".to_string());
        }
        if !(self.conceal_once_permille < self.conceal_twice_permille
            && self.conceal_twice_permille < self.resync_permille)
        {
            return Err(format!(
                "drift thresholds must increase strictly: {} < {} < {}",
                self.conceal_once_permille, self.conceal_twice_permille, self.resync_permille
            ));
        }
        if self.prime_factor == 0 {
            return Err("drift.prime_factor must be non-zero".to_string());
        }
        Ok(())
    }

    /// Device occupancy threshold derived from the negotiated buffer size.
    pub fn refill_threshold(&self, buffer_size: usize) -> usize {
        buffer_size / self.refill_divisor.max(1) as usize
    }

    /// Start threshold used whenever playback (re)starts from an empty buffer.
    pub fn priming_threshold(&self, refill_threshold: usize) -> usize {
        refill_threshold * self.prime_factor as usize
    }

    /// Classify the gap between two consecutive packet timestamps.
    pub fn classify_gap(&self, gap_ns: u64, packet_time_ms: u32) -> GapAction {
        let threshold = |permille: u32| {
            u64::from(packet_time_ms) * u64::from(permille) * NANOS_PER_MILLI_PER_PERMILLE
        };

        if gap_ns > threshold(self.resync_permille) {
            GapAction::Resync
        } else if gap_ns > threshold(self.conceal_twice_permille) {
            GapAction::Conceal(2)
        } else if gap_ns > threshold(self.conceal_once_permille) {
            GapAction::Conceal(1)
        } else {
            GapAction::InSequence
        }
    }

    /// Decide the one-sample correction from the device's free space.
    pub fn skew_adjustment(&self, free_space: usize, refill_threshold: usize) -> SkewAdjustment {
        if free_space < refill_threshold {
            SkewAdjustment::DropSample
        } else if free_space > refill_threshold * self.overfill_factor as usize {
            SkewAdjustment::DuplicateSample
        } else {
            SkewAdjustment::None
        }
    }
}
