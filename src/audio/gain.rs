//! Volume and mute handling.
//!
//! Gain is a Q16 fixed-point factor: 100 % volume maps to `1 << 16`.
//! [`GainControl`] holds the user-facing state in atomics so it can be
//! changed from any thread while a playback thread is pushing packets.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Unity gain in Q16.
pub const UNITY_GAIN: i32 = 1 << 16;

/// Maximum volume value.
pub const MAX_VOLUME: u8 = 100;

/// Fixed-point gain applied to one block of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gain(i32);

impl Gain {
    pub const SILENT: Gain = Gain(0);
    pub const UNITY: Gain = Gain(UNITY_GAIN);

    /// Compute the gain for `volume` (clamped to 0..=100), or silence when muted.
    pub fn from_volume(volume: u8, muted: bool) -> Self {
        if muted {
            return Gain::SILENT;
        }
        // volume * 2^16 / 100
        let volume = i32::from(volume.min(MAX_VOLUME));
        Gain(volume * 167_773 >> 8)
    }

    pub fn is_silent(self) -> bool {
        self.0 == 0
    }

    /// Scale every sample in place, saturating at the i16 range.
    pub fn apply(self, samples: &mut [i16]) {
        if self == Gain::UNITY {
            return;
        }
        for sample in samples.iter_mut() {
            let scaled = (i32::from(*sample) * self.0) >> 16;
            *sample = scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        }
    }
}

struct GainState {
    volume: AtomicU8,
    muted: AtomicBool,
}

/// Shared volume/mute control for one stream slot.
///
/// Cloning is cheap and all methods are lock-free. A change takes effect on
/// the next packet; a packet already being processed keeps the gain it started with.
#[derive(Clone)]
pub struct GainControl {
    state: Arc<GainState>,
}

impl GainControl {
    pub fn new(volume: u8, muted: bool) -> Self {
        Self {
            state: Arc::new(GainState {
                volume: AtomicU8::new(volume.min(MAX_VOLUME)),
                muted: AtomicBool::new(muted),
            }),
        }
    }

    /// Set playback volume (0-100). Values above 100 are clamped.
    pub fn set_volume(&self, volume: u8) {
        self.state
            .volume
            .store(volume.min(MAX_VOLUME), Ordering::Relaxed);
    }

    pub fn set_mute(&self, muted: bool) {
        self.state.muted.store(muted, Ordering::Relaxed);
    }

    pub fn volume(&self) -> u8 {
        self.state.volume.load(Ordering::Relaxed)
    }

    pub fn is_muted(&self) -> bool {
        self.state.muted.load(Ordering::Relaxed)
    }

    /// Snapshot of the effective gain.
    pub fn gain(&self) -> Gain {
        Gain::from_volume(self.volume(), self.is_muted())
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new(MAX_VOLUME, false)
    }
}

impl fmt::Debug for GainControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GainControl")
            .field("volume", &self.volume())
            .field("muted", &self.is_muted())
            .finish()
    }
}
