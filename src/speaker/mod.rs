//! Speaker: a fixed pool of playback streams sharing one physical output.
//!
//! Each slot is locked independently, so different streams can be driven
//! from different threads. Calls on the same handle must be serialized by
//! the caller; the slot lock only guarantees they never corrupt the slot.

mod stream;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::audio::{DecoderFactory, DriftPolicy, GainControl, SinkOpener, SinkParams};
use crate::config::{SpeakerConfig, samples_in};
use crate::error::{Result, SpeakerError};

use stream::ActiveStream;
pub use stream::StreamStats;

/// Reference to one stream slot.
///
/// The generation changes every time the slot is released, so a handle kept
/// past `release` can never reach the slot's next owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    index: usize,
    generation: u32,
}

impl StreamHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Externally visible lifecycle state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Not allocated.
    Free,
    /// Allocated but not started (or stopped); owns no resources.
    Inactive,
    Active,
    /// Started, resources kept, incoming packets discarded.
    Suspended,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Free => "free",
            StreamState::Inactive => "inactive",
            StreamState::Active => "active",
            StreamState::Suspended => "suspended",
        };
        f.write_str(name)
    }
}

enum SlotState {
    Free,
    Inactive,
    Active(ActiveStream),
    Suspended(ActiveStream),
}

impl SlotState {
    fn state(&self) -> StreamState {
        match self {
            SlotState::Free => StreamState::Free,
            SlotState::Inactive => StreamState::Inactive,
            SlotState::Active(_) => StreamState::Active,
            SlotState::Suspended(_) => StreamState::Suspended,
        }
    }
}

struct StreamSlot {
    /// Written only while `state` is locked.
    generation: AtomicU32,
    gain: GainControl,
    state: Mutex<SlotState>,
}

/// One audio output with a fixed number of stream slots.
pub struct Speaker {
    config: SpeakerConfig,
    policy: DriftPolicy,
    sinks: Box<dyn SinkOpener>,
    decoders: Box<dyn DecoderFactory>,
    slots: Box<[StreamSlot]>,
}

impl Speaker {
    /// Create a speaker with `config.max_streams` slots, all free.
    pub fn new(
        config: SpeakerConfig,
        policy: DriftPolicy,
        sinks: Box<dyn SinkOpener>,
        decoders: Box<dyn DecoderFactory>,
    ) -> Self {
        let slots = (0..config.max_streams)
            .map(|_| StreamSlot {
                generation: AtomicU32::new(0),
                gain: GainControl::default(),
                state: Mutex::new(SlotState::Free),
            })
            .collect();
        Self {
            config,
            policy,
            sinks,
            decoders,
            slots,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots that `allocate` could still hand out.
    pub fn available_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(*lock(&slot.state), SlotState::Free))
            .count()
    }

    /// Reserve a free slot.
    pub fn allocate(&self) -> Result<StreamHandle> {
        for (index, slot) in self.slots.iter().enumerate() {
            let mut state = lock(&slot.state);
            if matches!(*state, SlotState::Free) {
                *state = SlotState::Inactive;
                return Ok(StreamHandle {
                    index,
                    generation: slot.generation.load(Ordering::Relaxed),
                });
            }
        }
        log::error!("No additional concurrent speaker streams may be started.");
        Err(SpeakerError::OutOfResources)
    }

    /// Return an inactive slot to the pool. Releasing an already released handle is a no-op.
    pub fn release(&self, handle: StreamHandle) -> Result<()> {
        let Some(slot) = self.slots.get(handle.index) else {
            return Err(SpeakerError::InvalidHandle(handle));
        };
        let mut state = lock(&slot.state);
        if slot.generation.load(Ordering::Relaxed) != handle.generation {
            return Ok(());
        }
        match state.state() {
            StreamState::Inactive => {
                *state = SlotState::Free;
                slot.generation.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            StreamState::Free => Ok(()),
            actual => Err(SpeakerError::InvalidState {
                handle,
                actual,
                expected: "inactive",
            }),
        }
    }

    /// Open the sink and decoder for an allocated slot and start playing.
    ///
    /// `sample_rate` is the raw rate decoded and played internally, not the
    /// rate negotiated for the codec. On failure the slot stays inactive and
    /// nothing stays open.
    pub fn start(&self, handle: StreamHandle, packet_time_ms: u32, sample_rate: u32) -> Result<()> {
        let max = self.config.max_packet_time_ms;
        if packet_time_ms == 0 || packet_time_ms > max {
            return Err(SpeakerError::InvalidPacketTime {
                requested: packet_time_ms,
                max,
            });
        }
        if sample_rate < 1000 {
            return Err(SpeakerError::InvalidSampleRate(sample_rate));
        }

        let (slot, mut state) = self.slot(handle)?;
        if !matches!(*state, SlotState::Inactive) {
            return Err(SpeakerError::InvalidState {
                handle,
                actual: state.state(),
                expected: "inactive",
            });
        }

        let frame_size = samples_in(sample_rate, packet_time_ms);
        let params = SinkParams {
            device: self.config.device.clone(),
            sample_rate,
            channels: 1,
            buffer_size: self.config.buffer_size(sample_rate),
            period_size: frame_size,
        };

        let sink = self.sinks.open(&params).map_err(|e| {
            log::error!("Speaker output open failed: {}", e);
            SpeakerError::SinkOpen(e)
        })?;
        // The sink is closed on drop if the decoder cannot be created.
        let decoder = self.decoders.create(sample_rate, 1).map_err(|e| {
            log::error!("Speaker decoder creation failed: {}", e);
            SpeakerError::DecoderInit(e)
        })?;

        let stream = ActiveStream::new(decoder, sink, self.policy, packet_time_ms, frame_size);
        log::info!(
            "Speaker stream {} started: packet_time={}ms, rate={}, frame_size={}, refill_threshold={}, volume={}, muted={}",
            handle.index,
            packet_time_ms,
            sample_rate,
            frame_size,
            stream.refill_threshold(),
            slot.gain.volume(),
            slot.gain.is_muted(),
        );
        *state = SlotState::Active(stream);
        Ok(())
    }

    /// Destroy the decoder, close the sink and return the slot to inactive.
    pub fn stop(&self, handle: StreamHandle) -> Result<StreamStats> {
        let (_, mut state) = self.slot(handle)?;
        match std::mem::replace(&mut *state, SlotState::Inactive) {
            SlotState::Active(stream) | SlotState::Suspended(stream) => {
                let stats = stream.stats();
                drop(stream);
                log::info!("Speaker stream {} stopped", handle.index);
                Ok(stats)
            }
            other => {
                let actual = other.state();
                *state = other;
                Err(SpeakerError::InvalidState {
                    handle,
                    actual,
                    expected: "active or suspended",
                })
            }
        }
    }

    /// Pause a stream without releasing its resources.
    pub fn suspend(&self, handle: StreamHandle) -> Result<()> {
        let (_, mut state) = self.slot(handle)?;
        match std::mem::replace(&mut *state, SlotState::Inactive) {
            SlotState::Active(stream) => {
                *state = SlotState::Suspended(stream);
                log::debug!("Speaker stream {} suspended", handle.index);
                Ok(())
            }
            other => {
                let actual = other.state();
                *state = other;
                Err(SpeakerError::InvalidState {
                    handle,
                    actual,
                    expected: "active",
                })
            }
        }
    }

    /// Resume a suspended stream from a fresh decoder state.
    ///
    /// The next packet is handled as the first packet of a new session.
    pub fn resume(&self, handle: StreamHandle) -> Result<()> {
        let (_, mut state) = self.slot(handle)?;
        match std::mem::replace(&mut *state, SlotState::Inactive) {
            SlotState::Suspended(mut stream) => {
                if let Err(e) = stream.reset() {
                    *state = SlotState::Suspended(stream);
                    return Err(SpeakerError::DecoderReset(e));
                }
                *state = SlotState::Active(stream);
                log::debug!("Speaker stream {} resumed", handle.index);
                Ok(())
            }
            other => {
                let actual = other.state();
                *state = other;
                Err(SpeakerError::InvalidState {
                    handle,
                    actual,
                    expected: "suspended",
                })
            }
        }
    }

    /// Feed one packet captured at `sample_time` (ns) to the stream.
    ///
    /// An empty `packet` means the data was lost and is concealed. Packets
    /// sent to a suspended or not started stream are ignored.
    pub fn push(&self, handle: StreamHandle, packet: &[u8], sample_time: u64) -> Result<()> {
        let (slot, mut state) = self.slot(handle)?;
        if let SlotState::Active(stream) = &mut *state {
            stream.push(packet, sample_time, slot.gain.gain());
        }
        Ok(())
    }

    /// Set the volume (0-100) used from the next packet on.
    pub fn set_volume(&self, handle: StreamHandle, volume: u8) -> Result<()> {
        if volume > crate::audio::gain::MAX_VOLUME {
            return Err(SpeakerError::InvalidVolume(volume));
        }
        self.gain_control(handle)?.set_volume(volume);
        Ok(())
    }

    pub fn set_mute(&self, handle: StreamHandle, muted: bool) -> Result<()> {
        self.gain_control(handle)?.set_mute(muted);
        Ok(())
    }

    /// Lock-free volume/mute control of the stream, usable from any thread.
    ///
    /// The control belongs to the slot: it outlives the handle and also governs
    /// later streams started on the same slot.
    pub fn gain_control(&self, handle: StreamHandle) -> Result<GainControl> {
        match self.slots.get(handle.index) {
            Some(slot) if slot.generation.load(Ordering::Relaxed) == handle.generation => {
                Ok(slot.gain.clone())
            }
            _ => Err(SpeakerError::InvalidHandle(handle)),
        }
    }

    pub fn state(&self, handle: StreamHandle) -> Result<StreamState> {
        let (_, state) = self.slot(handle)?;
        Ok(state.state())
    }

    /// Counters of a started stream.
    pub fn stats(&self, handle: StreamHandle) -> Result<StreamStats> {
        let (_, state) = self.slot(handle)?;
        match &*state {
            SlotState::Active(stream) | SlotState::Suspended(stream) => Ok(stream.stats()),
            other => Err(SpeakerError::InvalidState {
                handle,
                actual: other.state(),
                expected: "active or suspended",
            }),
        }
    }

    /// Allocate a slot and start it; the slot is released again if starting fails.
    pub fn start_stream(&self, packet_time_ms: u32, sample_rate: u32) -> Result<StreamHandle> {
        let handle = self.allocate()?;
        if let Err(e) = self.start(handle, packet_time_ms, sample_rate) {
            self.release(handle)?;
            return Err(e);
        }
        Ok(handle)
    }

    /// Stop a stream and release its slot.
    pub fn stop_stream(&self, handle: StreamHandle) -> Result<StreamStats> {
        let stats = self.stop(handle)?;
        self.release(handle)?;
        Ok(stats)
    }

    fn slot(&self, handle: StreamHandle) -> Result<(&StreamSlot, MutexGuard<'_, SlotState>)> {
        let slot = self
            .slots
            .get(handle.index)
            .ok_or(SpeakerError::InvalidHandle(handle))?;
        let state = lock(&slot.state);
        if slot.generation.load(Ordering::Relaxed) != handle.generation {
            return Err(SpeakerError::InvalidHandle(handle));
        }
        Ok((slot, state))
    }
}

impl Drop for Speaker {
    fn drop(&mut self) {
        for (index, slot) in self.slots.iter().enumerate() {
            let state = lock(&slot.state);
            if matches!(*state, SlotState::Active(_) | SlotState::Suspended(_)) {
                log::error!("Speaker stream {} not stopped before releasing speaker.", index);
            }
        }
    }
}

/// Slot state is replaced wholesale under the lock, so a poisoned lock still holds a valid state.
fn lock(state: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
