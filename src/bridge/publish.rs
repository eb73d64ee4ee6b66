//! Stream publication.
//!
//! Owns per-channel extractor state on the control side and makes it
//! visible to the real-time side as an atomic, versioned snapshot. The
//! central correctness property of the bridge lives here: the reader
//! must never observe a channel count inconsistent with the extractors
//! behind it. That is guaranteed structurally, not by convention: a
//! `ChannelSnapshot` is built completely before it enters the pending
//! slot, and the slot is held only for the hand-over itself, never for
//! stream pulling or interpreter work.

use crate::bridge::classify::ExecutionOutcome;
use crate::defaults::MAX_CHANNELS;
use crate::engine::{Extractor, StackValue};
use crate::error::{BridgeError, Result};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// A fully-constructed set of channel extractors, stamped with the
/// publish version that created it. Ownership transfers wholesale to
/// the real-time side; the control side never touches it again.
pub struct ChannelSnapshot {
    version: u64,
    channel_count: usize,
    channels: [Option<Box<dyn Extractor>>; MAX_CHANNELS],
}

impl ChannelSnapshot {
    fn new(version: u64, channel_count: usize, channels: ChannelArray) -> Self {
        debug_assert!(channel_count <= MAX_CHANNELS);
        Self {
            version,
            channel_count,
            channels,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub(crate) fn channel_mut(&mut self, index: usize) -> Option<&mut (dyn Extractor + 'static)> {
        self.channels
            .get_mut(index)
            .and_then(|slot| slot.as_deref_mut())
    }
}

type ChannelArray = [Option<Box<dyn Extractor>>; MAX_CHANNELS];

fn empty_channels() -> ChannelArray {
    std::array::from_fn(|_| None)
}

/// State shared between the control and real-time contexts. The only
/// data crossing that boundary.
pub(crate) struct SharedState {
    /// Hand-over slot: publish fills it, the drain takes it.
    pending: Mutex<Option<ChannelSnapshot>>,
    /// Monotonic publish counter; lets the drain detect a new snapshot
    /// without touching the mutex.
    version: AtomicU64,
    /// Channel count of the latest publish, for control-side status.
    /// Forced to 0 when the drain invalidates playback.
    active_channels: AtomicUsize,
    /// Legacy passthrough offset (f32 bits), set by the host's float
    /// message.
    offset_bits: AtomicU32,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            version: AtomicU64::new(0),
            active_channels: AtomicUsize::new(0),
            offset_bits: AtomicU32::new(0f32.to_bits()),
        }
    }

    /// Stamp, install, and expose a new snapshot. Returns its version.
    ///
    /// The channel count is stored while the slot is held so that
    /// `invalidate`, which also takes the slot, serializes against it.
    fn install(&self, channel_count: usize, channels: ChannelArray) -> u64 {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = ChannelSnapshot::new(version, channel_count, channels);
        if let Ok(mut slot) = self.pending.lock() {
            *slot = Some(snapshot);
            self.active_channels.store(channel_count, Ordering::Release);
        }
        debug!(version, channel_count, "published channel state");
        version
    }

    /// Take the pending snapshot without blocking. Used only by the
    /// real-time side; a contended tick simply keeps its current state.
    pub(crate) fn try_take_pending(&self) -> Option<ChannelSnapshot> {
        self.pending.try_lock().ok().and_then(|mut slot| slot.take())
    }

    /// Mark playback dead, but only if no newer publish has landed in
    /// the meantime.
    ///
    /// The version check and the store happen under the slot lock, so a
    /// publish racing in between cannot have its channel count
    /// overwritten by a stale invalidation. A contended `try_lock` means
    /// a publish is mid-install, which supersedes this invalidation
    /// anyway.
    pub(crate) fn invalidate(&self, version: u64) {
        if let Ok(_slot) = self.pending.try_lock()
            && self.version.load(Ordering::Acquire) == version
        {
            self.active_channels.store(0, Ordering::Release);
        }
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn active_channels(&self) -> usize {
        self.active_channels.load(Ordering::Acquire)
    }

    pub(crate) fn offset(&self) -> f32 {
        f32::from_bits(self.offset_bits.load(Ordering::Relaxed))
    }

    pub(crate) fn set_offset(&self, offset: f32) {
        self.offset_bits.store(offset.to_bits(), Ordering::Relaxed);
    }
}

fn publish_outcome<V: StackValue>(
    shared: &SharedState,
    outcome: ExecutionOutcome<V>,
) -> Result<usize> {
    match outcome {
        ExecutionOutcome::Scalar(_)
        | ExecutionOutcome::NonAudio
        | ExecutionOutcome::Error(_) => {
            shared.install(0, empty_channels());
            Ok(0)
        }
        ExecutionOutcome::SingleStream(value) => match value.bind_stream() {
            Ok(Some(extractor)) => {
                let mut channels = empty_channels();
                channels[0] = Some(extractor);
                shared.install(1, channels);
                Ok(1)
            }
            Ok(None) => {
                shared.install(0, empty_channels());
                Err(BridgeError::Stream {
                    message: "value cannot produce samples".to_string(),
                })
            }
            Err(e) => {
                shared.install(0, empty_channels());
                Err(BridgeError::Stream {
                    message: e.message(),
                })
            }
        },
        ExecutionOutcome::MultiStream {
            channels: values,
            whole,
        } => {
            let count = values.len().min(MAX_CHANNELS);
            let mut channels = empty_channels();
            let mut bound = 0;
            for (index, value) in values.iter().take(count).enumerate() {
                match value.bind_stream() {
                    Ok(Some(extractor)) => {
                        channels[index] = Some(extractor);
                        bound += 1;
                    }
                    _ => break,
                }
            }
            if bound == count && count > 0 {
                shared.install(count, channels);
                return Ok(count);
            }

            // A bind failed mid-installation: abort rather than leave a
            // partially populated channel array, and fall back to the
            // whole value as one channel.
            warn!(
                bound,
                requested = count,
                "channel bind failed mid-install, falling back to single channel"
            );
            match whole.bind_stream() {
                Ok(Some(extractor)) => {
                    let mut channels = empty_channels();
                    channels[0] = Some(extractor);
                    shared.install(1, channels);
                    Ok(1)
                }
                _ => {
                    shared.install(0, empty_channels());
                    Err(BridgeError::Stream {
                        message: format!("bound {} of {} channels, fallback failed", bound, count),
                    })
                }
            }
        }
    }
}

/// Control-side publisher. `publish` installs a new snapshot; the
/// real-time drain observes it on its next tick.
pub struct StreamPublisher {
    shared: Arc<SharedState>,
}

impl StreamPublisher {
    pub fn new() -> Self {
        Self::with_shared(Arc::new(SharedState::new()))
    }

    pub(crate) fn with_shared(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }

    /// Install the channel state for one execution outcome. Returns the
    /// published channel count; bind failures publish silence and
    /// surface as stream errors.
    pub fn publish<V: StackValue>(&self, outcome: ExecutionOutcome<V>) -> Result<usize> {
        publish_outcome(&self.shared, outcome)
    }

    /// Force the channel state to silence. Infallible: installs an
    /// empty snapshot without binding anything.
    pub fn publish_silence(&self) {
        self.shared.install(0, empty_channels());
    }

    /// Channel count of the latest publish (0 after invalidation).
    pub fn channel_count(&self) -> usize {
        self.shared.active_channels()
    }

    /// Monotonic publish version, for diagnostics.
    pub fn version(&self) -> u64 {
        self.shared.version()
    }

    /// Set the legacy passthrough offset applied by the drain when no
    /// audio is active.
    pub fn set_offset(&self, offset: f32) {
        self.shared.set_offset(offset);
    }

    /// A cheap cloneable handle for engine primitives that publish
    /// directly (play/stop overrides).
    pub fn handle(&self) -> PublisherHandle {
        PublisherHandle {
            shared: self.shared.clone(),
        }
    }

    pub(crate) fn shared(&self) -> Arc<SharedState> {
        self.shared.clone()
    }
}

impl Default for StreamPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable publishing handle, injected into the engine instead of a
/// process-wide "current instance" pointer.
#[derive(Clone)]
pub struct PublisherHandle {
    shared: Arc<SharedState>,
}

impl PublisherHandle {
    pub fn publish<V: StackValue>(&self, outcome: ExecutionOutcome<V>) -> Result<usize> {
        publish_outcome(&self.shared, outcome)
    }

    /// Stop playback: publishes silence.
    pub fn stop(&self) {
        self.shared.install(0, empty_channels());
    }

    pub fn channel_count(&self) -> usize {
        self.shared.active_channels()
    }
}
