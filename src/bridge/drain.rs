//! Real-time drain.
//!
//! Runs inside the host's audio callback, once per fixed-size block. It
//! observes the latest published snapshot, pulls each channel's
//! extractor into the host output, and degrades to silence on
//! exhaustion, errors, or panics. Nothing here blocks, allocates, or
//! lets a failure cross into the host's call stack; the only permitted
//! wait is a `try_lock` on the snapshot hand-over slot, and a contended
//! tick simply keeps the previous state.

use crate::bridge::contain::panic_message;
use crate::bridge::publish::{ChannelSnapshot, SharedState, StreamPublisher};
use crate::config::BridgeConfig;
use crate::engine::Extractor;
use crossbeam_channel::{Receiver, Sender};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Notices sent from the audio thread to the control thread. Delivered
/// best-effort with `try_send`; the authoritative invalidation travels
/// through the shared channel state, not this queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainEvent {
    /// The first channel's stream ran out; playback ended.
    Exhausted { version: u64 },
    /// An extractor errored or panicked while being pulled.
    Failed { version: u64, message: String },
}

/// Result of pulling one channel for one block.
enum Pull {
    Produced { exhausted: bool },
    Failed(String),
}

/// Pull up to `buf.len()` samples from one channel, fully contained:
/// errors and panics never propagate past this call. The tail of `buf`
/// beyond what the extractor produced is zero-filled.
fn pull_channel(extractor: &mut (dyn Extractor + 'static), buf: &mut [f32]) -> Pull {
    match catch_unwind(AssertUnwindSafe(|| extractor.fill(buf))) {
        Ok(Ok(outcome)) => {
            let produced = outcome.frames.min(buf.len());
            for sample in &mut buf[produced..] {
                *sample = 0.0;
            }
            Pull::Produced {
                exhausted: outcome.exhausted || produced < buf.len(),
            }
        }
        Ok(Err(e)) => Pull::Failed(e.message()),
        Err(payload) => Pull::Failed(panic_message(&payload)),
    }
}

/// Drains published streams into host-provided blocks.
pub struct RealtimeDrain {
    shared: Arc<SharedState>,
    active: Option<ChannelSnapshot>,
    seen_version: u64,
    events: Sender<DrainEvent>,
    retired: Sender<ChannelSnapshot>,
    scratch: Vec<f32>,
    passthrough: bool,
}

impl RealtimeDrain {
    pub(crate) fn with_shared(
        shared: Arc<SharedState>,
        config: &BridgeConfig,
        events: Sender<DrainEvent>,
        retired: Sender<ChannelSnapshot>,
    ) -> Self {
        Self {
            shared,
            active: None,
            seen_version: 0,
            events,
            retired,
            scratch: vec![0.0; config.max_block_frames],
            passthrough: config.passthrough,
        }
    }

    /// Build a drain observing `publisher`, returning the receivers for
    /// drain events and for retired snapshots. The bridge wires this up
    /// itself; standalone hosts and benchmarks use it directly.
    pub fn for_publisher(
        publisher: &StreamPublisher,
        config: &BridgeConfig,
    ) -> (Self, Receiver<DrainEvent>, Receiver<ChannelSnapshot>) {
        let (event_tx, event_rx) = crossbeam_channel::bounded(config.event_queue_len);
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(config.event_queue_len);
        (
            Self::with_shared(publisher.shared(), config, event_tx, retired_tx),
            event_rx,
            retired_rx,
        )
    }

    /// Channel count of the snapshot currently being drained.
    pub fn channel_count(&self) -> usize {
        self.active
            .as_ref()
            .map(|snapshot| snapshot.channel_count())
            .unwrap_or(0)
    }

    /// Fill one block of `frames` samples per output channel.
    ///
    /// Channels beyond the published count are silenced; published
    /// channels beyond the host's output count are dropped. When no
    /// audio is active, channel 0 optionally passes `input` through
    /// with the scalar offset applied.
    pub fn fill_block(&mut self, frames: usize, outputs: &mut [&mut [f32]], input: Option<&[f32]>) {
        self.refresh();

        for out in outputs.iter_mut() {
            let len = frames.min(out.len());
            for sample in &mut out[..len] {
                *sample = 0.0;
            }
        }

        let count = self.channel_count();
        if count == 0 {
            self.fill_idle(frames, outputs, input);
            return;
        }

        let mut ended = false;
        let mut failure: Option<String> = None;
        let version = self.seen_version;

        if let Some(snapshot) = self.active.as_mut() {
            for index in 0..count.min(outputs.len()) {
                let Some(extractor) = snapshot.channel_mut(index) else {
                    continue;
                };
                let out = &mut outputs[index];
                let len = frames.min(out.len());
                match pull_channel(extractor, &mut out[..len]) {
                    Pull::Produced { exhausted } => {
                        // Only the first channel's exhaustion ends
                        // playback; later channels already zero-filled
                        // their own remainder.
                        if index == 0 && exhausted {
                            ended = true;
                        }
                    }
                    Pull::Failed(message) => {
                        failure = Some(message);
                        break;
                    }
                }
            }
        }

        if let Some(message) = failure {
            for out in outputs.iter_mut() {
                let len = frames.min(out.len());
                for sample in &mut out[..len] {
                    *sample = 0.0;
                }
            }
            self.invalidate(DrainEvent::Failed { version, message });
        } else if ended {
            self.invalidate(DrainEvent::Exhausted { version });
        }
    }

    /// Fill an interleaved block of `frames * channels` samples, for
    /// hosts that hand over a single interleaved buffer. Uses the
    /// pre-sized scratch buffer; `frames` beyond its capacity stay
    /// silent rather than allocating on the hot path.
    pub fn fill_interleaved(
        &mut self,
        frames: usize,
        channels: usize,
        out: &mut [f32],
        input: Option<&[f32]>,
    ) {
        for sample in out.iter_mut() {
            *sample = 0.0;
        }
        if channels == 0 {
            return;
        }
        let frames = frames
            .min(self.scratch.len())
            .min(out.len() / channels);

        self.refresh();
        let count = self.channel_count();
        if count == 0 {
            if self.passthrough
                && let Some(input) = input
            {
                let offset = self.shared.offset();
                for (frame, sample) in input.iter().take(frames).enumerate() {
                    out[frame * channels] = sample + offset;
                }
            }
            return;
        }

        let mut ended = false;
        let mut failure: Option<String> = None;
        let version = self.seen_version;

        if let Some(snapshot) = self.active.as_mut() {
            for index in 0..count.min(channels) {
                let Some(extractor) = snapshot.channel_mut(index) else {
                    continue;
                };
                match pull_channel(extractor, &mut self.scratch[..frames]) {
                    Pull::Produced { exhausted } => {
                        for frame in 0..frames {
                            out[frame * channels + index] = self.scratch[frame];
                        }
                        if index == 0 && exhausted {
                            ended = true;
                        }
                    }
                    Pull::Failed(message) => {
                        failure = Some(message);
                        break;
                    }
                }
            }
        }

        if let Some(message) = failure {
            for sample in out.iter_mut() {
                *sample = 0.0;
            }
            self.invalidate(DrainEvent::Failed { version, message });
        } else if ended {
            self.invalidate(DrainEvent::Exhausted { version });
        }
    }

    /// Pick up a newly published snapshot if one is waiting.
    fn refresh(&mut self) {
        if self.shared.version() != self.seen_version
            && let Some(snapshot) = self.shared.try_take_pending()
        {
            self.seen_version = snapshot.version();
            if let Some(old) = self.active.replace(snapshot) {
                self.retire(old);
            }
        }
    }

    /// Ship a dead snapshot to the control side for deallocation.
    /// Freeing up to eight boxed extractors is not audio-tick work; a
    /// full queue falls back to dropping in place.
    fn retire(&mut self, snapshot: ChannelSnapshot) {
        self.retired.try_send(snapshot).ok();
    }

    /// No active audio: silence, or the legacy input passthrough with
    /// the scalar offset applied on channel 0.
    fn fill_idle(&mut self, frames: usize, outputs: &mut [&mut [f32]], input: Option<&[f32]>) {
        if !self.passthrough {
            return;
        }
        let (Some(out), Some(input)) = (outputs.first_mut(), input) else {
            return;
        };
        let offset = self.shared.offset();
        let len = frames.min(out.len()).min(input.len());
        for (sample, value) in out[..len].iter_mut().zip(input) {
            *sample = value + offset;
        }
    }

    /// Stop playback on this and every subsequent tick until a new
    /// publish arrives.
    fn invalidate(&mut self, event: DrainEvent) {
        if let Some(old) = self.active.take() {
            self.retire(old);
        }
        self.shared.invalidate(self.seen_version);
        // Best effort; a full queue drops the notice.
        self.events.try_send(event).ok();
    }
}
