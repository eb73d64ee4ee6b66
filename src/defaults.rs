//! Default configuration constants for sonobridge.
//!
//! Shared constants used across configuration types to ensure consistency
//! and eliminate duplication.

/// Hard cap on published audio channels.
///
/// The channel snapshot uses a fixed-capacity array so the publish path
/// never allocates. Sequences with more elements are truncated, not
/// rejected.
pub const MAX_CHANNELS: usize = 8;

/// Default scratch capacity in frames for the real-time drain.
///
/// Must be at least as large as the biggest block the host will ever
/// request. 4096 covers every common host vector size; the drain refuses
/// larger blocks rather than allocating on the hot path.
pub const MAX_BLOCK_FRAMES: usize = 4096;

/// Default capacity of the drain-to-control event queue.
///
/// Exhaustion and failure notices are sent with `try_send`; when the
/// queue is full the notice is dropped, which is acceptable because the
/// channel-count invalidation itself travels through the snapshot state,
/// not the queue.
pub const EVENT_QUEUE_LEN: usize = 16;

/// Runtime type names the interpreter uses for single-channel
/// stream-producing values.
///
/// Covers streams wrapped in finite/infinite sequence containers that
/// are still semantically one channel.
pub const STREAM_TYPE_NAMES: &[&str] = &["ZList", "VList"];

/// Cap on accumulated program text built from host token messages.
pub const MAX_PROGRAM_LEN: usize = 4096;
