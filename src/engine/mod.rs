//! Interpreter collaborator contract.
//!
//! The bridge does not implement a language. It drives an external
//! stack-based, lazily-evaluated interpreter through the traits here and
//! consumes what comes back: a compiled program, a value stack, and
//! pull-based audio streams. Implementations live outside this crate;
//! tests swap in miniature fixtures the same way.

pub mod init;

use crate::error::Result;
use std::sync::Arc;

/// What a value claims about its sequence shape when probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceLen {
    /// A finite sequence with a known element count.
    Finite(usize),
    /// A lazy sequence with no known end.
    Infinite,
    /// Not a sequence at all.
    NotSequence,
}

/// Result of one pull from an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    /// Frames actually written to the front of the output slice.
    pub frames: usize,
    /// True once the stream has no more samples to give.
    pub exhausted: bool,
}

/// A pull-based audio sample producer bound to one stream value.
///
/// Extractors are independently owned: once handed to the real-time
/// side they never touch the control-side stack again.
pub trait Extractor: Send {
    /// Pull up to `out.len()` samples into `out`.
    ///
    /// Frames beyond the returned count are left untouched; the caller
    /// zero-fills them. Errors are contained at the drain boundary.
    fn fill(&mut self, out: &mut [f32]) -> Result<FillOutcome>;
}

/// Probing surface over one interpreter stack value.
///
/// Every probe is fallible because the interpreter reports problems only
/// through errors; classification catches them and degrades instead of
/// propagating.
pub trait StackValue: Send + Sized {
    /// True if the value is directly an audio-stream handle.
    fn is_stream(&self) -> Result<bool>;

    /// The value's declared runtime type name.
    fn type_name(&self) -> Result<String>;

    /// Sequence shape of the value, if it is one.
    fn sequence_len(&self) -> Result<SequenceLen>;

    /// Element at `index` of a finite sequence, if present.
    fn element(&self, index: usize) -> Result<Option<Self>>;

    /// The value as a plain scalar, if it is one. Infallible: a scalar
    /// check never needs to touch interpreter state.
    fn as_scalar(&self) -> Option<f64>;

    /// Bind an extractor to this value.
    ///
    /// `Ok(None)` means the value cannot produce samples. For sequence
    /// values the interpreter's own iteration semantics decide what
    /// single-channel playback means.
    fn bind_stream(&self) -> Result<Option<Box<dyn Extractor>>>;
}

/// The interpreter's value stack, accessed only from the control context.
pub trait StackThread: Send {
    type Value: StackValue;

    fn depth(&self) -> usize;

    /// Read the top value without popping it. The stack is intentionally
    /// left intact after execution for later inspection.
    fn top(&self) -> Option<Self::Value>;

    fn pop(&mut self) -> Option<Self::Value>;

    fn clear(&mut self);
}

/// A compiled program. Created on successful compile, retained until
/// superseded, never mutated.
pub trait CompiledProgram: Send + Sync {
    type Thread: StackThread;

    /// Run the program on the control thread, leaving results on the
    /// thread's stack.
    fn apply(&self, thread: &mut Self::Thread) -> Result<()>;
}

/// The interpreter itself.
pub trait ScriptEngine: Send {
    type Thread: StackThread;
    type Program: CompiledProgram<Thread = Self::Thread>;

    /// Compile source text into a callable program.
    ///
    /// `Ok(None)` models a compile that reports success without
    /// producing a function; the cache treats it as a failure, the same
    /// as a produced-but-failed one.
    fn compile(&mut self, source: &str) -> Result<Option<Arc<Self::Program>>>;

    /// Synchronize the interpreter's notion of the sample rate with the
    /// host's. Called from the control path when the host configures or
    /// changes its rate; engines whose oscillators are rate-independent
    /// keep the no-op default.
    fn set_sample_rate(&mut self, _sample_rate: u32) -> Result<()> {
        Ok(())
    }

    /// Hand the engine a publisher handle for primitives that publish
    /// audio directly (play/stop overrides). The handle replaces any
    /// process-wide "current instance" lookup; engines that define no
    /// such primitives ignore it.
    fn bind_output(&mut self, _sink: crate::bridge::publish::PublisherHandle) {}
}
