//! Result classification.
//!
//! Inspects the value a program left on top of the stack and infers its
//! audio shape: scalar, single stream, multi-channel stream sequence, or
//! not audio at all. The guiding policy is graceful degradation: an
//! ambiguous shape becomes single-channel playback, never a hard
//! failure, so an interactively driven program produces *something*
//! audible whenever possible.

use crate::defaults::MAX_CHANNELS;
use crate::engine::{SequenceLen, StackValue};
use crate::error::{BridgeError, Result};

/// Audio shape of one execution result.
///
/// Produced once per successful apply and consumed immediately by the
/// publisher; never retained.
pub enum ExecutionOutcome<V: StackValue> {
    /// A plain number. Published as silence; kept distinct from
    /// `NonAudio` for diagnostics.
    Scalar(f64),
    /// One extractable stream.
    SingleStream(V),
    /// A finite sequence of 2..=8 stream elements. `whole` is retained
    /// for the single-channel fallback if installation fails later.
    MultiStream { channels: Vec<V>, whole: V },
    /// Not audio-compatible.
    NonAudio,
    /// A probe failed while inspecting the value.
    Error(BridgeError),
}

impl<V: StackValue> ExecutionOutcome<V> {
    /// Channel count this outcome would publish.
    pub fn channel_count(&self) -> usize {
        match self {
            ExecutionOutcome::SingleStream(_) => 1,
            ExecutionOutcome::MultiStream { channels, .. } => channels.len(),
            _ => 0,
        }
    }
}

/// Infers audio shape from a runtime value.
pub struct ResultClassifier {
    stream_type_names: Vec<String>,
}

impl ResultClassifier {
    pub fn new(stream_type_names: Vec<String>) -> Self {
        Self { stream_type_names }
    }

    /// Classify a value. Reads but never pops it; probe failures are
    /// contained here and reported as a non-audio error outcome.
    pub fn classify<V: StackValue>(&self, value: V) -> ExecutionOutcome<V> {
        match self.classify_inner(value) {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::Error(BridgeError::Classification {
                message: e.message(),
            }),
        }
    }

    fn classify_inner<V: StackValue>(&self, value: V) -> Result<ExecutionOutcome<V>> {
        // 1. Directly a stream handle.
        if value.is_stream()? {
            return Ok(ExecutionOutcome::SingleStream(value));
        }

        // 2. A known single-channel stream-producing type: a stream
        //    wrapped in a sequence container that is still one channel.
        let name = value.type_name()?;
        if self.stream_type_names.iter().any(|known| known == &name) {
            return Ok(ExecutionOutcome::SingleStream(value));
        }

        match value.sequence_len()? {
            // 3. Finite sequence: degenerate sizes play as one channel,
            //    larger ones are inspected element by element.
            SequenceLen::Finite(len) if len <= 1 => Ok(ExecutionOutcome::SingleStream(value)),
            SequenceLen::Finite(len) => {
                let count = len.min(MAX_CHANNELS);
                let mut channels = Vec::with_capacity(count);
                for index in 0..count {
                    // Any element that is missing, fails the stream
                    // check, or errors while being probed sends the
                    // whole sequence down the single-channel path. The
                    // interpreter's own iteration semantics then decide
                    // what one-channel playback of it means.
                    match value.element(index) {
                        Ok(Some(element)) if element.is_stream().unwrap_or(false) => {
                            channels.push(element);
                        }
                        _ => return Ok(ExecutionOutcome::SingleStream(value)),
                    }
                }
                Ok(ExecutionOutcome::MultiStream {
                    channels,
                    whole: value,
                })
            }
            // 4. Unbounded sequence: multi-channel detection needs a
            //    bounded inspection, so play it as one channel.
            SequenceLen::Infinite => Ok(ExecutionOutcome::SingleStream(value)),
            // 5. Scalar or unrecognized object.
            SequenceLen::NotSequence => match value.as_scalar() {
                Some(n) => Ok(ExecutionOutcome::Scalar(n)),
                None => Ok(ExecutionOutcome::NonAudio),
            },
        }
    }
}
