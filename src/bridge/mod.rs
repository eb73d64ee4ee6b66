//! The streaming bridge: control-side façade and its components.
//!
//! Wires the pipeline together: incoming text → compilation cache →
//! execution on the control thread → shape classification → snapshot
//! publication. The real-time half lives in [`drain`] and observes the
//! published state independently.

pub mod cache;
pub mod classify;
pub mod contain;
pub mod drain;
pub mod publish;

#[cfg(test)]
pub(crate) mod testutil;

use crate::bridge::cache::CompilationCache;
use crate::bridge::classify::{ExecutionOutcome, ResultClassifier};
use crate::bridge::contain::{ErrorKind, run_contained};
use crate::bridge::drain::{DrainEvent, RealtimeDrain};
use crate::bridge::publish::{ChannelSnapshot, PublisherHandle, SharedState, StreamPublisher};
use crate::config::BridgeConfig;
use crate::engine::{CompiledProgram, ScriptEngine, StackThread};
use crate::error::{BridgeError, Result};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One token of a host program message.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Symbol(String),
}

/// Join host tokens into program text, space-separated. Integral
/// numbers print without a decimal point so `440` stays `440`.
pub fn program_from_tokens(tokens: &[Token]) -> String {
    let mut text = String::new();
    for token in tokens {
        if !text.is_empty() {
            text.push(' ');
        }
        match token {
            Token::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                text.push_str(&format!("{}", *n as i64));
            }
            Token::Number(n) => text.push_str(&format!("{}", n)),
            Token::Symbol(s) => text.push_str(s),
        }
    }
    text
}

/// Last error seen on the control path. Cleared at the start of every
/// compile attempt, set on the first failure along the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ErrorState {
    pub in_error: bool,
    pub kind: Option<ErrorKind>,
    pub message: Option<String>,
}

impl ErrorState {
    fn clear(&mut self) {
        *self = ErrorState::default();
    }

    fn record(&mut self, error: &BridgeError) {
        let message = error.message();
        self.kind = Some(ErrorKind::detect(&message));
        self.message = Some(message);
        self.in_error = true;
    }
}

/// Structured bridge state for the host's status queries.
#[derive(Debug, Clone)]
pub struct BridgeStatus {
    pub in_error: bool,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub has_function: bool,
    pub cached_source: Option<String>,
    pub channel_count: usize,
    pub version: u64,
    pub stack_depth: usize,
}

/// Result of one program submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReport {
    pub used_cache: bool,
    pub channel_count: usize,
}

/// Control-side façade over the whole bridge.
///
/// All methods run on the control context; the paired [`RealtimeDrain`]
/// returned by [`Bridge::new`] is handed to the audio callback.
pub struct Bridge<E: ScriptEngine> {
    engine: E,
    thread: E::Thread,
    cache: CompilationCache<E>,
    classifier: ResultClassifier,
    publisher: StreamPublisher,
    error: ErrorState,
    events: Receiver<DrainEvent>,
    retired: Receiver<ChannelSnapshot>,
    pending_sample_rate: Option<u32>,
}

impl<E: ScriptEngine> Bridge<E> {
    /// Build a bridge around an engine and its value stack. Returns the
    /// drain for the host's audio callback.
    pub fn new(mut engine: E, thread: E::Thread, config: BridgeConfig) -> (Self, RealtimeDrain) {
        let publisher = StreamPublisher::with_shared(Arc::new(SharedState::new()));
        let (drain, events, retired) = RealtimeDrain::for_publisher(&publisher, &config);
        engine.bind_output(publisher.handle());
        let bridge = Self {
            engine,
            thread,
            cache: CompilationCache::new(),
            classifier: ResultClassifier::new(config.stream_type_names),
            publisher,
            error: ErrorState::default(),
            events,
            retired,
            pending_sample_rate: None,
        };
        (bridge, drain)
    }

    /// Synchronize the engine to the host sample rate.
    ///
    /// Hosts call this when the output rate is configured or changes. A
    /// failed attempt is recorded and retried at the start of the next
    /// submit, so a transient engine refusal does not leave the rates
    /// permanently diverged.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        match run_contained("set_sample_rate", || {
            self.engine.set_sample_rate(sample_rate)
        }) {
            Ok(()) => {
                self.pending_sample_rate = None;
                debug!(sample_rate, "engine sample rate set");
                Ok(())
            }
            Err(contained) => {
                self.pending_sample_rate = Some(sample_rate);
                let error = BridgeError::Engine {
                    message: contained.message,
                };
                self.error.record(&error);
                warn!(error = %error, sample_rate, "sample rate change failed, will retry");
                Err(error)
            }
        }
    }

    /// Submit program text: compile (or reuse the cache), execute,
    /// classify the result, and publish the channel state.
    pub fn submit(&mut self, source: &str) -> Result<SubmitReport> {
        self.error.clear();

        if let Some(rate) = self.pending_sample_rate
            && run_contained("set_sample_rate", || self.engine.set_sample_rate(rate)).is_ok()
        {
            debug!(sample_rate = rate, "engine sample rate set on retry");
            self.pending_sample_rate = None;
        }

        let outcome = self.cache.submit(&mut self.engine, source);
        if let Some(error) = outcome.error {
            self.error.record(&error);
            let rejected_early = matches!(
                error,
                BridgeError::NoCode | BridgeError::ProgramTooLong { .. }
            );
            if !outcome.used_cache && !rejected_early {
                // A fresh failed compile forces no-audio; a cached error
                // or a pre-compile rejection leaves the previous channel
                // state untouched.
                self.publisher.publish_silence();
            }
            warn!(error = %error, hint = self.error.kind.map(|k| k.hint()).unwrap_or(""), "submit failed");
            return Err(error);
        }
        if outcome.used_cache {
            debug!(source, "cache hit, execution skipped");
            return Ok(SubmitReport {
                used_cache: true,
                channel_count: self.publisher.channel_count(),
            });
        }
        let Some(function) = outcome.function else {
            // Unreachable by construction: no error implies a function.
            return Err(BridgeError::Compile {
                message: "cache returned neither function nor error".to_string(),
            });
        };

        // The stack is never cleared before execution and is preserved
        // after it; `clear` is the only operation that empties it.
        let thread = &mut self.thread;
        if let Err(contained) = run_contained("execute", || function.apply(thread)) {
            let error = contain::execution_error(&contained);
            self.error.record(&error);
            self.publisher.publish_silence();
            warn!(error = %error, hint = contained.kind.hint(), "execution failed");
            return Err(error);
        }

        let channel_count = match self.thread.top() {
            Some(value) => {
                let outcome = self.classifier.classify(value);
                if let ExecutionOutcome::Error(e) = &outcome {
                    // Shape probes failed after a successful run:
                    // degrade to silence instead of failing the submit.
                    self.error.record(e);
                }
                match self.publisher.publish(outcome) {
                    Ok(count) => count,
                    Err(e) => {
                        self.error.record(&e);
                        0
                    }
                }
            }
            // Empty stack: the program published (or stopped) through
            // its own primitives, or produced nothing. Leave the channel
            // state as the engine left it.
            None => self.publisher.channel_count(),
        };

        info!(source, channel_count, "program active");
        Ok(SubmitReport {
            used_cache: false,
            channel_count,
        })
    }

    /// Submit a host token message as program text.
    pub fn submit_tokens(&mut self, tokens: &[Token]) -> Result<SubmitReport> {
        self.submit(&program_from_tokens(tokens))
    }

    /// Clear the value stack and force the channel state to silence,
    /// without recompiling anything.
    pub fn clear(&mut self) {
        let depth = self.thread.depth();
        self.thread.clear();
        self.publisher.publish_silence();
        info!(cleared = depth, "stack cleared, audio stopped");
    }

    /// Depth of the interpreter's value stack.
    pub fn stack_depth(&self) -> usize {
        self.thread.depth()
    }

    /// Legacy passthrough offset (the host's float message).
    pub fn set_offset(&self, offset: f32) {
        self.publisher.set_offset(offset);
    }

    /// Structured status snapshot for host queries.
    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            in_error: self.error.in_error,
            error_kind: self.error.kind,
            error_message: self.error.message.clone(),
            has_function: self.cache.has_function(),
            cached_source: self.cache.source().map(|s| s.to_string()),
            channel_count: self.publisher.channel_count(),
            version: self.publisher.version(),
            stack_depth: self.thread.depth(),
        }
    }

    /// Collect notices the audio side produced since the last poll,
    /// logging each. Exhaustion already invalidated the channel state;
    /// this is purely diagnostic. Also frees the snapshots the audio
    /// thread retired, keeping deallocation off the audio tick.
    pub fn poll_drain_events(&mut self) -> Vec<DrainEvent> {
        while self.retired.try_recv().is_ok() {}
        let mut collected = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            match &event {
                DrainEvent::Exhausted { version } => {
                    info!(version, "stream exhausted, playback ended");
                }
                DrainEvent::Failed { version, message } => {
                    warn!(version, message = message.as_str(), "drain failure");
                }
            }
            collected.push(event);
        }
        collected
    }

    /// Publisher handle for wiring engine primitives after construction.
    pub fn publisher_handle(&self) -> PublisherHandle {
        self.publisher.handle()
    }
}
