//! Shared fakes for bridge unit tests.
//!
//! Mirrors the builder style of mock collaborators elsewhere in the
//! ecosystem: each fake is configured up front and fails on demand.

use crate::engine::{
    CompiledProgram, Extractor, FillOutcome, ScriptEngine, SequenceLen, StackThread, StackValue,
};
use crate::error::{BridgeError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// A constant-valued stream: emits `value` until `remaining` runs out
/// (or forever when `None`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub value: f32,
    pub remaining: Option<usize>,
}

impl Tone {
    pub fn endless(value: f32) -> Self {
        Self {
            value,
            remaining: None,
        }
    }

    pub fn finite(value: f32, frames: usize) -> Self {
        Self {
            value,
            remaining: Some(frames),
        }
    }
}

pub struct ToneExtractor {
    tone: Tone,
}

impl Extractor for ToneExtractor {
    fn fill(&mut self, out: &mut [f32]) -> Result<FillOutcome> {
        let frames = match self.tone.remaining {
            Some(left) => out.len().min(left),
            None => out.len(),
        };
        for sample in &mut out[..frames] {
            *sample = self.tone.value;
        }
        let exhausted = match &mut self.tone.remaining {
            Some(left) => {
                *left -= frames;
                *left == 0
            }
            None => false,
        };
        Ok(FillOutcome { frames, exhausted })
    }
}

struct FailingExtractor;

impl Extractor for FailingExtractor {
    fn fill(&mut self, _out: &mut [f32]) -> Result<FillOutcome> {
        Err(BridgeError::Stream {
            message: "extractor fault".to_string(),
        })
    }
}

struct PanickingExtractor;

impl Extractor for PanickingExtractor {
    fn fill(&mut self, _out: &mut [f32]) -> Result<FillOutcome> {
        panic!("extractor blew up");
    }
}

/// Fake interpreter value covering every classification path.
#[derive(Debug, Clone)]
pub enum FakeValue {
    Num(f64),
    /// Directly a stream handle.
    Stream(Tone),
    /// `is_stream` is false but the type name is a known stream producer.
    NamedStream(&'static str, Tone),
    List(Vec<FakeValue>),
    /// Wraps a stream in a sequence with no known end.
    Endless(Tone),
    /// Unrecognized object.
    Opaque,
    /// Every probe errors.
    PoisonProbe,
    /// Looks like a stream but binding fails.
    BindFail,
    /// Binds fine; the extractor errors on fill.
    FillFail,
    /// Binds fine; the extractor panics on fill.
    FillPanic,
}

impl StackValue for FakeValue {
    fn is_stream(&self) -> Result<bool> {
        match self {
            FakeValue::PoisonProbe => Err(poison()),
            FakeValue::Stream(_)
            | FakeValue::BindFail
            | FakeValue::FillFail
            | FakeValue::FillPanic => Ok(true),
            _ => Ok(false),
        }
    }

    fn type_name(&self) -> Result<String> {
        match self {
            FakeValue::PoisonProbe => Err(poison()),
            FakeValue::Num(_) => Ok("Real".to_string()),
            FakeValue::Stream(_) => Ok("ZStream".to_string()),
            FakeValue::NamedStream(name, _) => Ok(name.to_string()),
            FakeValue::List(_) => Ok("List".to_string()),
            FakeValue::Endless(_) => Ok("LazySeq".to_string()),
            FakeValue::Opaque => Ok("Thing".to_string()),
            FakeValue::BindFail | FakeValue::FillFail | FakeValue::FillPanic => {
                Ok("ZStream".to_string())
            }
        }
    }

    fn sequence_len(&self) -> Result<SequenceLen> {
        match self {
            FakeValue::PoisonProbe => Err(poison()),
            FakeValue::List(items) => Ok(SequenceLen::Finite(items.len())),
            FakeValue::Endless(_) => Ok(SequenceLen::Infinite),
            _ => Ok(SequenceLen::NotSequence),
        }
    }

    fn element(&self, index: usize) -> Result<Option<Self>> {
        match self {
            FakeValue::PoisonProbe => Err(poison()),
            FakeValue::List(items) => Ok(items.get(index).cloned()),
            _ => Ok(None),
        }
    }

    fn as_scalar(&self) -> Option<f64> {
        match self {
            FakeValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    fn bind_stream(&self) -> Result<Option<Box<dyn Extractor>>> {
        match self {
            FakeValue::Stream(tone)
            | FakeValue::NamedStream(_, tone)
            | FakeValue::Endless(tone) => Ok(Some(Box::new(ToneExtractor { tone: *tone }))),
            FakeValue::List(items) => {
                // Iteration semantics of the fake: a sequence plays as
                // one channel using its first stream element.
                for item in items {
                    if let FakeValue::Stream(tone) = item {
                        return Ok(Some(Box::new(ToneExtractor { tone: *tone })));
                    }
                }
                Ok(None)
            }
            FakeValue::BindFail => Err(BridgeError::Stream {
                message: "bind refused".to_string(),
            }),
            FakeValue::FillFail => Ok(Some(Box::new(FailingExtractor))),
            FakeValue::FillPanic => Ok(Some(Box::new(PanickingExtractor))),
            _ => Ok(None),
        }
    }
}

fn poison() -> BridgeError {
    BridgeError::Engine {
        message: "probe exploded".to_string(),
    }
}

/// Fake value stack.
#[derive(Default)]
pub struct FakeThread {
    pub stack: Vec<FakeValue>,
}

impl StackThread for FakeThread {
    type Value = FakeValue;

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn top(&self) -> Option<FakeValue> {
        self.stack.last().cloned()
    }

    fn pop(&mut self) -> Option<FakeValue> {
        self.stack.pop()
    }

    fn clear(&mut self) {
        self.stack.clear();
    }
}

/// Fake compiled program: pushes configured values or fails.
pub struct FakeProgram {
    pushes: Vec<FakeValue>,
    fail: Option<String>,
}

impl CompiledProgram for FakeProgram {
    type Thread = FakeThread;

    fn apply(&self, thread: &mut FakeThread) -> Result<()> {
        if let Some(message) = &self.fail {
            return Err(BridgeError::Engine {
                message: message.clone(),
            });
        }
        thread.stack.extend(self.pushes.iter().cloned());
        Ok(())
    }
}

/// Fake engine configured per source string.
#[derive(Default)]
pub struct FakeEngine {
    programs: HashMap<String, Arc<FakeProgram>>,
    compile_failures: HashMap<String, String>,
    hollow: Vec<String>,
    compile_count: Arc<AtomicUsize>,
    sample_rate: Arc<AtomicU32>,
    sample_rate_failures: usize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that compiles to a program pushing `values`.
    pub fn with_program(mut self, source: &str, values: Vec<FakeValue>) -> Self {
        self.programs.insert(
            source.to_string(),
            Arc::new(FakeProgram {
                pushes: values,
                fail: None,
            }),
        );
        self
    }

    /// Source that compiles but fails at execution with `message`.
    pub fn with_failing_program(mut self, source: &str, message: &str) -> Self {
        self.programs.insert(
            source.to_string(),
            Arc::new(FakeProgram {
                pushes: Vec::new(),
                fail: Some(message.to_string()),
            }),
        );
        self
    }

    /// Source whose compile fails with `message`.
    pub fn with_compile_failure(mut self, source: &str, message: &str) -> Self {
        self.compile_failures
            .insert(source.to_string(), message.to_string());
        self
    }

    /// Source whose compile reports success but produces no function.
    pub fn with_hollow_compile(mut self, source: &str) -> Self {
        self.hollow.push(source.to_string());
        self
    }

    /// Reject the next `count` sample-rate changes before accepting.
    pub fn with_sample_rate_failures(mut self, count: usize) -> Self {
        self.sample_rate_failures = count;
        self
    }

    pub fn compile_count(&self) -> usize {
        self.compile_count.load(Ordering::SeqCst)
    }

    /// Shareable view of the last accepted sample rate, readable after
    /// the engine moves into a bridge.
    pub fn sample_rate_probe(&self) -> Arc<AtomicU32> {
        self.sample_rate.clone()
    }
}

impl ScriptEngine for FakeEngine {
    type Thread = FakeThread;
    type Program = FakeProgram;

    fn compile(&mut self, source: &str) -> Result<Option<Arc<FakeProgram>>> {
        self.compile_count.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.compile_failures.get(source) {
            return Err(BridgeError::Engine {
                message: message.clone(),
            });
        }
        if self.hollow.iter().any(|s| s == source) {
            return Ok(None);
        }
        match self.programs.get(source) {
            Some(program) => Ok(Some(program.clone())),
            None => Err(BridgeError::Engine {
                message: format!("Undefined symbol in '{}'", source),
            }),
        }
    }

    fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        if self.sample_rate_failures > 0 {
            self.sample_rate_failures -= 1;
            return Err(BridgeError::Engine {
                message: "sample rate rejected".to_string(),
            });
        }
        self.sample_rate.store(sample_rate, Ordering::SeqCst);
        Ok(())
    }
}
