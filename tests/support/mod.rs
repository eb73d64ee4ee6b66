//! Miniature stack interpreter used as the engine fixture.
//!
//! Just enough language to exercise the bridge end to end: numbers,
//! `sinosc`, `take`, arithmetic, and list literals. Streams are lazy
//! sine generators pulled through the real extractor contract.

use sonobridge::error::{BridgeError, Result};
use sonobridge::{
    CompiledProgram, Extractor, FillOutcome, ScriptEngine, SequenceLen, StackThread, StackValue,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const SAMPLE_RATE: f64 = 48000.0;

/// A lazily-evaluated sine stream: frequency, phase, amplitude, and an
/// optional sample limit.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    pub freq: f64,
    pub phase: f64,
    pub amp: f64,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Stream(StreamSpec),
    List(Vec<Value>),
    /// Open-bracket marker during list construction.
    Mark,
}

struct SineExtractor {
    spec: StreamSpec,
    position: usize,
}

impl Extractor for SineExtractor {
    fn fill(&mut self, out: &mut [f32]) -> Result<FillOutcome> {
        let frames = match self.spec.limit {
            Some(limit) => out.len().min(limit.saturating_sub(self.position)),
            None => out.len(),
        };
        for (i, sample) in out[..frames].iter_mut().enumerate() {
            let t = (self.position + i) as f64 / SAMPLE_RATE;
            *sample =
                (self.spec.amp * (2.0 * std::f64::consts::PI * self.spec.freq * t + self.spec.phase).sin())
                    as f32;
        }
        self.position += frames;
        let exhausted = self
            .spec
            .limit
            .is_some_and(|limit| self.position >= limit);
        Ok(FillOutcome { frames, exhausted })
    }
}

impl StackValue for Value {
    fn is_stream(&self) -> Result<bool> {
        Ok(matches!(self, Value::Stream(_)))
    }

    fn type_name(&self) -> Result<String> {
        Ok(match self {
            Value::Num(_) => "Real",
            Value::Stream(_) => "ZList",
            Value::List(_) => "List",
            Value::Mark => "Mark",
        }
        .to_string())
    }

    fn sequence_len(&self) -> Result<SequenceLen> {
        match self {
            Value::List(items) => Ok(SequenceLen::Finite(items.len())),
            _ => Ok(SequenceLen::NotSequence),
        }
    }

    fn element(&self, index: usize) -> Result<Option<Self>> {
        match self {
            Value::List(items) => Ok(items.get(index).cloned()),
            _ => Ok(None),
        }
    }

    fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    fn bind_stream(&self) -> Result<Option<Box<dyn Extractor>>> {
        match self {
            Value::Stream(spec) => Ok(Some(Box::new(SineExtractor {
                spec: spec.clone(),
                position: 0,
            }))),
            // One-channel playback of a sequence: its first stream.
            Value::List(items) => {
                for item in items {
                    if let Value::Stream(spec) = item {
                        return Ok(Some(Box::new(SineExtractor {
                            spec: spec.clone(),
                            position: 0,
                        })));
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct MiniThread {
    pub stack: Vec<Value>,
}

impl StackThread for MiniThread {
    type Value = Value;

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn top(&self) -> Option<Value> {
        self.stack.last().cloned()
    }

    fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    fn clear(&mut self) {
        self.stack.clear();
    }
}

#[derive(Debug, Clone)]
enum Op {
    Push(f64),
    SinOsc,
    Mul,
    Add,
    Take,
    ListOpen,
    ListClose,
}

pub struct MiniProgram {
    ops: Vec<Op>,
}

fn pop_num(stack: &mut Vec<Value>, op: &str) -> Result<f64> {
    match stack.pop() {
        Some(Value::Num(n)) => Ok(n),
        Some(_) => Err(BridgeError::Engine {
            message: format!("type error: {} expects a number", op),
        }),
        None => Err(BridgeError::Engine {
            message: format!("stack underflow in {}", op),
        }),
    }
}

impl CompiledProgram for MiniProgram {
    type Thread = MiniThread;

    fn apply(&self, thread: &mut MiniThread) -> Result<()> {
        let stack = &mut thread.stack;
        for op in &self.ops {
            match op {
                Op::Push(n) => stack.push(Value::Num(*n)),
                Op::SinOsc => {
                    let phase = pop_num(stack, "sinosc")?;
                    let freq = pop_num(stack, "sinosc")?;
                    stack.push(Value::Stream(StreamSpec {
                        freq,
                        phase,
                        amp: 1.0,
                        limit: None,
                    }));
                }
                Op::Mul => {
                    let b = stack.pop();
                    let a = stack.pop();
                    match (a, b) {
                        (Some(Value::Num(a)), Some(Value::Num(b))) => {
                            stack.push(Value::Num(a * b));
                        }
                        (Some(Value::Stream(mut spec)), Some(Value::Num(n)))
                        | (Some(Value::Num(n)), Some(Value::Stream(mut spec))) => {
                            spec.amp *= n;
                            stack.push(Value::Stream(spec));
                        }
                        (None, _) | (_, None) => {
                            return Err(BridgeError::Engine {
                                message: "stack underflow in *".to_string(),
                            });
                        }
                        _ => {
                            return Err(BridgeError::Engine {
                                message: "type error: * expects numbers or a stream".to_string(),
                            });
                        }
                    }
                }
                Op::Add => {
                    let b = pop_num(stack, "+")?;
                    let a = pop_num(stack, "+")?;
                    stack.push(Value::Num(a + b));
                }
                Op::Take => {
                    let count = pop_num(stack, "take")?;
                    match stack.pop() {
                        Some(Value::Stream(mut spec)) => {
                            spec.limit = Some(count.max(0.0) as usize);
                            stack.push(Value::Stream(spec));
                        }
                        Some(_) => {
                            return Err(BridgeError::Engine {
                                message: "type error: take expects a stream".to_string(),
                            });
                        }
                        None => {
                            return Err(BridgeError::Engine {
                                message: "stack underflow in take".to_string(),
                            });
                        }
                    }
                }
                Op::ListOpen => stack.push(Value::Mark),
                Op::ListClose => {
                    let mut items = Vec::new();
                    loop {
                        match stack.pop() {
                            Some(Value::Mark) => break,
                            Some(value) => items.push(value),
                            None => {
                                return Err(BridgeError::Engine {
                                    message: "syntax error: ] without matching [".to_string(),
                                });
                            }
                        }
                    }
                    items.reverse();
                    stack.push(Value::List(items));
                }
            }
        }
        Ok(())
    }
}

/// The fixture engine: compiles token text into a [`MiniProgram`].
pub struct MiniEngine {
    compile_count: Arc<AtomicUsize>,
}

impl MiniEngine {
    pub fn new() -> Self {
        Self {
            compile_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shareable compile counter, for cache assertions after the engine
    /// moves into a bridge.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.compile_count.clone()
    }
}

impl ScriptEngine for MiniEngine {
    type Thread = MiniThread;
    type Program = MiniProgram;

    fn compile(&mut self, source: &str) -> Result<Option<Arc<MiniProgram>>> {
        self.compile_count.fetch_add(1, Ordering::SeqCst);
        let mut ops = Vec::new();
        for word in source.split_whitespace() {
            if let Ok(n) = word.parse::<f64>() {
                ops.push(Op::Push(n));
                continue;
            }
            ops.push(match word {
                "sinosc" => Op::SinOsc,
                "*" => Op::Mul,
                "+" => Op::Add,
                "take" => Op::Take,
                "[" => Op::ListOpen,
                "]" => Op::ListClose,
                other => {
                    return Err(BridgeError::Engine {
                        message: format!("Undefined symbol: {}", other),
                    });
                }
            });
        }
        Ok(Some(Arc::new(MiniProgram { ops })))
    }
}
