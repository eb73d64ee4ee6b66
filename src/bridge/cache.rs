//! Compilation cache.
//!
//! Maps the latest source text to its compiled program so repeated
//! submissions of the same text never re-invoke the interpreter. The
//! comparison is full-string equality; there is no diffing. A failing
//! text stays cached as an error, so resubmitting it is also free.

use crate::bridge::contain::{self, run_contained};
use crate::defaults;
use crate::engine::ScriptEngine;
use crate::error::BridgeError;
use std::sync::Arc;
use tracing::debug;

/// Result of one cache submission.
pub struct CacheOutcome<P> {
    /// True when the text matched the cached source exactly and the
    /// interpreter was not invoked.
    pub used_cache: bool,
    pub function: Option<Arc<P>>,
    pub error: Option<BridgeError>,
}

/// Owns the last-compiled source text and its program.
pub struct CompilationCache<E: ScriptEngine> {
    source: Option<String>,
    function: Option<Arc<E::Program>>,
    error: Option<BridgeError>,
}

impl<E: ScriptEngine> CompilationCache<E> {
    pub fn new() -> Self {
        Self {
            source: None,
            function: None,
            error: None,
        }
    }

    /// The cached source text, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// True when a compiled program is retained.
    pub fn has_function(&self) -> bool {
        self.function.is_some()
    }

    /// Submit source text, compiling only when it differs from the
    /// cached text.
    pub fn submit(&mut self, engine: &mut E, text: &str) -> CacheOutcome<E::Program> {
        // An empty or whitespace-only program is rejected before the
        // interpreter sees it; compiling nothing is not a meaningful
        // request. Does not disturb the cache.
        if text.trim().is_empty() {
            return CacheOutcome {
                used_cache: false,
                function: None,
                error: Some(BridgeError::NoCode),
            };
        }
        if text.len() > defaults::MAX_PROGRAM_LEN {
            return CacheOutcome {
                used_cache: false,
                function: None,
                error: Some(BridgeError::ProgramTooLong {
                    len: text.len(),
                    limit: defaults::MAX_PROGRAM_LEN,
                }),
            };
        }

        if self.source.as_deref() == Some(text) {
            debug!(source = text, "using cached compilation");
            // A cached error wins over a retained older function: the
            // previous program is never rolled back for reuse.
            if let Some(error) = &self.error {
                return CacheOutcome {
                    used_cache: true,
                    function: None,
                    error: Some(error.clone()),
                };
            }
            return CacheOutcome {
                used_cache: true,
                function: self.function.clone(),
                error: None,
            };
        }

        debug!(source = text, "compiling");
        self.source = Some(text.to_string());
        self.error = None;

        match run_contained("compile", || engine.compile(text)) {
            Ok(Some(function)) => {
                self.function = Some(function.clone());
                CacheOutcome {
                    used_cache: false,
                    function: Some(function),
                    error: None,
                }
            }
            Ok(None) => {
                // Reported success with no function produced: a failure,
                // same as a produced-but-failed compile.
                let error = BridgeError::Compile {
                    message: "compile reported success but produced no function".to_string(),
                };
                self.error = Some(error.clone());
                CacheOutcome {
                    used_cache: false,
                    function: None,
                    error: Some(error),
                }
            }
            Err(contained) => {
                let error = contain::compile_error(&contained);
                self.error = Some(error.clone());
                CacheOutcome {
                    used_cache: false,
                    function: None,
                    error: Some(error),
                }
            }
        }
    }
}

impl<E: ScriptEngine> Default for CompilationCache<E> {
    fn default() -> Self {
        Self::new()
    }
}
