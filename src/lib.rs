//! sonobridge - streaming bridge between a stack-based audio language
//! interpreter and a real-time block callback.
//!
//! The interpreter is an external collaborator consumed through the
//! traits in [`engine`]. The bridge caches compilation, classifies
//! execution results into an audio shape, publishes extractor snapshots
//! across the control/real-time boundary, and drains fixed-size blocks
//! on every audio tick without ever stalling or crashing that path.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod bridge;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
#[cfg(feature = "cpal-audio")]
pub mod host;

// Core traits (engine seam)
pub use engine::{
    CompiledProgram, Extractor, FillOutcome, ScriptEngine, SequenceLen, StackThread, StackValue,
};

// Bridge façade and components
pub use bridge::classify::{ExecutionOutcome, ResultClassifier};
pub use bridge::contain::ErrorKind;
pub use bridge::drain::{DrainEvent, RealtimeDrain};
pub use bridge::publish::{ChannelSnapshot, PublisherHandle, StreamPublisher};
pub use bridge::{Bridge, BridgeStatus, SubmitReport, Token, program_from_tokens};

// Error handling
pub use error::{BridgeError, Result};

// Config
pub use config::BridgeConfig;

/// Build version string with optional git commit hash.
///
/// Returns `"0.2.0+abc1234"` when git hash is available, `"0.2.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
