//! Error types for sonobridge.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    // Control path: program construction
    #[error("No code provided")]
    NoCode,

    #[error("Program text too long ({len} characters, limit {limit})")]
    ProgramTooLong { len: usize, limit: usize },

    // Control path: compile / execute
    #[error("Compilation failed: {message}")]
    Compile { message: String },

    #[error("Execution failed: {message}")]
    Execution { message: String },

    // Shape inference over the post-execution stack value
    #[error("Classification probe failed: {message}")]
    Classification { message: String },

    // Real-time path: extractor binding and draining
    #[error("Stream error: {message}")]
    Stream { message: String },

    // Audio host adapter
    #[error("Audio host error: {message}")]
    Host { message: String },

    // Anything else the interpreter reports
    #[error("Engine error: {message}")]
    Engine { message: String },
}

impl BridgeError {
    /// The raw message text, used by error-kind detection.
    pub fn message(&self) -> String {
        match self {
            BridgeError::NoCode => "No code provided".to_string(),
            BridgeError::ProgramTooLong { .. } => self.to_string(),
            BridgeError::Compile { message }
            | BridgeError::Execution { message }
            | BridgeError::Classification { message }
            | BridgeError::Stream { message }
            | BridgeError::Host { message }
            | BridgeError::Engine { message } => message.clone(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, BridgeError>;
