use crate::defaults;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Largest block the host may request per tick. Sizes the drain's
    /// pre-allocated scratch buffer.
    pub max_block_frames: usize,
    /// Runtime type names treated as single-channel stream producers
    /// during classification.
    pub stream_type_names: Vec<String>,
    /// Capacity of the drain-to-control event queue.
    pub event_queue_len: usize,
    /// When no audio is active, pass the host input through with the
    /// scalar offset applied instead of emitting silence.
    pub passthrough: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_block_frames: defaults::MAX_BLOCK_FRAMES,
            stream_type_names: defaults::STREAM_TYPE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            event_queue_len: defaults::EVENT_QUEUE_LEN,
            passthrough: false,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, falling back to defaults if the
    /// file is missing or unreadable. Invalid TOML is reported and
    /// replaced with defaults rather than aborting the host.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                    Self::default()
                }
            }
        }
    }
}
