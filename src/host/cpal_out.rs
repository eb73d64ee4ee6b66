//! Real audio output using CPAL (Cross-Platform Audio Library).
//!
//! Wraps a [`RealtimeDrain`] in a cpal output stream: every device
//! callback becomes exactly one interleaved block fill. The drain
//! already guarantees the callback never blocks or panics, so the
//! closure here stays a thin shim.

use crate::bridge::drain::RealtimeDrain;
use crate::error::{BridgeError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

/// Output stream configuration.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// A running cpal output stream. Playback stops when dropped.
pub struct CpalOutput {
    stream: cpal::Stream,
}

impl CpalOutput {
    /// Open the default output device and start pulling blocks from
    /// `drain`.
    ///
    /// The configured rate must also be handed to the control side
    /// (`Bridge::set_sample_rate`) so the interpreter generates at the
    /// device rate.
    pub fn spawn(mut drain: RealtimeDrain, config: OutputConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| BridgeError::Host {
                message: "no default output device".to_string(),
            })?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let channels = config.channels.max(1);
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels as usize;
                    drain.fill_interleaved(frames, channels as usize, data, None);
                },
                |err| {
                    warn!(error = %err, "output stream error");
                },
                None,
            )
            .map_err(|e| BridgeError::Host {
                message: format!("failed to build output stream: {}", e),
            })?;

        stream.play().map_err(|e| BridgeError::Host {
            message: format!("failed to start output stream: {}", e),
        })?;

        info!(
            device = device_name.as_str(),
            sample_rate = config.sample_rate,
            channels,
            "output stream started"
        );
        Ok(Self { stream })
    }

    /// Pause playback without tearing the stream down.
    pub fn pause(&self) -> Result<()> {
        self.stream.pause().map_err(|e| BridgeError::Host {
            message: format!("failed to pause output stream: {}", e),
        })
    }

    /// Resume a paused stream.
    pub fn play(&self) -> Result<()> {
        self.stream.play().map_err(|e| BridgeError::Host {
            message: format!("failed to resume output stream: {}", e),
        })
    }
}
