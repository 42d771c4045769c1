//! cpal output stream: mixes the voice pool into the device buffer
//!
//! Device negotiation is separated from stream start so the engine can size
//! the pool to the device's actual sample rate before any audio runs.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::{Arc, Mutex};

use super::pool::VoicePool;

/// Fallback frames-per-buffer guess when the device reports no fixed size
const DEFAULT_BUFFER_FRAMES: f64 = 512.0;

/// A negotiated output device, not yet streaming
pub struct NegotiatedOutput {
    device: cpal::Device,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl NegotiatedOutput {
    /// Pick the default output device and its preferred configuration
    pub fn negotiate() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        let config = device.default_output_config()?;

        let sample_format = config.sample_format();
        Ok(Self {
            device,
            config: config.into(),
            sample_format,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate.0 as f32
    }

    /// Output latency estimate in ms, from the negotiated buffer size
    pub fn latency_estimate_ms(&self) -> f64 {
        let frames = match self.config.buffer_size {
            BufferSize::Fixed(n) => n as f64,
            BufferSize::Default => DEFAULT_BUFFER_FRAMES,
        };
        frames / self.sample_rate() as f64 * 1000.0
    }

    /// Build and start the output stream over the shared voice pool
    pub fn start(self, pool: Arc<Mutex<VoicePool>>) -> Result<AudioOutput> {
        let latency_ms = self.latency_estimate_ms();
        let stream = match self.sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&self.device, &self.config, pool)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&self.device, &self.config, pool)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&self.device, &self.config, pool)?,
            other => return Err(anyhow!("Unsupported sample format: {:?}", other)),
        };
        stream
            .play()
            .map_err(|e| anyhow!("Failed to start stream: {}", e))?;

        Ok(AudioOutput {
            _stream: stream,
            latency_ms,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        pool: Arc<Mutex<VoicePool>>,
    ) -> Result<Stream>
    where
        T: Sample + SizedSample + Send + 'static + cpal::FromSample<f32>,
    {
        let channels = config.channels as usize;
        let err_fn = |err| eprintln!("an error occurred on the output audio stream: {:?}", err);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut pool = pool.lock().unwrap();
                    for frame in data.chunks_mut(channels) {
                        let value: T = cpal::Sample::from_sample(pool.next_sample());
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| anyhow!("Failed to build output stream: {}", e))?;

        Ok(stream)
    }
}

/// A running output stream; dropping it stops audio
pub struct AudioOutput {
    _stream: Stream,
    latency_ms: f64,
}

impl AudioOutput {
    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation() {
        // This may fail on systems without audio devices (like CI)
        match NegotiatedOutput::negotiate() {
            Ok(out) => {
                assert!(out.sample_rate() > 0.0);
                assert!(out.latency_estimate_ms() > 0.0);
            }
            Err(_) => {
                println!("Negotiation failed - likely no audio device available");
            }
        }
    }
}
