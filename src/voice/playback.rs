//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::{AudioClip, AudioFormat};
use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays audio to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports = |channels: u16| {
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == channels
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
        };

        let config = supports(1)
            .or_else(|| supports(2))
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Decode and play a clip, blocking until it finishes
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_clip(&self, clip: &AudioClip) -> Result<()> {
        if clip.is_silent() {
            return Ok(());
        }

        let samples = match clip.format() {
            AudioFormat::Mp3 => decode_mp3(clip.bytes())?,
            AudioFormat::Wav => decode_wav(clip.bytes())?,
        };
        self.play_samples(samples)
    }

    /// Play mono f32 samples at the playback rate, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built
    pub fn play_samples(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            self.device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let pos = position.load(Ordering::Relaxed);
                            let sample = samples.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Relaxed);
                                0.0
                            });
                            frame.fill(sample);
                            if pos < samples.len() {
                                position.store(pos + 1, Ordering::Relaxed);
                            }
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while !finished.load(Ordering::Relaxed) && start.elapsed() < timeout {
            std::thread::sleep(Duration::from_millis(50));
        }

        // Let the device flush its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

/// Decode 16-bit mono WAV bytes to f32 samples
fn decode_wav(wav_data: &[u8]) -> Result<Vec<f32>> {
    let mut reader =
        hound::WavReader::new(Cursor::new(wav_data)).map_err(|e| Error::Audio(e.to_string()))?;

    reader
        .samples::<i16>()
        .map(|s| {
            s.map(|v| f32::from(v) / 32768.0)
                .map_err(|e| Error::Audio(e.to_string()))
        })
        .collect()
}
