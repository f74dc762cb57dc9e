//! Audio capture from microphone

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use super::{AudioClip, EndpointDetector};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// How often the capture loop drains the device buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Extra time the blocking recorder gets past its own deadline
const STUCK_DEVICE_GRACE: Duration = Duration::from_secs(1);

/// Records one spoken utterance
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Record until end-of-utterance is detected or `timeout` elapses
    ///
    /// # Errors
    ///
    /// Returns `Error::RecognitionUnavailable` on timeout or device failure
    async fn capture(&self, timeout: Duration) -> Result<AudioClip>;
}

/// Captures audio from the default input device
pub struct AudioCapture {
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("audio capture stopped");
        }
    }

    /// Samples captured since the last call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// [`SpeechCapture`] over the default microphone
///
/// `cpal` streams are not `Send`, so each capture opens the device on a
/// blocking thread and closes it before returning.
#[derive(Debug, Default, Clone, Copy)]
pub struct MicrophoneCapture;

#[async_trait]
impl SpeechCapture for MicrophoneCapture {
    async fn capture(&self, timeout: Duration) -> Result<AudioClip> {
        let (deadline, bound) = capture_bounds(Instant::now(), timeout)?;
        let recording = tokio::task::spawn_blocking(move || record_utterance(deadline));

        // The blocking loop honours the deadline itself; this guards a stuck device
        match tokio::time::timeout(bound, recording).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(Error::RecognitionUnavailable(format!(
                "capture task failed: {e}"
            ))),
            Err(_) => Err(Error::RecognitionUnavailable(
                "microphone did not respond".to_string(),
            )),
        }
    }
}

/// Recorder deadline and the outer bound on the capture task
fn capture_bounds(start: Instant, timeout: Duration) -> Result<(Instant, Duration)> {
    let deadline = start.checked_add(timeout).ok_or_else(|| {
        Error::RecognitionUnavailable(format!(
            "capture timeout of {}s is out of range",
            timeout.as_secs()
        ))
    })?;
    Ok((deadline, timeout.saturating_add(STUCK_DEVICE_GRACE)))
}

fn record_utterance(deadline: Instant) -> Result<AudioClip> {
    let mut capture = AudioCapture::new()
        .and_then(|mut c| c.start().map(|()| c))
        .map_err(|e| Error::RecognitionUnavailable(e.to_string()))?;
    let mut detector = EndpointDetector::new();

    tracing::info!("listening");

    let samples = loop {
        if Instant::now() >= deadline {
            capture.stop();
            return Err(Error::RecognitionUnavailable(
                "no complete utterance before capture timeout".to_string(),
            ));
        }

        std::thread::sleep(POLL_INTERVAL);
        if detector.process(&capture.take_buffer()) {
            break detector.take_utterance();
        }
    };

    capture.stop();
    tracing::debug!(samples = samples.len(), "utterance captured");

    samples_to_wav(&samples, SAMPLE_RATE).map(AudioClip::wav)
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_bounds() {
        let start = Instant::now();
        let (deadline, bound) = capture_bounds(start, Duration::from_secs(8)).unwrap();

        assert_eq!(deadline - start, Duration::from_secs(8));
        assert_eq!(bound, Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_out_of_range_timeout_is_unavailable() {
        // Fails before any device is opened
        let err = MicrophoneCapture.capture(Duration::MAX).await.unwrap_err();
        assert!(matches!(err, Error::RecognitionUnavailable(msg) if msg.contains("out of range")));
    }
}
