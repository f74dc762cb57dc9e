//! End-of-utterance detection
//!
//! Energy-based: speech starts when RMS energy crosses a threshold and the
//! utterance ends after a run of silence following enough speech.

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to accept (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration that ends an utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Where the detector is within an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Waiting for speech
    Waiting,
    /// Speech seen, accumulating until silence
    Speaking,
    /// Speech followed by enough silence
    Complete,
}

/// Segments one spoken utterance out of a sample stream
#[derive(Debug)]
pub struct EndpointDetector {
    state: EndpointState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for EndpointDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: EndpointState::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed samples; returns true once the utterance is complete
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            EndpointState::Waiting => {
                if is_speech {
                    self.state = EndpointState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                }
            }
            EndpointState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > SILENCE_SAMPLES {
                    if self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter {
                        tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                        self.state = EndpointState::Complete;
                    } else {
                        // A click or cough: too short to be an utterance
                        tracing::trace!("discarding short noise burst");
                        self.reset();
                    }
                }
            }
            EndpointState::Complete => {}
        }

        self.state == EndpointState::Complete
    }

    #[must_use]
    pub const fn state(&self) -> EndpointState {
        self.state
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == EndpointState::Complete
    }

    /// Accumulated samples of the current utterance
    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }

    /// Take the utterance samples and start over
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.speech_buffer);
        self.reset();
        samples
    }

    /// Reset to waiting
    pub fn reset(&mut self) {
        self.state = EndpointState::Waiting;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(calculate_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(calculate_energy(&loud) > 0.4);
    }

    #[test]
    fn test_silence_never_starts_utterance() {
        let mut detector = EndpointDetector::new();
        assert!(!detector.process(&[0.0; 16000]));
        assert_eq!(detector.state(), EndpointState::Waiting);
        assert!(detector.speech_buffer().is_empty());
    }

    #[test]
    fn test_short_burst_is_discarded() {
        let mut detector = EndpointDetector::new();
        detector.process(&[0.5; 1600]);
        assert_eq!(detector.state(), EndpointState::Speaking);

        assert!(!detector.process(&[0.0; 9000]));
        assert_eq!(detector.state(), EndpointState::Waiting);
    }
}
