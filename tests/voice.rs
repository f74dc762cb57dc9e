//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware; hosted speech
//! APIs are served by wiremock.

use std::io::Cursor;

use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tutor_assistant::voice::{
    AudioClip, EndpointDetector, EndpointState, LanguageDetector, SAMPLE_RATE, SpeechRecognizer,
    SpeechSynthesizer, SpeechToText, SttProvider, TextToSpeech, WhatlangDetector, samples_to_wav,
};
use tutor_assistant::Error;

/// 100ms of audio at 16kHz
const CHUNK: usize = 1600;

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

fn feed(detector: &mut EndpointDetector, samples: &[f32]) -> bool {
    samples.chunks(CHUNK).any(|chunk| detector.process(chunk))
}

fn key() -> SecretString {
    SecretString::from("test-key".to_string())
}

#[test]
fn test_endpoint_waits_through_silence() {
    let mut detector = EndpointDetector::new();

    assert!(!feed(&mut detector, &generate_silence(2.0)));
    assert_eq!(detector.state(), EndpointState::Waiting);
    assert!(detector.speech_buffer().is_empty());
}

#[test]
fn test_endpoint_completes_after_speech_then_silence() {
    let mut detector = EndpointDetector::new();

    assert!(!feed(&mut detector, &generate_sine_samples(440.0, 1.0, 0.5)));
    assert_eq!(detector.state(), EndpointState::Speaking);

    assert!(feed(&mut detector, &generate_silence(1.0)));
    assert!(detector.is_complete());

    let utterance = detector.take_utterance();
    assert!(utterance.len() >= SAMPLE_RATE as usize);
    assert_eq!(detector.state(), EndpointState::Waiting);
}

#[test]
fn test_endpoint_discards_short_noise() {
    let mut detector = EndpointDetector::new();

    feed(&mut detector, &generate_sine_samples(440.0, 0.1, 0.5));
    assert!(!feed(&mut detector, &generate_silence(1.0)));
    assert_eq!(detector.state(), EndpointState::Waiting);
}

#[test]
fn test_samples_to_wav_header() {
    let samples = generate_sine_samples(440.0, 0.5, 0.3);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());
}

#[test]
fn test_language_detection_is_deterministic() {
    let detector = WhatlangDetector;
    let text = "La gravité est la force qui attire les objets vers le centre de la Terre.";

    let first = detector.detect(text).unwrap();
    assert_eq!(first, "fr");
    assert_eq!(detector.detect(text).unwrap(), first);
}

#[tokio::test]
async fn test_whisper_sends_language_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "What is gravity?"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stt = SpeechToText::new(SttProvider::Whisper, key(), "whisper-1".to_string())
        .unwrap()
        .with_base_url(server.uri());

    let wav = samples_to_wav(&generate_sine_samples(220.0, 0.2, 0.3), SAMPLE_RATE).unwrap();
    let text = stt.recognize(&AudioClip::wav(wav), "en-US").await.unwrap();

    assert_eq!(text, "What is gravity?");

    let requests = server.received_requests().await.unwrap();
    let body = &requests[0].body;
    let field = b"name=\"language\"";
    assert!(body.windows(field.len()).any(|w| w == field));
}

#[tokio::test]
async fn test_deepgram_empty_transcript_is_ambiguous() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/listen"))
        .and(query_param("language", "en-US"))
        .and(header("authorization", "Token test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": {"channels": [{"alternatives": [{"transcript": ""}]}]}
        })))
        .mount(&server)
        .await;

    let stt = SpeechToText::new(SttProvider::Deepgram, key(), "nova-2".to_string())
        .unwrap()
        .with_base_url(server.uri());

    let err = stt
        .recognize(&AudioClip::wav(vec![1, 2, 3, 4]), "en-US")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RecognitionAmbiguous));
}

#[tokio::test]
async fn test_recognition_service_down_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let stt = SpeechToText::new(SttProvider::Whisper, key(), "whisper-1".to_string())
        .unwrap()
        .with_base_url(server.uri());

    let err = stt
        .recognize(&AudioClip::wav(vec![1, 2, 3, 4]), "en-US")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RecognitionUnavailable(_)));
}

#[tokio::test]
async fn test_openai_speech_clip_is_tagged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(body_string_contains("Gravity is a force."))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF_u8, 0xFB, 0x90, 0x00]))
        .expect(1)
        .mount(&server)
        .await;

    let tts = TextToSpeech::new_openai(key(), "alloy".to_string(), 1.0, "tts-1".to_string())
        .unwrap()
        .with_base_url(server.uri());

    let clip = tts.synthesize("Gravity is a force.", "en").await.unwrap();

    assert_eq!(clip.bytes(), [0xFF_u8, 0xFB, 0x90, 0x00]);
    assert_eq!(clip.language(), Some("en"));
    assert!(!clip.is_silent());
}

#[tokio::test]
async fn test_elevenlabs_passes_language_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text-to-speech/voice-1"))
        .and(header("xi-api-key", "test-key"))
        .and(body_string_contains("\"language_code\":\"es\""))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8, 2, 3]))
        .expect(1)
        .mount(&server)
        .await;

    let tts = TextToSpeech::new_elevenlabs(
        key(),
        "voice-1".to_string(),
        "eleven_multilingual_v2".to_string(),
    )
    .unwrap()
    .with_base_url(server.uri());

    let clip = tts.synthesize("La gravedad es una fuerza.", "es-ES").await.unwrap();
    assert_eq!(clip.language(), Some("es"));
}
