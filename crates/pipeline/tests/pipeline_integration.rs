//! Integration tests for the voice pipeline
//!
//! These tests verify the end-to-end flow: stage sequencing, retry
//! behavior, fallback dispatch, and the partial-response policy.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mandi_voice_core::{
    Error, EventSink, Language, PlatformEvent, Result, RetryConfig, ServiceKind, ServiceStatus,
    SpeechToText, SpeechSynthesizer, SynthesizedAudio, Transcription, Utterance,
};
use mandi_voice_health::{
    FallbackHandler, FallbackRequest, FallbackValue, HealthController, HealthPolicy,
};
use mandi_voice_pipeline::{
    adapters::{DemoLanguageDetector, DemoSpeechSynthesizer, DemoSpeechToText, DemoTranslator},
    PipelineConfig, ProcessOptions, Stage, StageOrigin, VoicePipeline,
};

/// Utterance of the given duration at 16kHz mono PCM16
fn utterance_ms(ms: u64, target: Language) -> Utterance {
    Utterance::new(vec![0u8; (ms * 32) as usize], 16_000, target)
}

/// Pipeline config with fast retries so tests stay quick
fn fast_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryConfig::new(3, Duration::from_millis(10)),
        ..PipelineConfig::default()
    }
}

fn health() -> (Arc<HealthController>, EventSink) {
    let events = EventSink::default();
    let controller = Arc::new(HealthController::new(HealthPolicy::default(), events.clone()));
    (controller, events)
}

/// STT that fails a configured number of times before succeeding
struct FlakyStt {
    failures_before_success: u32,
    calls: AtomicU32,
}

impl FlakyStt {
    fn new(failures_before_success: u32) -> Self {
        Self {
            failures_before_success,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SpeechToText for FlakyStt {
    async fn transcribe(
        &self,
        _audio: &[u8],
        _sample_rate: u32,
        language: Language,
    ) -> Result<Transcription> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            return Err(Error::Transient("stt backend unreachable".into()));
        }
        Ok(Transcription {
            text: "mandi bhav kya hai".into(),
            confidence: 0.85,
            language,
        })
    }

    fn model_name(&self) -> &str {
        "flaky-stt"
    }
}

/// TTS that always fails with a permanent error
struct BrokenTts;

#[async_trait]
impl SpeechSynthesizer for BrokenTts {
    async fn synthesize(&self, _text: &str, _language: Language) -> Result<SynthesizedAudio> {
        Err(Error::Service("vocoder crashed".into()))
    }

    fn model_name(&self) -> &str {
        "broken-tts"
    }
}

/// Fallback serving a cached transcript
struct CachedTranscriptFallback;

#[async_trait]
impl FallbackHandler for CachedTranscriptFallback {
    async fn invoke(&self, request: FallbackRequest) -> Result<FallbackValue> {
        match request {
            FallbackRequest::Transcribe { language, .. } => {
                Ok(FallbackValue::Transcription(Transcription {
                    text: "cached: tamatar ka bhav".into(),
                    confidence: 0.6,
                    language,
                }))
            },
            other => Err(Error::Service(format!(
                "unexpected fallback request: {:?}",
                other
            ))),
        }
    }
}

#[tokio::test]
async fn test_happy_path_with_source_hint() {
    let (health, events) = health();
    let pipeline = VoicePipeline::new(
        fast_config(),
        Arc::new(DemoLanguageDetector::default()),
        Arc::new(DemoSpeechToText),
        Arc::new(DemoTranslator),
        Arc::new(DemoSpeechSynthesizer::default()),
        health,
        events,
    );

    // 1.5s of audio, hinted Hindi, target Telugu
    let utterance = utterance_ms(1_500, Language::Telugu).with_source_hint(Language::Hindi);
    let response = pipeline
        .process(utterance, ProcessOptions::default())
        .await
        .unwrap();

    assert!(response.has_audio());
    assert!(response.latency_ms <= 8_000);
    assert_eq!(response.source_language, Language::Hindi);
    assert_eq!(response.target_language, Language::Telugu);
    for (stage, confidence) in &response.stage_confidences {
        assert!(
            *confidence >= 0.7,
            "stage {} confidence {} below 0.7",
            stage,
            confidence
        );
    }

    // Detection was skipped: only three stages actually executed
    let stats = pipeline.last_run_stats();
    let executed = stats
        .iter()
        .filter(|r| r.origin != StageOrigin::Skipped)
        .count();
    assert_eq!(executed, 3);
}

#[tokio::test]
async fn test_language_detection_used_without_hint() {
    let (health, events) = health();
    let pipeline = VoicePipeline::new(
        fast_config(),
        Arc::new(DemoLanguageDetector::new(Language::Marathi)),
        Arc::new(DemoSpeechToText),
        Arc::new(DemoTranslator),
        Arc::new(DemoSpeechSynthesizer::default()),
        health,
        events,
    );

    // 2.0s of audio, no hint, target English
    let response = pipeline
        .process(utterance_ms(2_000, Language::English), ProcessOptions::default())
        .await
        .unwrap();

    assert_eq!(response.source_language, Language::Marathi);
    assert_eq!(response.stage_latencies.len(), 4);

    let stats = pipeline.last_run_stats();
    assert_eq!(stats.len(), 4);
    assert!(stats.iter().all(|r| r.succeeded()));
}

#[tokio::test]
async fn test_transient_stt_failure_then_success() {
    let (health, events) = health();
    let stt = Arc::new(FlakyStt::new(2));
    let pipeline = VoicePipeline::new(
        fast_config(),
        Arc::new(DemoLanguageDetector::default()),
        stt.clone(),
        Arc::new(DemoTranslator),
        Arc::new(DemoSpeechSynthesizer::default()),
        health.clone(),
        events,
    );

    let utterance = utterance_ms(1_000, Language::Telugu).with_source_hint(Language::Hindi);
    let response = pipeline
        .process(utterance, ProcessOptions::default())
        .await
        .unwrap();

    assert_eq!(response.transcription, "mandi bhav kya hai");
    assert_eq!(response.attempt_count(Stage::Transcribe), Some(3));
    // The retried success nets out to a healthy service
    assert_eq!(health.status(ServiceKind::Stt), ServiceStatus::Healthy);
    assert_eq!(
        health.system_health().overall,
        mandi_voice_health::SystemStatus::Healthy
    );
}

#[tokio::test]
async fn test_stt_exhausts_retries_and_fallback_serves_cached_transcript() {
    let (health, events) = health();
    let mut event_rx = events.subscribe();
    health.register_fallback(ServiceKind::Stt, Arc::new(CachedTranscriptFallback));

    let pipeline = VoicePipeline::new(
        fast_config(),
        Arc::new(DemoLanguageDetector::default()),
        Arc::new(FlakyStt::new(u32::MAX)),
        Arc::new(DemoTranslator),
        Arc::new(DemoSpeechSynthesizer::default()),
        health.clone(),
        events,
    );

    let utterance = utterance_ms(1_000, Language::Telugu).with_source_hint(Language::Hindi);
    let response = pipeline
        .process(utterance, ProcessOptions::default())
        .await
        .unwrap();

    // The pipeline completed on the fallback output
    assert_eq!(response.transcription, "cached: tamatar ka bhav");
    assert!(response.has_audio());

    let stats = pipeline.last_run_stats();
    let transcribe = stats.iter().find(|r| r.stage == Stage::Transcribe).unwrap();
    assert_eq!(transcribe.origin, StageOrigin::Fallback);

    // One net failure was recorded: the service is degraded, not unavailable
    assert_eq!(health.status(ServiceKind::Stt), ServiceStatus::Degraded);

    let mut saw_status_change = false;
    while let Ok(event) = event_rx.try_recv() {
        if let PlatformEvent::ServiceStatusChanged { kind, old, new } = event {
            assert_eq!(kind, ServiceKind::Stt);
            assert_eq!(old, ServiceStatus::Healthy);
            assert_eq!(new, ServiceStatus::Degraded);
            saw_status_change = true;
        }
    }
    assert!(saw_status_change, "expected a ServiceStatusChanged event");
}

#[tokio::test]
async fn test_partial_response_when_synthesis_fails() {
    let (health, events) = health();
    let pipeline = VoicePipeline::new(
        fast_config(),
        Arc::new(DemoLanguageDetector::default()),
        Arc::new(DemoSpeechToText),
        Arc::new(DemoTranslator),
        Arc::new(BrokenTts),
        health,
        events,
    );

    let utterance = utterance_ms(800, Language::Telugu).with_source_hint(Language::Hindi);
    let response = pipeline
        .process(
            utterance,
            ProcessOptions::default().with_allow_partial(true),
        )
        .await
        .unwrap();

    assert!(!response.has_audio());
    assert!(!response.transcription.is_empty());
    assert!(!response.translation.is_empty());
}

#[tokio::test]
async fn test_synthesis_failure_without_partial_is_an_error() {
    let (health, events) = health();
    let pipeline = VoicePipeline::new(
        fast_config(),
        Arc::new(DemoLanguageDetector::default()),
        Arc::new(DemoSpeechToText),
        Arc::new(DemoTranslator),
        Arc::new(BrokenTts),
        health,
        events,
    );

    let utterance = utterance_ms(800, Language::Telugu).with_source_hint(Language::Hindi);
    let result = pipeline.process(utterance, ProcessOptions::default()).await;

    match result {
        Err(mandi_voice_pipeline::PipelineError::Stage { stage, .. }) => {
            assert_eq!(stage, Stage::Synthesize);
        },
        other => panic!("expected a synthesize stage error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_stage_latencies_sum_close_to_total() {
    let (health, events) = health();
    let pipeline = VoicePipeline::new(
        fast_config(),
        Arc::new(DemoLanguageDetector::default()),
        Arc::new(DemoSpeechToText),
        Arc::new(DemoTranslator),
        Arc::new(DemoSpeechSynthesizer::default()),
        health,
        events,
    );

    let response = pipeline
        .process(utterance_ms(1_000, Language::Telugu), ProcessOptions::default())
        .await
        .unwrap();

    let stage_sum: u64 = response.stage_latencies.values().sum();
    assert!(stage_sum <= response.latency_ms);
    // Orchestration overhead stays under 100ms
    assert!(response.latency_ms - stage_sum < 100);
}
