//! Voice pipeline orchestrator
//!
//! Pipeline: audio -> detect language -> transcribe -> translate ->
//! synthesize. Stages run strictly sequentially for one utterance; distinct
//! utterances interleave freely. Each executed stage is wrapped in the
//! retry engine (transient errors only) and the health controller's
//! fallback dispatch, with an effective timeout of 1.5x its latency budget.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use mandi_voice_config::PipelineSettings;
use mandi_voice_core::{
    retry_if, Detection, Error, EventSink, Language, LanguageDetector, PlatformEvent, Result,
    RetryConfig, SpeechSynthesizer, SpeechToText, SynthesizedAudio, Transcription, Translation,
    Translator, Utterance,
};
use mandi_voice_health::{FallbackRequest, FallbackValue, HealthController, Outcome};

use crate::error::PipelineError;
use crate::stage::{Stage, StageOrigin, StageRecord, VoiceResponse};

/// Per-stage latency budgets (design targets)
#[derive(Debug, Clone)]
pub struct StageBudgets {
    pub detect: Duration,
    pub transcribe: Duration,
    pub translate: Duration,
    pub synthesize: Duration,
}

impl Default for StageBudgets {
    fn default() -> Self {
        Self {
            detect: Duration::from_millis(2_000),
            transcribe: Duration::from_millis(3_000),
            translate: Duration::from_millis(2_000),
            synthesize: Duration::from_millis(2_000),
        }
    }
}

impl StageBudgets {
    pub fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::DetectLanguage => self.detect,
            Stage::Transcribe => self.transcribe,
            Stage::Translate => self.translate,
            Stage::Synthesize => self.synthesize,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-stage retry policy
    pub retry: RetryConfig,
    /// Per-stage latency budgets
    pub budgets: StageBudgets,
    /// End-to-end latency budget
    pub total_budget: Duration,
    /// Stage timeout = budget x this factor; elapse counts as transient
    pub timeout_factor: f64,
    /// Default for responses without audio when only synthesis failed
    pub allow_partial: bool,
    /// Source language assumed when detection is disabled and no hint given
    pub fallback_source: Language,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::new(3, Duration::from_millis(500)),
            budgets: StageBudgets::default(),
            total_budget: Duration::from_millis(8_000),
            timeout_factor: 1.5,
            allow_partial: false,
            fallback_source: Language::Hindi,
        }
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            retry: RetryConfig::new(
                settings.max_attempts,
                Duration::from_millis(settings.base_delay_ms),
            ),
            budgets: StageBudgets {
                detect: Duration::from_millis(settings.detect_budget_ms),
                transcribe: Duration::from_millis(settings.transcribe_budget_ms),
                translate: Duration::from_millis(settings.translate_budget_ms),
                synthesize: Duration::from_millis(settings.synthesize_budget_ms),
            },
            total_budget: Duration::from_millis(settings.total_budget_ms),
            timeout_factor: 1.5,
            allow_partial: settings.allow_partial,
            fallback_source: settings.fallback_source,
        }
    }
}

/// Per-call processing options
#[derive(Clone)]
pub struct ProcessOptions {
    /// Override the configured partial-response policy for this call
    pub allow_partial: Option<bool>,
    /// Run language detection when no source hint is present
    pub auto_detect: bool,
    /// Caller's cancellation signal
    pub cancel: CancellationToken,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            allow_partial: None,
            auto_detect: true,
            cancel: CancellationToken::new(),
        }
    }
}

impl ProcessOptions {
    pub fn with_allow_partial(mut self, allow_partial: bool) -> Self {
        self.allow_partial = Some(allow_partial);
        self
    }

    pub fn with_auto_detect(mut self, auto_detect: bool) -> Self {
        self.auto_detect = auto_detect;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Voice pipeline orchestrator
pub struct VoicePipeline {
    config: PipelineConfig,
    detector: Arc<dyn LanguageDetector>,
    stt: Arc<dyn SpeechToText>,
    translator: Arc<dyn Translator>,
    tts: Arc<dyn SpeechSynthesizer>,
    health: Arc<HealthController>,
    events: EventSink,
    /// Stage records of the most recent run, for diagnostics
    last_run: Mutex<Vec<StageRecord>>,
}

impl VoicePipeline {
    pub fn new(
        config: PipelineConfig,
        detector: Arc<dyn LanguageDetector>,
        stt: Arc<dyn SpeechToText>,
        translator: Arc<dyn Translator>,
        tts: Arc<dyn SpeechSynthesizer>,
        health: Arc<HealthController>,
        events: EventSink,
    ) -> Self {
        tracing::info!(
            detector = detector.model_name(),
            stt = stt.model_name(),
            translator = translator.model_name(),
            tts = tts.model_name(),
            "created voice pipeline"
        );
        Self {
            config,
            detector,
            stt,
            translator,
            tts,
            health,
            events,
            last_run: Mutex::new(Vec::new()),
        }
    }

    /// Pipeline wired with the deterministic demo adapters
    pub fn demo(health: Arc<HealthController>, events: EventSink) -> Self {
        use crate::adapters::{
            DemoLanguageDetector, DemoSpeechSynthesizer, DemoSpeechToText, DemoTranslator,
        };
        Self::new(
            PipelineConfig::default(),
            Arc::new(DemoLanguageDetector::default()),
            Arc::new(DemoSpeechToText),
            Arc::new(DemoTranslator),
            Arc::new(DemoSpeechSynthesizer::default()),
            health,
            events,
        )
    }

    /// Stage records from the most recent `process` call
    pub fn last_run_stats(&self) -> Vec<StageRecord> {
        self.last_run.lock().clone()
    }

    /// Process one utterance end to end.
    ///
    /// Returns a [`VoiceResponse`] when all stages succeed, or when
    /// `allow_partial` is set and only synthesis failed (the response then
    /// carries an empty audio buffer).
    pub async fn process(
        &self,
        utterance: Utterance,
        opts: ProcessOptions,
    ) -> std::result::Result<VoiceResponse, PipelineError> {
        let pipeline_start = Instant::now();
        let allow_partial = opts.allow_partial.unwrap_or(self.config.allow_partial);
        let cancel = opts.cancel;

        // Validation failures surface before any stage runs and never touch
        // health accounting.
        if utterance.is_empty() {
            return Err(PipelineError::Validation("audio buffer is empty".into()));
        }
        if utterance.sample_rate == 0 {
            return Err(PipelineError::Validation("sample rate must be non-zero".into()));
        }

        metrics::counter!("pipeline_utterances_total").increment(1);
        tracing::info!(
            target_language = %utterance.target,
            audio_ms = utterance.duration_ms(),
            allow_partial,
            "starting voice translation pipeline"
        );

        let mut records: Vec<StageRecord> = Vec::with_capacity(4);

        // Stage 1: language detection, skipped when the caller knows the source
        let source = if let Some(hint) = utterance.source_hint {
            tracing::info!(source = %hint, "using provided source language");
            records.push(StageRecord::skipped(Stage::DetectLanguage, 1.0));
            hint
        } else if !opts.auto_detect {
            let fallback = self.config.fallback_source;
            tracing::info!(source = %fallback, "detection disabled, using fallback source language");
            records.push(StageRecord::skipped(Stage::DetectLanguage, 1.0));
            fallback
        } else {
            let audio = Arc::clone(&utterance.audio);
            let sample_rate = utterance.sample_rate;
            let (result, record) = self
                .run_stage(
                    Stage::DetectLanguage,
                    &cancel,
                    FallbackRequest::DetectLanguage {
                        audio: Arc::clone(&audio),
                        sample_rate,
                    },
                    |d: &Detection| Some(d.confidence),
                    || {
                        let detector = Arc::clone(&self.detector);
                        let audio = Arc::clone(&audio);
                        async move { detector.detect(&audio, sample_rate).await }
                    },
                )
                .await;
            records.push(record);
            match result {
                Ok(detection) => {
                    tracing::info!(
                        source = %detection.language,
                        confidence = detection.confidence,
                        "language detected"
                    );
                    detection.language
                },
                Err(e) => return self.fail(Stage::DetectLanguage, e, records),
            }
        };

        // Stage 2: speech to text
        let transcription = {
            let audio = Arc::clone(&utterance.audio);
            let sample_rate = utterance.sample_rate;
            let (result, record) = self
                .run_stage(
                    Stage::Transcribe,
                    &cancel,
                    FallbackRequest::Transcribe {
                        audio: Arc::clone(&audio),
                        sample_rate,
                        language: source,
                    },
                    |t: &Transcription| Some(t.confidence),
                    || {
                        let stt = Arc::clone(&self.stt);
                        let audio = Arc::clone(&audio);
                        async move { stt.transcribe(&audio, sample_rate, source).await }
                    },
                )
                .await;
            records.push(record);
            match result {
                Ok(transcription) => {
                    tracing::info!(
                        text = %transcription.text,
                        confidence = transcription.confidence,
                        "transcription complete"
                    );
                    transcription
                },
                Err(e) => return self.fail(Stage::Transcribe, e, records),
            }
        };

        // Stage 3: translation, a no-op when both sides speak the same language
        let translation_text = if source == utterance.target {
            tracing::info!("source and target languages match, skipping translation");
            records.push(StageRecord::skipped(Stage::Translate, 1.0));
            transcription.text.clone()
        } else {
            let text = transcription.text.clone();
            let target = utterance.target;
            let (result, record) = self
                .run_stage(
                    Stage::Translate,
                    &cancel,
                    FallbackRequest::Translate {
                        text: text.clone(),
                        source,
                        target,
                    },
                    |t: &Translation| Some(t.confidence),
                    || {
                        let translator = Arc::clone(&self.translator);
                        let text = text.clone();
                        async move { translator.translate(&text, source, target).await }
                    },
                )
                .await;
            records.push(record);
            match result {
                Ok(translation) => {
                    tracing::info!(
                        text = %translation.text,
                        confidence = translation.confidence,
                        "translation complete"
                    );
                    translation.text
                },
                Err(e) => return self.fail(Stage::Translate, e, records),
            }
        };

        // Stage 4: speech synthesis; the only stage a partial response survives
        let audio_out = {
            let text = translation_text.clone();
            let target = utterance.target;
            let (result, record) = self
                .run_stage(
                    Stage::Synthesize,
                    &cancel,
                    FallbackRequest::Synthesize {
                        text: text.clone(),
                        language: target,
                    },
                    |_: &SynthesizedAudio| None,
                    || {
                        let tts = Arc::clone(&self.tts);
                        let text = text.clone();
                        async move { tts.synthesize(&text, target).await }
                    },
                )
                .await;
            records.push(record);
            match result {
                Ok(synthesized) => {
                    tracing::info!(
                        duration_secs = synthesized.duration_secs,
                        "speech synthesized"
                    );
                    synthesized.audio
                },
                Err(e) if e.is_cancelled() => {
                    return self.fail(Stage::Synthesize, e, records);
                },
                Err(e) if allow_partial => {
                    tracing::warn!(
                        error = %e,
                        "synthesis failed, returning partial response without audio"
                    );
                    Vec::new()
                },
                Err(e) => return self.fail(Stage::Synthesize, e, records),
            }
        };

        let total_ms = pipeline_start.elapsed().as_millis() as u64;
        let budget_ms = self.config.total_budget.as_millis() as u64;
        if total_ms > budget_ms {
            tracing::warn!(total_ms, budget_ms, "pipeline exceeded latency budget");
            self.events.emit(PlatformEvent::LatencyAlert {
                scope: "pipeline_total".into(),
                measured_ms: total_ms,
                threshold_ms: budget_ms,
            });
        }

        metrics::histogram!("pipeline_latency_ms").record(total_ms as f64);
        tracing::info!(total_ms, "pipeline complete");

        let mut stage_latencies = HashMap::new();
        let mut stage_confidences = HashMap::new();
        let mut stage_attempts = HashMap::new();
        for record in &records {
            stage_latencies.insert(record.stage, record.duration_ms);
            if let Some(confidence) = record.confidence {
                stage_confidences.insert(record.stage, confidence);
            }
            stage_attempts.insert(record.stage, record.attempts);
        }
        *self.last_run.lock() = records;

        Ok(VoiceResponse {
            audio: audio_out,
            transcription: transcription.text,
            translation: translation_text,
            source_language: source,
            target_language: utterance.target,
            latency_ms: total_ms,
            stage_latencies,
            stage_confidences,
            stage_attempts,
        })
    }

    /// Run one stage under retry, timeout, and fallback dispatch.
    ///
    /// Returns the stage value together with its record; on failure the
    /// record carries the error string.
    async fn run_stage<T, F, Fut>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        request: FallbackRequest,
        confidence_of: impl Fn(&T) -> Option<f32>,
        op: F,
    ) -> (Result<T>, StageRecord)
    where
        T: TryFrom<FallbackValue, Error = Error>,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let attempts = AtomicU32::new(0);
        let timeout = self
            .config
            .budgets
            .for_stage(stage)
            .mul_f64(self.config.timeout_factor);

        let result = self
            .health
            .execute_with_fallback(
                stage.service_kind(),
                || {
                    retry_if(
                        &self.config.retry,
                        cancel,
                        || {
                            attempts.fetch_add(1, Ordering::SeqCst);
                            let fut = op();
                            async move {
                                match tokio::time::timeout(timeout, fut).await {
                                    Ok(result) => result,
                                    Err(_) => Err(Error::Timeout(timeout)),
                                }
                            }
                        },
                        Error::is_transient,
                    )
                },
                request,
            )
            .await;

        let attempts = attempts.load(Ordering::SeqCst);
        let finish = |confidence: Option<f32>, origin: StageOrigin, error: Option<String>| {
            StageRecord {
                stage,
                started_at,
                ended_at: chrono::Utc::now(),
                duration_ms: start.elapsed().as_millis() as u64,
                attempts,
                confidence,
                origin,
                error,
            }
        };

        match result {
            Ok(Outcome::Primary(value)) => {
                let record = finish(confidence_of(&value), StageOrigin::Primary, None);
                (Ok(value), record)
            },
            Ok(Outcome::Fallback(raw)) => match T::try_from(raw) {
                Ok(value) => {
                    let record = finish(confidence_of(&value), StageOrigin::Fallback, None);
                    (Ok(value), record)
                },
                Err(e) => {
                    let record = finish(None, StageOrigin::Fallback, Some(e.to_string()));
                    (Err(e), record)
                },
            },
            Err(e) => {
                if !e.is_cancelled() {
                    metrics::counter!("pipeline_stage_failures_total", "stage" => stage.as_str())
                        .increment(1);
                }
                let record = finish(None, StageOrigin::Primary, Some(e.to_string()));
                (Err(e), record)
            },
        }
    }

    fn fail<T>(
        &self,
        stage: Stage,
        error: Error,
        records: Vec<StageRecord>,
    ) -> std::result::Result<T, PipelineError> {
        *self.last_run.lock() = records;
        if !error.is_cancelled() {
            tracing::error!(stage = %stage, error = %error, "pipeline failed");
        }
        Err(PipelineError::from_stage(stage, error))
    }
}
