//! Integration tests for revoice
//!
//! These tests exercise the segment pipeline pieces together with in-memory
//! collaborators, without any inference server or ffmpeg.

use async_trait::async_trait;
use revoice::config::{Config, ProcessingMode, SubtitleFormat};
use revoice::error::{Result, RevoiceError};
use revoice::export::{
    create_formatter, format_translation, subtitle_entries, write_subtitles, TextSide,
};
use revoice::model::ModelHandle;
use revoice::progress::{CancelFlag, RunContext};
use revoice::reconcile::{DurationReconciler, ReconcileOutcome};
use revoice::segment::{AudioClip, Segment};
use revoice::stage::StageRunner;
use revoice::synthesize::{Synthesizer, VoiceId};
use revoice::timeline::{Timeline, TimelineCompositor};
use revoice::translate::{TranslationContext, Translator};
use std::path::Path;
use std::sync::Mutex;
use tokio_test::{assert_err, assert_ok};

const RATE: u32 = 16000;

// ============================================================================
// In-memory collaborators
// ============================================================================

struct DictionaryTranslator {
    fail_on: Vec<&'static str>,
    contexts: Mutex<Vec<TranslationContext>>,
}

impl DictionaryTranslator {
    fn new() -> Self {
        Self {
            fail_on: Vec::new(),
            contexts: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(words: &[&'static str]) -> Self {
        Self {
            fail_on: words.to_vec(),
            ..Self::new()
        }
    }
}

#[async_trait]
impl ModelHandle for DictionaryTranslator {
    fn model_name(&self) -> String {
        "dictionary".to_string()
    }

    async fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn unload(&mut self) {}

    fn is_loaded(&self) -> bool {
        true
    }
}

#[async_trait]
impl Translator for DictionaryTranslator {
    async fn translate(&self, text: &str, context: &TranslationContext) -> Result<String> {
        self.contexts.lock().unwrap().push(context.clone());
        if self.fail_on.contains(&text) {
            return Err(RevoiceError::Translation(format!("cannot translate {}", text)));
        }
        Ok(match text {
            "Привет" => "Hello",
            "Мир" => "World",
            other => other,
        }
        .to_string())
    }
}

/// Renders every text as a constant-amplitude clip of fixed length.
struct ToneSynthesizer {
    seconds: f64,
    fail_on: Vec<&'static str>,
}

#[async_trait]
impl ModelHandle for ToneSynthesizer {
    fn model_name(&self) -> String {
        "tone".to_string()
    }

    async fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn unload(&mut self) {}

    fn is_loaded(&self) -> bool {
        true
    }
}

#[async_trait]
impl Synthesizer for ToneSynthesizer {
    async fn register_voice(&mut self, _reference: &Path) -> Result<VoiceId> {
        Ok(VoiceId("tone".to_string()))
    }

    async fn synthesize(&self, text: &str, _voice: Option<&VoiceId>) -> Result<Option<AudioClip>> {
        if self.fail_on.contains(&text) {
            return Err(RevoiceError::Synthesis("vocoder exploded".to_string()));
        }
        let len = (self.seconds * RATE as f64).round() as usize;
        Ok(Some(AudioClip::new(vec![0.5; len], RATE)))
    }
}

fn greeting_segments() -> Vec<Segment> {
    vec![
        Segment::new(0, 0.0, 2.0, "Привет").unwrap(),
        Segment::new(1, 2.0, 4.0, "Мир").unwrap(),
    ]
}

async fn translate_and_synthesize(
    segments: &mut [Segment],
    translator: &DictionaryTranslator,
    synthesizer: &ToneSynthesizer,
) {
    let runner = StageRunner::new(1);
    let mut ctx = RunContext::detached();
    runner
        .translate(segments, translator, 0, &mut ctx)
        .await
        .unwrap();
    runner
        .synthesize(segments, synthesizer, None, &mut ctx)
        .await
        .unwrap();
}

// ============================================================================
// End-to-end segment scenarios
// ============================================================================

mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_two_segments_fill_timeline_without_gaps() {
        let mut segments = greeting_segments();
        let synthesizer = ToneSynthesizer {
            seconds: 2.0,
            fail_on: vec![],
        };
        translate_and_synthesize(&mut segments, &DictionaryTranslator::new(), &synthesizer).await;

        assert_eq!(segments[0].translated_text, "Hello");
        assert_eq!(segments[1].translated_text, "World");

        let timeline = TimelineCompositor::new(RATE).compose(&segments).unwrap();
        assert_eq!(timeline.len(), 4 * RATE as usize);
        assert_eq!(timeline.duration_secs(), 4.0);
        assert!(timeline.samples().iter().all(|&s| s == 0.5));
    }

    #[tokio::test]
    async fn test_failed_synthesis_leaves_silent_region() {
        let mut segments = greeting_segments();
        let synthesizer = ToneSynthesizer {
            seconds: 2.0,
            fail_on: vec!["World"],
        };
        translate_and_synthesize(&mut segments, &DictionaryTranslator::new(), &synthesizer).await;
        assert!(segments[1].rendered_audio.is_none());

        let timeline = TimelineCompositor::new(RATE).compose(&segments).unwrap();
        assert_eq!(timeline.duration_secs(), 4.0);
        assert!(timeline.region(0.0, 2.0).iter().all(|&s| s == 0.5));
        assert!(timeline.region(2.0, 4.0).iter().all(|&s| s == 0.0));
    }

    #[tokio::test]
    async fn test_failed_translation_keeps_source_text() {
        let mut segments = greeting_segments();
        let synthesizer = ToneSynthesizer {
            seconds: 1.0,
            fail_on: vec![],
        };
        let translator = DictionaryTranslator::failing_on(&["Мир"]);
        translate_and_synthesize(&mut segments, &translator, &synthesizer).await;

        assert_eq!(segments[0].translated_text, "Hello");
        assert_eq!(segments[1].translated_text, "Мир");
        // The fallback text is still voiced.
        assert!(segments[1].rendered_audio.is_some());
    }

    #[test]
    fn test_empty_sequence_is_empty_timeline() {
        let result = TimelineCompositor::new(RATE).compose(&[]);
        assert!(matches!(result, Err(RevoiceError::EmptyTimeline)));
    }
}

// ============================================================================
// StageRunner properties
// ============================================================================

mod stage_runner_tests {
    use super::*;

    fn numbered_segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment::new(i, i as f64, i as f64 + 1.0, format!("s{}", i)).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_output_length_matches_input_for_any_failure_rate() {
        let all: Vec<&'static str> = vec!["s0", "s1", "s2", "s3", "s4", "s5"];
        for fail_on in [vec![], vec!["s1", "s4"], all] {
            let mut segments = numbered_segments(6);
            let translator = DictionaryTranslator::failing_on(&fail_on);
            let mut ctx = RunContext::detached();
            let report = StageRunner::new(3)
                .translate(&mut segments, &translator, 0, &mut ctx)
                .await
                .unwrap();

            assert_eq!(report.total(), 6);
            assert_eq!(report.failed, fail_on.len());
            let indices: Vec<usize> = segments.iter().map(|s| s.index()).collect();
            assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
            // Every failure falls back to its own source text.
            for segment in &segments {
                assert_eq!(segment.translated_text, segment.source_text());
            }
        }
    }

    #[tokio::test]
    async fn test_context_window_reaches_translator() {
        let mut segments = numbered_segments(4);
        let translator = DictionaryTranslator::new();
        let mut ctx = RunContext::detached();
        StageRunner::new(1)
            .translate(&mut segments, &translator, 1, &mut ctx)
            .await
            .unwrap();

        let contexts = translator.contexts.lock().unwrap();
        assert_eq!(contexts.len(), 4);
        assert_eq!(contexts[0].before, Vec::<String>::new());
        assert_eq!(contexts[0].after, vec!["s1"]);
        assert_eq!(contexts[2].before, vec!["s1"]);
        assert_eq!(contexts[2].after, vec!["s3"]);
    }

    #[tokio::test]
    async fn test_progress_stays_within_bands_and_monotonic() {
        let mut segments = numbered_segments(5);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut ctx = RunContext::begin_run(Some(tx), CancelFlag::new());
        StageRunner::new(2)
            .translate(&mut segments, &DictionaryTranslator::new(), 0, &mut ctx)
            .await
            .unwrap();
        drop(ctx);

        let mut percents = Vec::new();
        while let Some(event) = rx.recv().await {
            percents.push(event.percent);
        }
        assert_eq!(percents.len(), 6);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percents.last().unwrap(), 65);
    }

    #[tokio::test]
    async fn test_cancel_stops_stage() {
        let mut segments = numbered_segments(3);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut ctx = RunContext::begin_run(None, cancel);
        let result = StageRunner::new(1)
            .translate(&mut segments, &DictionaryTranslator::new(), 0, &mut ctx)
            .await;
        assert!(matches!(result, Err(RevoiceError::Cancelled)));
    }
}

// ============================================================================
// DurationReconciler
// ============================================================================

mod reconcile_tests {
    use super::*;

    fn speech_like(seconds: f64) -> Timeline {
        let rate = 8000u32;
        let len = (seconds * rate as f64).round() as usize;
        let samples = (0..len)
            .map(|i| {
                let t = i as f32 / rate as f32;
                (2.0 * std::f32::consts::PI * 180.0 * t).sin() * 0.3
                    + (2.0 * std::f32::consts::PI * 360.0 * t).sin() * 0.1
            })
            .collect();
        Timeline::from_samples(samples, rate)
    }

    #[test]
    fn test_long_output_stretched_into_tolerance() {
        let reconciler = DurationReconciler::new(1.0);
        match reconciler.reconcile(&speech_like(13.0), 10.0).unwrap() {
            ReconcileOutcome::Stretched { timeline, rate } => {
                assert!((rate - 13.0 / 10.0).abs() < 1e-9);
                assert!((timeline.duration_secs() - 10.0).abs() <= 1.0);
                assert_eq!(timeline.sample_rate(), 8000);
            }
            ReconcileOutcome::Unchanged => panic!("13s against 10s must be stretched"),
        }
    }

    #[test]
    fn test_small_drift_is_left_alone() {
        let reconciler = DurationReconciler::new(1.0);
        assert_eq!(
            reconciler.reconcile(&speech_like(10.5), 10.0).unwrap(),
            ReconcileOutcome::Unchanged
        );
    }

    #[test]
    fn test_short_output_is_slowed_down() {
        let reconciler = DurationReconciler::new(1.0);
        let (timeline, report) = reconciler.reconcile_or_keep(speech_like(6.0), 9.0);
        assert!(report.applied());
        assert!((timeline.duration_secs() - 9.0).abs() <= 1.0);
    }

    #[test]
    fn test_second_pass_is_noop() {
        let reconciler = DurationReconciler::new(1.0);
        let (once, _) = reconciler.reconcile_or_keep(speech_like(13.0), 10.0);
        let (twice, report) = reconciler.reconcile_or_keep(once.clone(), 10.0);
        assert!(!report.applied());
        assert_eq!(once, twice);
    }
}

// ============================================================================
// Exports
// ============================================================================

mod export_tests {
    use super::*;

    fn translated_segments() -> Vec<Segment> {
        let mut segments = greeting_segments();
        segments[0].translated_text = "Hello".to_string();
        segments[1].translated_text = "World".to_string();
        segments
    }

    #[test]
    fn test_srt_matches_subtitle_layout() {
        let entries = subtitle_entries(&translated_segments(), TextSide::Translated);
        let output = create_formatter(SubtitleFormat::Srt).format(&entries);
        assert_eq!(
            output,
            "1\n00:00:00,000 --> 00:00:02,000\nHello\n\n2\n00:00:02,000 --> 00:00:04,000\nWorld\n"
        );
    }

    #[test]
    fn test_write_source_and_translated_subtitles() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("talk_russian.srt");
        let target = dir.path().join("talk_english.vtt");
        let segments = translated_segments();

        write_subtitles(&source, &segments, TextSide::Source, SubtitleFormat::Srt).unwrap();
        write_subtitles(&target, &segments, TextSide::Translated, SubtitleFormat::Vtt).unwrap();

        let source_text = std::fs::read_to_string(source).unwrap();
        assert!(source_text.contains("Привет"));
        let target_text = std::fs::read_to_string(target).unwrap();
        assert!(target_text.starts_with("WEBVTT"));
        assert!(target_text.contains("World"));
    }

    #[test]
    fn test_translation_listing_has_both_sides() {
        let listing = format_translation(&translated_segments());
        assert!(listing.contains("[2.00s - 4.00s]\nOriginal: Мир\nTranslation: World\n"));
    }
}

// ============================================================================
// Config
// ============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_modes_share_policy_but_not_models() {
        let fast = Config {
            mode: ProcessingMode::Fast,
            ..Config::default()
        };
        let quality = Config {
            mode: ProcessingMode::Quality,
            ..Config::default()
        };
        assert_ne!(fast.preset().asr_model, quality.preset().asr_model);
        assert_eq!(fast.duration_tolerance_secs, quality.duration_tolerance_secs);
        assert_eq!(fast.preset().context_window, 0);
        assert!(quality.preset().context_window > 0);
    }

    #[test]
    fn test_validate_rejects_unusable_policy() {
        assert_ok!(Config::default().validate());

        let no_workers = Config {
            concurrency: 0,
            ..Config::default()
        };
        assert_err!(no_workers.validate());

        let no_tolerance = Config {
            duration_tolerance_secs: 0.0,
            ..Config::default()
        };
        assert_err!(no_tolerance.validate());

        let mut no_server = Config::default();
        no_server.synthesizer.base_url = " ".to_string();
        assert_err!(no_server.validate());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(&file, "mode = \"fast\"\n\n[synthesizer]\nlanguage = \"en\"\n").unwrap();

        let config = assert_ok!(Config::load_from(&file));
        assert_eq!(config.mode, ProcessingMode::Fast);
        assert!(config.sync_duration);
        assert_eq!(config.duration_tolerance_secs, 1.0);
        assert_eq!(config.subtitle_format, SubtitleFormat::Srt);
    }
}
