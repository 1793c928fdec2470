use crate::audio::{wav_duration, write_wav, FfmpegTools, MediaKind, MediaTools};
use crate::config::{Config, Device, ModePreset};
use crate::error::{Result, RevoiceError};
use crate::export::{
    format_transcript, format_translation, write_subtitles, write_text, OutputPaths, TextSide,
};
use crate::model::Loaded;
use crate::progress::{ProgressEvent, RunContext, RunStage};
use crate::recognize::{Recognizer, WhisperServerRecognizer};
use crate::reconcile::{DurationReconciler, ReconcileReport};
use crate::segment::Segment;
use crate::stage::{StageReport, StageRunner};
use crate::synthesize::{Synthesizer, XttsSynthesizer};
use crate::timeline::TimelineCompositor;
use crate::translate::{ChatTranslator, Translator};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The external capabilities a run drives.
pub struct Collaborators {
    pub media: Box<dyn MediaTools>,
    pub recognizer: Box<dyn Recognizer>,
    pub translator: Box<dyn Translator>,
    pub synthesizer: Box<dyn Synthesizer>,
}

impl Collaborators {
    /// Local inference servers and ffmpeg, configured for the selected mode.
    pub fn from_config(config: &Config) -> Self {
        let preset = config.preset();

        let media = FfmpegTools::new()
            .with_sample_rate(config.sample_rate)
            .with_audio_codec(&config.video.audio_codec, &config.video.audio_bitrate);

        let recognizer =
            WhisperServerRecognizer::new(&config.recognizer.base_url, &preset.asr_model)
                .with_language(&config.recognizer.language)
                .with_beam_size(config.recognizer.beam_size)
                .with_vad_filter(config.recognizer.vad_filter)
                .with_compute_type(&preset.compute_type);
        let recognizer = match config.device {
            Device::Auto => recognizer,
            device => recognizer.with_device(device.to_string()),
        };

        let translator =
            ChatTranslator::new(&config.translator.base_url, &preset.translation_model)
                .with_languages(&config.translator.source_lang, &config.translator.target_lang)
                .with_temperature(config.translator.temperature)
                .with_max_tokens(config.translator.max_tokens);

        let synthesizer = XttsSynthesizer::new(&config.synthesizer.base_url)
            .with_language(&config.synthesizer.language)
            .with_default_speaker(&config.synthesizer.default_speaker);

        Self {
            media: Box::new(media),
            recognizer: Box::new(recognizer),
            translator: Box::new(translator),
            synthesizer: Box::new(synthesizer),
        }
    }
}

/// What to process.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input: PathBuf,
}

impl RunRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Statistics from one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_time: Duration,
    pub extraction_time: Duration,
    pub recognition_time: Duration,
    pub translation_time: Duration,
    pub synthesis_time: Duration,
    pub composition_time: Duration,
    /// Duration of the extracted source audio, in seconds.
    pub source_duration: f64,
    /// Duration of the final translated audio, in seconds.
    pub output_duration: f64,
    pub segments: usize,
    pub translation: StageReport,
    pub synthesis: StageReport,
    /// `None` when duration sync was disabled.
    pub reconcile: Option<ReconcileReport>,
    pub mode: String,
}

#[derive(Debug)]
pub struct PipelineResult {
    /// The dubbed video, or the translated audio for audio inputs.
    pub output_path: PathBuf,
    pub paths: OutputPaths,
    pub segments: Vec<Segment>,
    pub detected_language: String,
    pub stats: PipelineStats,
}

/// A stage-fatal error, naming the stage it happened in.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} failed: {message}")]
pub struct PipelineFailure {
    pub stage: RunStage,
    pub message: String,
}

/// How a run ended, plus every event it logged.
#[derive(Debug)]
pub struct RunOutcome {
    pub result: std::result::Result<PipelineResult, PipelineFailure>,
    pub log: Vec<ProgressEvent>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct PipelineOrchestrator {
    config: Config,
    collaborators: Collaborators,
}

impl PipelineOrchestrator {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    pub fn from_config(config: Config) -> Self {
        let collaborators = Collaborators::from_config(&config);
        Self::new(config, collaborators)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline once. Models are released on every exit path.
    pub async fn run(&mut self, request: &RunRequest, mut ctx: RunContext) -> RunOutcome {
        let result = match self.execute(request, &mut ctx).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let failure = PipelineFailure {
                    stage: ctx.stage(),
                    message: e.to_string(),
                };
                ctx.fail(failure.to_string());
                Err(failure)
            }
        };
        RunOutcome {
            result,
            log: ctx.end_run(),
        }
    }

    async fn execute(&mut self, request: &RunRequest, ctx: &mut RunContext) -> Result<PipelineResult> {
        let start_time = Instant::now();
        let preset = self.config.preset();
        log_preset(&self.config, &preset);

        let runner = StageRunner::new(self.config.concurrency);
        let input = request.input.as_path();

        // ═══════════════════════════════════════════════════════════════════
        // Stage 1: Audio Extraction
        // ═══════════════════════════════════════════════════════════════════
        ctx.enter(RunStage::Extracting, "Extracting audio...")?;
        let extraction_start = Instant::now();

        if !input.exists() {
            return Err(RevoiceError::FileNotFound(input.display().to_string()));
        }
        let kind = MediaKind::from_path(input)?;
        let paths = OutputPaths::new(
            &self.config.output_dir,
            input,
            self.config.subtitle_format,
            kind,
        );
        std::fs::create_dir_all(&self.config.output_dir)?;

        let work_dir = TempDir::new()?;
        let audio_path = work_dir.path().join("source.wav");
        debug!("Using temp directory: {:?}", work_dir.path());

        if kind.is_video() {
            self.collaborators.media.extract_audio(input, &audio_path).await?;
        } else {
            self.collaborators.media.convert_audio(input, &audio_path).await?;
        }
        let source_duration = wav_duration(&audio_path)?;
        let extraction_time = extraction_start.elapsed();
        info!(
            "Audio extraction complete: {:.1}s duration in {:.2}s",
            source_duration,
            extraction_time.as_secs_f64()
        );
        ctx.checkpoint()?;

        // ═══════════════════════════════════════════════════════════════════
        // Stage 2: Speech Recognition
        // ═══════════════════════════════════════════════════════════════════
        ctx.enter(RunStage::Recognizing, "Transcribing audio...")?;
        let recognition_start = Instant::now();
        let recognition = {
            let recognizer = Loaded::acquire(&mut *self.collaborators.recognizer).await?;
            recognizer.recognize(&audio_path).await?
        };
        let recognition_time = recognition_start.elapsed();
        let detected_language = recognition.language.clone();
        let mut segments = recognition.segments;
        ctx.report(
            40,
            format!(
                "Transcribed {} segments (language: {})",
                segments.len(),
                detected_language
            ),
        );

        write_text(&paths.transcription, &format_transcript(&segments))?;
        write_subtitles(
            &paths.source_subtitles,
            &segments,
            TextSide::Source,
            self.config.subtitle_format,
        )?;
        ctx.checkpoint()?;

        // ═══════════════════════════════════════════════════════════════════
        // Stage 3: Translation
        // ═══════════════════════════════════════════════════════════════════
        ctx.enter(RunStage::Translating, "Translating segments...")?;
        let translation_start = Instant::now();
        let translation_report = {
            let translator = Loaded::acquire(&mut *self.collaborators.translator).await?;
            runner
                .translate(&mut segments, &*translator, preset.context_window, ctx)
                .await?
        };
        let translation_time = translation_start.elapsed();
        info!(
            "Translation complete: {} translated, {} skipped, {} fallbacks in {:.2}s",
            translation_report.completed,
            translation_report.skipped,
            translation_report.failed,
            translation_time.as_secs_f64()
        );

        write_text(&paths.translation, &format_translation(&segments))?;
        write_subtitles(
            &paths.translated_subtitles,
            &segments,
            TextSide::Translated,
            self.config.subtitle_format,
        )?;
        ctx.checkpoint()?;

        // ═══════════════════════════════════════════════════════════════════
        // Stage 4: Speech Synthesis
        // ═══════════════════════════════════════════════════════════════════
        ctx.enter(RunStage::Synthesizing, "Synthesizing speech...")?;
        let synthesis_start = Instant::now();
        let synthesis_report = {
            let mut synthesizer = Loaded::acquire(&mut *self.collaborators.synthesizer).await?;
            let voice = match &self.config.synthesizer.voice_reference {
                Some(reference) => match synthesizer.register_voice(reference).await {
                    Ok(voice) => Some(voice),
                    Err(e) => {
                        warn!("Voice cloning unavailable, using default voice: {}", e);
                        None
                    }
                },
                None => None,
            };
            runner
                .synthesize(&mut segments, &*synthesizer, voice.as_ref(), ctx)
                .await?
        };
        let synthesis_time = synthesis_start.elapsed();
        info!(
            "Synthesis complete: {} clips, {} skipped, {} silent fallbacks in {:.2}s",
            synthesis_report.completed,
            synthesis_report.skipped,
            synthesis_report.failed,
            synthesis_time.as_secs_f64()
        );
        ctx.checkpoint()?;

        // ═══════════════════════════════════════════════════════════════════
        // Stage 5: Composition and duration sync
        // ═══════════════════════════════════════════════════════════════════
        ctx.enter(RunStage::Composing, "Combining audio segments...")?;
        let composition_start = Instant::now();
        let compositor = TimelineCompositor::new(self.config.sample_rate);
        let mut timeline = compositor.compose(&segments)?;
        ctx.checkpoint()?;

        let reconcile = if self.config.sync_duration {
            ctx.enter(RunStage::Reconciling, "Adjusting duration...")?;
            let reconciler = DurationReconciler::new(self.config.duration_tolerance_secs);
            let (adjusted, report) = reconciler.reconcile_or_keep(timeline, source_duration);
            timeline = adjusted;
            Some(report)
        } else {
            None
        };
        let composition_time = composition_start.elapsed();
        ctx.checkpoint()?;

        // ═══════════════════════════════════════════════════════════════════
        // Stage 6: Export
        // ═══════════════════════════════════════════════════════════════════
        ctx.enter(RunStage::Exporting, "Creating final output...")?;
        write_wav(
            &paths.translated_audio,
            timeline.samples(),
            timeline.sample_rate(),
        )?;

        if kind.is_video() {
            self.collaborators
                .media
                .mux(input, &paths.translated_audio, &paths.final_output)
                .await?;
            match self.collaborators.media.probe_duration(&paths.final_output).await {
                Ok(d) => debug!("Muxed video runs {:.2}s", d.as_secs_f64()),
                Err(e) => warn!("Could not probe muxed video: {}", e),
            }
        } else {
            std::fs::copy(&paths.translated_audio, &paths.final_output).map_err(|e| {
                RevoiceError::Export(format!("{}: {}", paths.final_output.display(), e))
            })?;
        }

        let output_duration = timeline.duration_secs();
        ctx.enter(RunStage::Succeeded, "Processing complete!")?;

        let stats = PipelineStats {
            total_time: start_time.elapsed(),
            extraction_time,
            recognition_time,
            translation_time,
            synthesis_time,
            composition_time,
            source_duration,
            output_duration,
            segments: segments.len(),
            translation: translation_report,
            synthesis: synthesis_report,
            reconcile,
            mode: self.config.mode.to_string(),
        };

        Ok(PipelineResult {
            output_path: paths.final_output.clone(),
            paths,
            segments,
            detected_language,
            stats,
        })
    }
}

fn log_preset(config: &Config, preset: &ModePreset) {
    info!(
        "Mode: {} (ASR {}, compute {}, translator {}, context window {}, device {})",
        config.mode,
        preset.asr_model,
        preset.compute_type,
        preset.translation_model,
        preset.context_window,
        config.device
    );
}

/// Print a summary of the pipeline results.
pub fn print_summary(result: &PipelineResult) {
    let stats = &result.stats;
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                     Translation Complete                       ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:     {}", result.output_path.display());
    println!("  Segments:   {}", stats.segments);
    println!("  Mode:       {}", stats.mode);
    println!("  Language:   {}", result.detected_language);
    println!(
        "  Duration:   {:.1}s source, {:.1}s translated",
        stats.source_duration, stats.output_duration
    );
    if stats.translation.failed > 0 || stats.synthesis.failed > 0 {
        println!(
            "  Fallbacks:  {} translation, {} synthesis",
            stats.translation.failed, stats.synthesis.failed
        );
    }
    if let Some(report) = &stats.reconcile {
        match (report.rate, &report.error) {
            (Some(rate), _) => println!("  Sync:       stretched by rate {:.3}", rate),
            (None, Some(error)) => println!("  Sync:       skipped ({})", error),
            (None, None) => println!("  Sync:       within tolerance"),
        }
    }
    println!();
    println!("  Timing:");
    println!("    Extract:     {:.2}s", stats.extraction_time.as_secs_f64());
    println!("    Transcribe:  {:.2}s", stats.recognition_time.as_secs_f64());
    println!("    Translate:   {:.2}s", stats.translation_time.as_secs_f64());
    println!("    Synthesize:  {:.2}s", stats.synthesis_time.as_secs_f64());
    println!("    Compose:     {:.2}s", stats.composition_time.as_secs_f64());
    println!("    Total:       {:.2}s", stats.total_time.as_secs_f64());
    println!();
    println!("  Files:");
    for path in [
        &result.paths.transcription,
        &result.paths.source_subtitles,
        &result.paths.translation,
        &result.paths.translated_subtitles,
        &result.paths.translated_audio,
    ] {
        println!("    {}", display_name(path));
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
