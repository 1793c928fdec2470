use crate::error::{Result, RevoiceError};
use crate::progress::{ProgressBand, RunContext};
use crate::segment::{preview, AudioClip, Segment};
use crate::synthesize::{Synthesizer, VoiceId};
use crate::translate::{TranslationContext, Translator};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

/// Characters of text shown in per-segment progress events.
const PREVIEW_CHARS: usize = 50;
const REASON_CHARS: usize = 80;

/// Result of applying a transform to one segment.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    /// Nothing to do (blank input); the model was not invoked.
    Skipped,
    Failed(String),
}

impl<T> StageOutcome<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

/// What a transform sees for one segment.
#[derive(Debug, Clone)]
pub struct StageRequest {
    pub index: usize,
    pub text: String,
    pub context: TranslationContext,
}

/// A single-segment transform.
#[async_trait]
pub trait SegmentTransform: Send + Sync {
    type Output: Send;

    /// Past-tense verb for progress labels ("Translated", "Synthesized").
    fn verb(&self) -> &'static str;

    async fn apply(&self, request: &StageRequest) -> Result<Self::Output>;
}

/// Tally of outcomes for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageReport {
    pub fn from_outcomes<T>(outcomes: &[StageOutcome<T>]) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                StageOutcome::Completed(_) => report.completed += 1,
                StageOutcome::Skipped => report.skipped += 1,
                StageOutcome::Failed(_) => report.failed += 1,
            }
        }
        report
    }

    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

/// Translation fallback: a failed segment keeps its own source text.
pub fn apply_translation(segment: &mut Segment, outcome: StageOutcome<String>) {
    segment.translated_text = match outcome {
        StageOutcome::Completed(text) => text,
        StageOutcome::Skipped => String::new(),
        StageOutcome::Failed(_) => segment.source_text().to_string(),
    };
}

/// Synthesis fallback: anything but a rendered clip leaves the slot silent.
pub fn apply_synthesis(segment: &mut Segment, outcome: StageOutcome<Option<AudioClip>>) {
    segment.rendered_audio = match outcome {
        StageOutcome::Completed(Some(clip)) if !clip.is_empty() => Some(clip),
        _ => None,
    };
}

pub struct TranslateStep<'a> {
    pub translator: &'a dyn Translator,
}

#[async_trait]
impl SegmentTransform for TranslateStep<'_> {
    type Output = String;

    fn verb(&self) -> &'static str {
        "Translated"
    }

    async fn apply(&self, request: &StageRequest) -> Result<String> {
        let translated = self
            .translator
            .translate(&request.text, &request.context)
            .await?;
        debug!(
            "Segment {}: '{}' -> '{}'",
            request.index,
            preview(&request.text, PREVIEW_CHARS),
            preview(&translated, PREVIEW_CHARS)
        );
        Ok(translated)
    }
}

pub struct SynthesizeStep<'a> {
    pub synthesizer: &'a dyn Synthesizer,
    pub voice: Option<&'a VoiceId>,
}

#[async_trait]
impl SegmentTransform for SynthesizeStep<'_> {
    type Output = Option<AudioClip>;

    fn verb(&self) -> &'static str {
        "Synthesized"
    }

    async fn apply(&self, request: &StageRequest) -> Result<Option<AudioClip>> {
        self.synthesizer.synthesize(&request.text, self.voice).await
    }
}

/// Runs a [`SegmentTransform`] over an ordered batch of requests.
#[derive(Debug, Clone)]
pub struct StageRunner {
    concurrency: usize,
}

impl Default for StageRunner {
    fn default() -> Self {
        Self::new(1)
    }
}

impl StageRunner {
    /// `concurrency` bounds in-flight requests; it never changes result order.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Apply `step` to every request, one outcome per request, in order.
    ///
    /// Blank texts short-circuit to [`StageOutcome::Skipped`]. Cancellation is
    /// checked before each segment and aborts the stage with
    /// [`RevoiceError::Cancelled`].
    pub async fn run<S>(
        &self,
        step: &S,
        requests: Vec<StageRequest>,
        ctx: &mut RunContext,
        band: ProgressBand,
    ) -> Result<Vec<StageOutcome<S::Output>>>
    where
        S: SegmentTransform,
    {
        let total = requests.len();
        let cancel = ctx.cancel_flag();

        let mut results = stream::iter(requests.into_iter().map(|request| {
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return (request, None);
                }
                let outcome = if request.text.trim().is_empty() {
                    StageOutcome::Skipped
                } else {
                    match step.apply(&request).await {
                        Ok(value) => StageOutcome::Completed(value),
                        Err(e) => StageOutcome::Failed(e.to_string()),
                    }
                };
                (request, Some(outcome))
            }
        }))
        .buffered(self.concurrency);

        let mut outcomes = Vec::with_capacity(total);
        while let Some((request, outcome)) = results.next().await {
            let outcome = outcome.ok_or(RevoiceError::Cancelled)?;
            let done = outcomes.len() + 1;

            let label = match &outcome {
                StageOutcome::Completed(_) => format!(
                    "{} {}/{}: {}",
                    step.verb(),
                    done,
                    total,
                    preview(&request.text, PREVIEW_CHARS)
                ),
                StageOutcome::Skipped => {
                    debug!("Segment {} has no text, skipping", request.index);
                    format!("Skipped {}/{} (no text)", done, total)
                }
                StageOutcome::Failed(reason) => {
                    warn!("Segment {} failed, using fallback: {}", request.index, reason);
                    format!(
                        "Fallback {}/{}: {} ({})",
                        done,
                        total,
                        preview(&request.text, PREVIEW_CHARS),
                        preview(reason, REASON_CHARS)
                    )
                }
            };
            ctx.report(band.at(done, total), label);
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Translate every segment in place. `context_window` neighbours on each
    /// side are passed along as context (0 disables context).
    pub async fn translate(
        &self,
        segments: &mut [Segment],
        translator: &dyn Translator,
        context_window: usize,
        ctx: &mut RunContext,
    ) -> Result<StageReport> {
        let texts: Vec<&str> = segments.iter().map(|s| s.source_text()).collect();
        let requests: Vec<StageRequest> = segments
            .iter()
            .enumerate()
            .map(|(i, s)| StageRequest {
                index: s.index(),
                text: s.source_text().to_string(),
                context: TranslationContext::around(&texts, i, context_window),
            })
            .collect();

        let step = TranslateStep { translator };
        let outcomes = self
            .run(&step, requests, ctx, ProgressBand::TRANSLATION)
            .await?;
        let report = StageReport::from_outcomes(&outcomes);

        for (segment, outcome) in segments.iter_mut().zip(outcomes) {
            apply_translation(segment, outcome);
        }
        Ok(report)
    }

    /// Synthesize every segment's translated text in place.
    pub async fn synthesize(
        &self,
        segments: &mut [Segment],
        synthesizer: &dyn Synthesizer,
        voice: Option<&VoiceId>,
        ctx: &mut RunContext,
    ) -> Result<StageReport> {
        let requests: Vec<StageRequest> = segments
            .iter()
            .map(|s| StageRequest {
                index: s.index(),
                text: s.translated_text.clone(),
                context: TranslationContext::default(),
            })
            .collect();

        let step = SynthesizeStep { synthesizer, voice };
        let outcomes = self
            .run(&step, requests, ctx, ProgressBand::SYNTHESIS)
            .await?;
        let report = StageReport::from_outcomes(&outcomes);

        for (segment, outcome) in segments.iter_mut().zip(outcomes) {
            apply_synthesis(segment, outcome);
        }
        Ok(report)
    }
}
