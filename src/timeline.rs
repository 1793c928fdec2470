use crate::audio::resample;
use crate::error::{Result, RevoiceError};
use crate::segment::Segment;
use std::borrow::Cow;
use tracing::{debug, info, warn};

/// The composed output audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Timeline {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples covering `[start, end)` seconds, clamped to the buffer.
    pub fn region(&self, start: f64, end: f64) -> &[f32] {
        let lo = seconds_to_sample(start, self.sample_rate).min(self.samples.len());
        let hi = seconds_to_sample(end, self.sample_rate).clamp(lo, self.samples.len());
        &self.samples[lo..hi]
    }
}

fn seconds_to_sample(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).round().max(0.0) as usize
}

/// Places each segment's rendered clip at its original start time.
///
/// The buffer spans `[0, last.end]`. Clips that overlap a neighbour overwrite
/// the shared region (later segment wins); clips running past the end are
/// truncated. Amplitudes are copied as-is.
#[derive(Debug, Clone)]
pub struct TimelineCompositor {
    target_rate: u32,
}

impl TimelineCompositor {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn compose(&self, segments: &[Segment]) -> Result<Timeline> {
        let last = segments.last().ok_or(RevoiceError::EmptyTimeline)?;

        let total_samples = seconds_to_sample(last.end(), self.target_rate);
        let mut buffer = vec![0.0f32; total_samples];
        info!(
            "Composing {} segments onto {:.2}s timeline ({} samples @ {} Hz)",
            segments.len(),
            last.end(),
            total_samples,
            self.target_rate
        );

        let mut placed = 0usize;
        for segment in segments {
            let Some(clip) = &segment.rendered_audio else {
                debug!("Segment {} has no audio, leaving silence", segment.index());
                continue;
            };

            let samples: Cow<'_, [f32]> = if clip.sample_rate == self.target_rate {
                Cow::Borrowed(&clip.samples)
            } else {
                match resample(&clip.samples, clip.sample_rate, self.target_rate) {
                    Ok(resampled) => Cow::Owned(resampled),
                    Err(e) => {
                        warn!(
                            "Segment {} could not be resampled from {} Hz, leaving silence: {}",
                            segment.index(),
                            clip.sample_rate,
                            e
                        );
                        continue;
                    }
                }
            };

            let start = seconds_to_sample(segment.start(), self.target_rate);
            if start >= buffer.len() {
                warn!("Segment {} starts past the timeline end, dropped", segment.index());
                continue;
            }
            let end = (start + samples.len()).min(buffer.len());
            if start + samples.len() > end {
                debug!(
                    "Segment {} truncated by {} samples",
                    segment.index(),
                    start + samples.len() - end
                );
            }
            buffer[start..end].copy_from_slice(&samples[..end - start]);
            placed += 1;
        }

        info!("Placed {}/{} clips on the timeline", placed, segments.len());
        Ok(Timeline::from_samples(buffer, self.target_rate))
    }
}
