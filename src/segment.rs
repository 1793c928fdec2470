use crate::error::{Result, RevoiceError};
use std::time::Duration;

/// Mono PCM audio at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// An all-zero clip of the given length in seconds.
    pub fn silence(seconds: f64, sample_rate: u32) -> Self {
        let len = (seconds * sample_rate as f64).round().max(0.0) as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// One recognized span of source-language speech.
///
/// `start` and `end` are fixed at construction. Downstream stages only fill in
/// `translated_text` and `rendered_audio`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    index: usize,
    start: f64,
    end: f64,
    source_text: String,
    pub translated_text: String,
    pub rendered_audio: Option<AudioClip>,
}

impl Segment {
    /// Create a segment, rejecting non-finite, negative or empty spans.
    pub fn new(index: usize, start: f64, end: f64, source_text: impl Into<String>) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(RevoiceError::InvalidSegment(format!(
                "segment {index} has non-finite bounds ({start}, {end})"
            )));
        }
        if start < 0.0 {
            return Err(RevoiceError::InvalidSegment(format!(
                "segment {index} starts before zero ({start})"
            )));
        }
        if start >= end {
            return Err(RevoiceError::InvalidSegment(format!(
                "segment {index} must satisfy start < end, got {start:.3} >= {end:.3}"
            )));
        }

        Ok(Self {
            index,
            start,
            end,
            source_text: source_text.into(),
            translated_text: String::new(),
            rendered_audio: None,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn start_time(&self) -> Duration {
        Duration::from_secs_f64(self.start)
    }

    pub fn end_time(&self) -> Duration {
        Duration::from_secs_f64(self.end)
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// True when there is nothing to translate.
    pub fn is_blank(&self) -> bool {
        self.source_text.trim().is_empty()
    }
}

/// Short single-line preview of a text for progress messages.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let truncated: String = flat.chars().take(max_chars).collect();
    format!("{}...", truncated.trim_end())
}
