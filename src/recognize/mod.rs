pub mod whisper;

pub use whisper::WhisperServerRecognizer;

use crate::error::Result;
use crate::model::ModelHandle;
use crate::segment::Segment;
use async_trait::async_trait;
use std::path::Path;

/// Ordered segments plus detected-language metadata.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub segments: Vec<Segment>,
    pub language: String,
    pub language_probability: Option<f32>,
    /// Audio duration reported by the recognizer, in seconds.
    pub duration: Option<f64>,
}

impl Recognition {
    /// All source texts joined into one transcript.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.source_text().trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
pub trait Recognizer: ModelHandle {
    async fn recognize(&self, audio: &Path) -> Result<Recognition>;
}
