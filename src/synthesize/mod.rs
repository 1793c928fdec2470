pub mod xtts;

pub use xtts::XttsSynthesizer;

use crate::error::Result;
use crate::model::ModelHandle;
use crate::segment::AudioClip;
use async_trait::async_trait;
use std::path::Path;

/// Speaker identity registered with a synthesizer for voice cloning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceId(pub String);

#[async_trait]
pub trait Synthesizer: ModelHandle {
    /// Register a reference recording to clone the voice from.
    async fn register_voice(&mut self, reference: &Path) -> Result<VoiceId>;

    /// Render `text`. `Ok(None)` means the model produced no audio.
    async fn synthesize(&self, text: &str, voice: Option<&VoiceId>) -> Result<Option<AudioClip>>;
}
