use crate::audio::decode_wav_bytes;
use crate::error::{Result, RevoiceError};
use crate::model::ModelHandle;
use crate::segment::AudioClip;
use crate::synthesize::{Synthesizer, VoiceId};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

pub const DEFAULT_TTS_URL: &str = "http://127.0.0.1:8020";

pub struct XttsSynthesizer {
    client: Client,
    base_url: String,
    language: String,
    default_speaker: String,
    loaded: bool,
}

impl XttsSynthesizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: "en".to_string(),
            default_speaker: "female".to_string(),
            loaded: false,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Built-in speaker used when no reference voice was registered.
    pub fn with_default_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.default_speaker = speaker.into();
        self
    }
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    speaker_wav: &'a str,
    language: &'a str,
}

#[async_trait]
impl ModelHandle for XttsSynthesizer {
    fn model_name(&self) -> String {
        "xtts_v2".to_string()
    }

    async fn load(&mut self) -> Result<()> {
        let url = format!("{}/speakers_list", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RevoiceError::ModelLoad {
                model: self.model_name(),
                reason: format!("synthesis server unreachable at {}: {}", self.base_url, e),
            })?;

        if !response.status().is_success() {
            return Err(RevoiceError::ModelLoad {
                model: self.model_name(),
                reason: format!("synthesis server returned {}", response.status()),
            });
        }

        self.loaded = true;
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = false;
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

#[async_trait]
impl Synthesizer for XttsSynthesizer {
    async fn register_voice(&mut self, reference: &Path) -> Result<VoiceId> {
        if !reference.exists() {
            return Err(RevoiceError::FileNotFound(format!(
                "speaker reference audio not found: {}",
                reference.display()
            )));
        }

        let file_name = reference
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("speaker.wav")
            .to_string();
        let bytes = fs::read(reference).await?;
        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("audio/wav")?;
        let form = Form::new().part("wavFile", part);

        let url = format!("{}/upload_sample", self.base_url);
        let response = self.client.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RevoiceError::Synthesis(format!(
                "voice upload failed ({}): {}",
                status, body
            )));
        }

        // The server addresses uploaded samples by file stem.
        let voice = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or(file_name);
        info!("Speaker reference registered as '{}'", voice);
        Ok(VoiceId(voice))
    }

    async fn synthesize(&self, text: &str, voice: Option<&VoiceId>) -> Result<Option<AudioClip>> {
        if !self.loaded {
            return Err(RevoiceError::Synthesis(format!(
                "{} is not loaded",
                self.model_name()
            )));
        }
        if text.trim().is_empty() {
            return Ok(None);
        }

        let speaker = match voice {
            Some(id) => id.0.as_str(),
            None => {
                debug!("No speaker reference, using default voice");
                self.default_speaker.as_str()
            }
        };
        let request = TtsRequest {
            text: text.trim(),
            speaker_wav: speaker,
            language: &self.language,
        };

        let url = format!("{}/tts_to_audio/", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RevoiceError::Synthesis(format!(
                "server error ({}): {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            warn!("Synthesis server returned no audio");
            return Ok(None);
        }

        let clip = decode_wav_bytes(&bytes)?;
        if clip.is_empty() {
            return Ok(None);
        }
        debug!(
            "Synthesized {:.2}s of audio at {} Hz",
            clip.duration_secs(),
            clip.sample_rate
        );
        Ok(Some(clip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_missing_reference() {
        let mut synth = XttsSynthesizer::new("http://localhost:1");
        let result = synth.register_voice(Path::new("/nonexistent/voice.wav")).await;
        assert!(matches!(result, Err(RevoiceError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_synthesize_requires_load() {
        let synth = XttsSynthesizer::new("http://localhost:1");
        assert!(synth.synthesize("hello", None).await.is_err());
    }

    #[tokio::test]
    async fn test_blank_text_is_absent_audio() {
        let mut synth = XttsSynthesizer::new("http://localhost:1");
        synth.loaded = true;
        assert!(synth.synthesize("  ", None).await.unwrap().is_none());
    }
}
