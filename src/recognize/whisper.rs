use crate::error::{Result, RevoiceError};
use crate::model::ModelHandle;
use crate::recognize::{Recognition, Recognizer};
use crate::segment::Segment;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

/// Default address of a locally hosted faster-whisper server.
pub const DEFAULT_WHISPER_URL: &str = "http://127.0.0.1:8000";

/// Speech recognizer talking to an OpenAI-compatible transcription server
/// running on the local machine.
pub struct WhisperServerRecognizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    language: Option<String>,
    beam_size: u32,
    vad_filter: bool,
    compute_type: Option<String>,
    device: Option<String>,
    loaded: bool,
}

impl WhisperServerRecognizer {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            language: None,
            beam_size: 5,
            vad_filter: true,
            compute_type: None,
            device: None,
            loaded: false,
        }
    }

    /// Set the source language (ISO 639-1 code).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_beam_size(mut self, beam_size: u32) -> Self {
        self.beam_size = beam_size;
        self
    }

    pub fn with_vad_filter(mut self, vad_filter: bool) -> Self {
        self.vad_filter = vad_filter;
        self
    }

    /// Numeric precision the server should run the model at (`int8`, `float16`, ...).
    pub fn with_compute_type(mut self, compute_type: impl Into<String>) -> Self {
        self.compute_type = Some(compute_type.into());
        self
    }

    /// Pin the server to `cpu` or `cuda`; unset lets the server pick.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    async fn build_form(&self, audio_path: &Path) -> Result<Form> {
        let file_bytes = fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .text("beam_size", self.beam_size.to_string())
            .text("vad_filter", self.vad_filter.to_string());

        if let Some(ref lang) = self.language {
            form = form.text("language", lang.clone());
        }
        if let Some(ref compute_type) = self.compute_type {
            form = form.text("compute_type", compute_type.clone());
        }
        if let Some(ref device) = self.device {
            form = form.text("device", device.clone());
        }

        Ok(form)
    }

    async fn call_api(&self, form: Form) -> Result<TranscriptionResponse> {
        let url = format!("{}/v1/audio/transcriptions", self.base_url);
        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        debug!("Transcription API response status: {}", status);

        if status.is_success() {
            let body = response.text().await?;
            debug!("Transcription API response: {}", crate::segment::preview(&body, 500));
            let parsed: TranscriptionResponse = serde_json::from_str(&body)?;
            return Ok(parsed);
        }

        let error_body = response.text().await.unwrap_or_default();
        if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
            return Err(RevoiceError::Recognition(format!(
                "server error: {}",
                api_error.error.message
            )));
        }

        Err(RevoiceError::Recognition(format!(
            "server error ({}): {}",
            status, error_body
        )))
    }

    /// Convert the server response into ordered, valid segments.
    fn parse_response(&self, response: TranscriptionResponse) -> Recognition {
        let raw: Vec<ResponseSegment> = match response.segments {
            Some(segments) => segments,
            None => match response.duration {
                Some(duration) if duration > 0.0 && !response.text.trim().is_empty() => {
                    vec![ResponseSegment {
                        start: 0.0,
                        end: duration,
                        text: response.text.clone(),
                    }]
                }
                _ => Vec::new(),
            },
        };

        let mut segments = Vec::with_capacity(raw.len());
        for seg in raw {
            match Segment::new(segments.len(), seg.start, seg.end, seg.text.trim()) {
                Ok(segment) => segments.push(segment),
                Err(e) => warn!("Dropping recognized span: {}", e),
            }
        }

        let language = response
            .language
            .or_else(|| self.language.clone())
            .unwrap_or_else(|| "unknown".to_string());

        Recognition {
            segments,
            language,
            language_probability: response.language_probability,
            duration: response.duration,
        }
    }
}

#[async_trait]
impl ModelHandle for WhisperServerRecognizer {
    fn model_name(&self) -> String {
        format!("whisper:{}", self.model)
    }

    async fn load(&mut self) -> Result<()> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RevoiceError::ModelLoad {
                model: self.model_name(),
                reason: format!("recognition server unreachable at {}: {}", self.base_url, e),
            })?;

        if !response.status().is_success() {
            return Err(RevoiceError::ModelLoad {
                model: self.model_name(),
                reason: format!("recognition server returned {}", response.status()),
            });
        }

        if let Ok(models) = response.json::<ModelList>().await {
            if !models.data.iter().any(|m| m.id == self.model) {
                debug!(
                    "Model {} not listed by server, it will be loaded on first request",
                    self.model
                );
            }
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
impl Recognizer for WhisperServerRecognizer {
    async fn recognize(&self, audio: &Path) -> Result<Recognition> {
        if !self.loaded {
            return Err(RevoiceError::Recognition(format!(
                "{} is not loaded",
                self.model_name()
            )));
        }
        if !audio.exists() {
            return Err(RevoiceError::FileNotFound(audio.display().to_string()));
        }

        info!("Transcribing {} with {}", audio.display(), self.model);
        let form = self.build_form(audio).await?;
        let response = self.call_api(form).await?;
        let recognition = self.parse_response(response);

        info!(
            "Detected language: {} ({} segments)",
            recognition.language,
            recognition.segments.len()
        );
        Ok(recognition)
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<ResponseSegment>>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    language_probability: Option<f32>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ResponseSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognizer() -> WhisperServerRecognizer {
        WhisperServerRecognizer::new("http://localhost:9/", "medium").with_language("ru")
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(recognizer().base_url, "http://localhost:9");
    }

    #[test]
    fn test_parse_response_with_segments() {
        let response = TranscriptionResponse {
            text: "Привет. Как дела?".to_string(),
            segments: Some(vec![
                ResponseSegment {
                    start: 0.0,
                    end: 2.0,
                    text: " Привет.".to_string(),
                },
                ResponseSegment {
                    start: 2.5,
                    end: 4.0,
                    text: "Как дела?".to_string(),
                },
            ]),
            language: Some("ru".to_string()),
            language_probability: Some(0.98),
            duration: Some(4.0),
        };

        let recognition = recognizer().parse_response(response);
        assert_eq!(recognition.segments.len(), 2);
        assert_eq!(recognition.segments[0].source_text(), "Привет.");
        assert_eq!(recognition.segments[1].start(), 2.5);
        assert_eq!(recognition.language, "ru");
    }

    #[test]
    fn test_invalid_spans_dropped_and_reindexed() {
        let response = TranscriptionResponse {
            text: String::new(),
            segments: Some(vec![
                ResponseSegment {
                    start: 0.0,
                    end: 1.0,
                    text: "один".to_string(),
                },
                ResponseSegment {
                    start: 2.0,
                    end: 2.0,
                    text: "пусто".to_string(),
                },
                ResponseSegment {
                    start: 3.0,
                    end: 4.0,
                    text: "три".to_string(),
                },
            ]),
            language: None,
            language_probability: None,
            duration: None,
        };

        let recognition = recognizer().parse_response(response);
        let indices: Vec<usize> = recognition.segments.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(recognition.segments[1].source_text(), "три");
        assert_eq!(recognition.language, "ru");
    }

    #[test]
    fn test_parse_response_without_segments() {
        let response = TranscriptionResponse {
            text: "Привет".to_string(),
            segments: None,
            language: Some("ru".to_string()),
            language_probability: None,
            duration: Some(2.0),
        };

        let recognition = recognizer().parse_response(response);
        assert_eq!(recognition.segments.len(), 1);
        assert_eq!(recognition.segments[0].end(), 2.0);
    }

    #[tokio::test]
    async fn test_recognize_requires_load() {
        let result = recognizer().recognize(Path::new("/tmp/none.wav")).await;
        assert!(matches!(result, Err(RevoiceError::Recognition(_))));
    }
}
