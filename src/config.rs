use crate::error::{Result, RevoiceError};
use crate::recognize::whisper::DEFAULT_WHISPER_URL;
use crate::synthesize::xtts::DEFAULT_TTS_URL;
use crate::translate::chat::DEFAULT_TRANSLATOR_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    Fast,
    #[default]
    Quality,
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingMode::Fast => write!(f, "fast"),
            ProcessingMode::Quality => write!(f, "quality"),
        }
    }
}

impl std::str::FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(ProcessingMode::Fast),
            "quality" => Ok(ProcessingMode::Quality),
            _ => Err(format!("Unknown mode: {}. Use 'fast' or 'quality'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

impl std::str::FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            _ => Err(format!("Unknown device: {}. Use 'auto', 'cpu' or 'cuda'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Vtt,
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "vtt" => Ok(SubtitleFormat::Vtt),
            _ => Err(format!("Unknown format: {}. Use 'srt' or 'vtt'", s)),
        }
    }
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
        }
    }
}

/// Model and parameter choices a mode initializes each stage with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModePreset {
    pub asr_model: String,
    pub compute_type: String,
    pub translation_model: String,
    /// Neighbouring segments sent along as translation context.
    pub context_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub base_url: String,
    pub language: String,
    pub beam_size: u32,
    pub vad_filter: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WHISPER_URL.to_string(),
            language: "ru".to_string(),
            beam_size: 5,
            vad_filter: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub base_url: String,
    pub source_lang: String,
    pub target_lang: String,
    pub fast_model: String,
    pub quality_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TRANSLATOR_URL.to_string(),
            source_lang: "ru".to_string(),
            target_lang: "en".to_string(),
            fast_model: "nllb-200-distilled-600M".to_string(),
            quality_model: "nllb-200-distilled-1.3B".to_string(),
            temperature: 0.2,
            max_tokens: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    pub base_url: String,
    pub language: String,
    pub default_speaker: String,
    /// Reference recording to clone the voice from.
    pub voice_reference: Option<PathBuf>,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TTS_URL.to_string(),
            language: "en".to_string(),
            default_speaker: "female".to_string(),
            voice_reference: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub mode: ProcessingMode,
    pub device: Device,
    pub sample_rate: u32,
    pub sync_duration: bool,
    pub duration_tolerance_secs: f64,
    pub context_window: usize,
    pub concurrency: usize,
    pub subtitle_format: SubtitleFormat,
    pub recognizer: RecognizerConfig,
    pub translator: TranslatorConfig,
    pub synthesizer: SynthesizerConfig,
    pub video: VideoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            mode: ProcessingMode::default(),
            device: Device::default(),
            sample_rate: 16000,
            sync_duration: true,
            duration_tolerance_secs: 1.0,
            context_window: 2,
            concurrency: 1,
            subtitle_format: SubtitleFormat::default(),
            recognizer: RecognizerConfig::default(),
            translator: TranslatorConfig::default(),
            synthesizer: SynthesizerConfig::default(),
            video: VideoConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then the config file, then `REVOICE_*` environment variables.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str::<Config>(&contents).map_err(|e| {
            RevoiceError::Config(format!("{}: {}", path.display(), e.message()))
        })
    }

    /// Apply overrides from a variable lookup. Unparseable values are ignored
    /// with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("REVOICE_MODE") {
            match mode.parse() {
                Ok(m) => self.mode = m,
                Err(e) => warn!("Ignoring REVOICE_MODE: {}", e),
            }
        }
        if let Some(device) = lookup("REVOICE_DEVICE") {
            match device.parse() {
                Ok(d) => self.device = d,
                Err(e) => warn!("Ignoring REVOICE_DEVICE: {}", e),
            }
        }
        if let Some(dir) = lookup("REVOICE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("REVOICE_WHISPER_URL") {
            self.recognizer.base_url = url;
        }
        if let Some(url) = lookup("REVOICE_TRANSLATOR_URL") {
            self.translator.base_url = url;
        }
        if let Some(url) = lookup("REVOICE_TTS_URL") {
            self.synthesizer.base_url = url;
        }
        if let Some(wav) = lookup("REVOICE_SPEAKER_WAV") {
            self.synthesizer.voice_reference = Some(PathBuf::from(wav));
        }
        if let Some(concurrency) = lookup("REVOICE_CONCURRENCY") {
            match concurrency.parse() {
                Ok(c) => self.concurrency = c,
                Err(_) => warn!("Ignoring REVOICE_CONCURRENCY: '{}' is not a number", concurrency),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(RevoiceError::Config(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(RevoiceError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }
        if !(self.duration_tolerance_secs.is_finite() && self.duration_tolerance_secs > 0.0) {
            return Err(RevoiceError::Config(format!(
                "Duration tolerance must be positive, got {}",
                self.duration_tolerance_secs
            )));
        }
        for (name, url) in [
            ("recognizer", &self.recognizer.base_url),
            ("translator", &self.translator.base_url),
            ("synthesizer", &self.synthesizer.base_url),
        ] {
            if url.trim().is_empty() {
                return Err(RevoiceError::Config(format!(
                    "{} base_url must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn preset(&self) -> ModePreset {
        let (asr_model, compute_type, translation_model, context_window) = match self.mode {
            ProcessingMode::Fast => ("medium", "int8", &self.translator.fast_model, 0),
            ProcessingMode::Quality => (
                "large-v3",
                "float16",
                &self.translator.quality_model,
                self.context_window,
            ),
        };

        // Half precision is a GPU-only option.
        let compute_type = if self.device == Device::Cpu && compute_type == "float16" {
            "float32"
        } else {
            compute_type
        };

        ModePreset {
            asr_model: asr_model.to_string(),
            compute_type: compute_type.to_string(),
            translation_model: translation_model.clone(),
            context_window,
        }
    }

    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("revoice").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("fast".parse::<ProcessingMode>().unwrap(), ProcessingMode::Fast);
        assert_eq!("QUALITY".parse::<ProcessingMode>().unwrap(), ProcessingMode::Quality);
        assert!("turbo".parse::<ProcessingMode>().is_err());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("srt".parse::<SubtitleFormat>().unwrap(), SubtitleFormat::Srt);
        assert_eq!("vtt".parse::<SubtitleFormat>().unwrap(), SubtitleFormat::Vtt);
        assert!("json".parse::<SubtitleFormat>().is_err());
        assert_eq!(SubtitleFormat::Vtt.extension(), "vtt");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sample_rate, 16000);
        assert!(config.sync_duration);
        assert_eq!(config.duration_tolerance_secs, 1.0);
        assert_eq!(config.context_window, 2);
        assert_eq!(config.video.audio_bitrate, "192k");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_differ_by_mode() {
        let mut config = Config::default();
        config.mode = ProcessingMode::Fast;
        let fast = config.preset();
        assert_eq!(fast.asr_model, "medium");
        assert_eq!(fast.compute_type, "int8");
        assert_eq!(fast.context_window, 0);

        config.mode = ProcessingMode::Quality;
        let quality = config.preset();
        assert_eq!(quality.asr_model, "large-v3");
        assert_eq!(quality.compute_type, "float16");
        assert_eq!(quality.context_window, 2);
        assert_eq!(quality.translation_model, config.translator.quality_model);
    }

    #[test]
    fn test_cpu_downgrades_half_precision() {
        let config = Config {
            device: Device::Cpu,
            ..Config::default()
        };
        assert_eq!(config.preset().compute_type, "float32");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.duration_tolerance_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.translator.base_url = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("REVOICE_MODE", "fast"),
            ("REVOICE_TTS_URL", "http://tts:9000"),
            ("REVOICE_CONCURRENCY", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.mode, ProcessingMode::Fast);
        assert_eq!(config.synthesizer.base_url, "http://tts:9000");
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "mode = \"fast\"\n\n[synthesizer]\nvoice_reference = \"/voices/me.wav\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.mode, ProcessingMode::Fast);
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.synthesizer.language, "en");
        assert_eq!(
            config.synthesizer.voice_reference,
            Some(PathBuf::from("/voices/me.wav"))
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "mode = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(RevoiceError::Config(_))));
    }
}
