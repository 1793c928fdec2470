use std::path::Path;
use std::process::Command;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Result, RevoiceError};

pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a", "aac"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm"];

/// What kind of media an input path holds, judged by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(MediaKind::Audio)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(MediaKind::Video)
        } else {
            Err(RevoiceError::AudioExtraction(format!(
                "Unsupported file format '{}' for {}",
                ext,
                path.display()
            )))
        }
    }

    pub fn is_video(self) -> bool {
        self == MediaKind::Video
    }
}

/// Container tooling the pipeline needs: decode to WAV, probe, remux.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Pull the audio track out of a video as mono PCM WAV.
    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<()>;

    /// Re-encode any audio file as mono PCM WAV.
    async fn convert_audio(&self, audio: &Path, output: &Path) -> Result<()>;

    async fn probe_duration(&self, media: &Path) -> Result<Duration>;

    /// Replace the audio track of `video` with `audio`.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

/// [`MediaTools`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    sample_rate: u32,
    audio_codec: String,
    audio_bitrate: String,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl FfmpegTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_audio_codec(mut self, codec: impl Into<String>, bitrate: impl Into<String>) -> Self {
        self.audio_codec = codec.into();
        self.audio_bitrate = bitrate.into();
        self
    }

    async fn to_pcm_wav(&self, input: &Path, output: &Path) -> Result<()> {
        check_ffmpeg()?;

        if !input.exists() {
            return Err(RevoiceError::FileNotFound(input.display().to_string()));
        }

        let rate = self.sample_rate.to_string();
        let result = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-vn", "-acodec", "pcm_s16le", "-ar", &rate, "-ac", "1"])
            .arg(output)
            .output()
            .await
            .map_err(|e| RevoiceError::AudioExtraction(format!("Failed to run FFmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(RevoiceError::AudioExtraction(format!(
                "FFmpeg audio extraction failed: {}",
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(RevoiceError::AudioExtraction(
                "Output file was not created".to_string(),
            ));
        }

        info!("Audio extracted to {}", output.display());
        Ok(())
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<()> {
        info!("Extracting audio from {}", video.display());
        self.to_pcm_wav(video, output).await
    }

    async fn convert_audio(&self, audio: &Path, output: &Path) -> Result<()> {
        info!("Converting audio {}", audio.display());
        self.to_pcm_wav(audio, output).await
    }

    async fn probe_duration(&self, media: &Path) -> Result<Duration> {
        check_ffprobe()?;

        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(media)
            .output()
            .await
            .map_err(|e| RevoiceError::AudioExtraction(format!("Failed to run FFprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RevoiceError::AudioExtraction(format!(
                "FFprobe failed: {stderr}"
            )));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        check_ffmpeg()?;
        info!("Replacing audio in video: {}", video.display());

        let result = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args([
                "-map",
                "0:v:0",
                "-map",
                "1:a:0",
                "-c:v",
                "copy",
                "-c:a",
                &self.audio_codec,
                "-b:a",
                &self.audio_bitrate,
            ])
            .arg(output)
            .output()
            .await
            .map_err(|e| RevoiceError::Export(format!("Failed to run FFmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(RevoiceError::Export(format!(
                "FFmpeg remux failed: {}",
                stderr.trim()
            )));
        }

        info!("Video with new audio saved to {}", output.display());
        Ok(())
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    let secs: f64 = trimmed.parse().map_err(|e| {
        RevoiceError::AudioExtraction(format!("Failed to parse duration '{}': {e}", trimmed))
    })?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(RevoiceError::AudioExtraction(format!(
            "FFprobe reported an invalid duration: {}",
            trimmed
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn check_tool(tool: &str) -> Result<()> {
    match Command::new(tool).arg("-version").output() {
        Ok(output) if output.status.success() => {
            debug!("{} is available", tool);
            Ok(())
        }
        Ok(output) => Err(RevoiceError::AudioExtraction(format!(
            "{} -version exited with {}",
            tool, output.status
        ))),
        Err(e) => Err(RevoiceError::AudioExtraction(format!(
            "{} not found, install FFmpeg and make sure it is on PATH: {e}",
            tool
        ))),
    }
}

/// Fail early when `ffmpeg` cannot be run.
pub fn check_ffmpeg() -> Result<()> {
    check_tool("ffmpeg")
}

/// `ffprobe` ships with FFmpeg but some minimal builds leave it out.
pub fn check_ffprobe() -> Result<()> {
    check_tool("ffprobe")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffmpeg_available() -> bool {
        check_ffmpeg().is_ok()
    }

    #[test]
    fn test_media_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("talk.MP4")).unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("a/b/c.flac")).unwrap(), MediaKind::Audio);
        assert!(MediaKind::from_path(Path::new("notes.txt")).is_err());
        assert!(MediaKind::from_path(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.5\n").unwrap(), Duration::from_millis(12500));
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-3").is_err());
    }

    #[test]
    fn test_missing_tool_is_reported() {
        match check_tool("revoice-no-such-tool") {
            Err(RevoiceError::AudioExtraction(msg)) => {
                assert!(msg.contains("revoice-no-such-tool not found"))
            }
            other => panic!("expected extraction error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extract_audio_file_not_found() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }

        let tools = FfmpegTools::new();
        let result = tools
            .extract_audio(Path::new("/nonexistent/file.mp4"), Path::new("/tmp/out.wav"))
            .await;
        assert!(
            matches!(&result, Err(RevoiceError::FileNotFound(path)) if path.contains("nonexistent")),
            "unexpected result: {result:?}"
        );
    }
}
