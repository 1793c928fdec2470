pub mod srt;
pub mod text;
pub mod vtt;

pub use text::{format_transcript, format_translation};

use crate::audio::MediaKind;
use crate::config::SubtitleFormat;
use crate::error::{Result, RevoiceError};
use crate::segment::Segment;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SubtitleEntry {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

pub trait SubtitleFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String;
    fn extension(&self) -> &'static str;
}

pub fn create_formatter(format: SubtitleFormat) -> Box<dyn SubtitleFormatter> {
    match format {
        SubtitleFormat::Srt => Box::new(srt::SrtFormatter),
        SubtitleFormat::Vtt => Box::new(vtt::VttFormatter),
    }
}

/// Which text of a segment a subtitle file shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSide {
    Source,
    Translated,
}

/// One cue per segment with non-blank text, numbered from 1.
pub fn subtitle_entries(segments: &[Segment], side: TextSide) -> Vec<SubtitleEntry> {
    segments
        .iter()
        .filter_map(|segment| {
            let text = match side {
                TextSide::Source => segment.source_text(),
                TextSide::Translated => segment.translated_text.as_str(),
            }
            .trim();
            (!text.is_empty()).then(|| (segment, text.to_string()))
        })
        .enumerate()
        .map(|(i, (segment, text))| SubtitleEntry {
            index: i + 1,
            start: segment.start_time(),
            end: segment.end_time(),
            text,
        })
        .collect()
}

/// Every file a run produces, named after the input's stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub transcription: PathBuf,
    pub source_subtitles: PathBuf,
    pub translated_subtitles: PathBuf,
    pub translation: PathBuf,
    pub translated_audio: PathBuf,
    pub final_output: PathBuf,
}

impl OutputPaths {
    pub fn new(output_dir: &Path, input: &Path, format: SubtitleFormat, kind: MediaKind) -> Self {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let file = |suffix: &str| output_dir.join(format!("{}_{}", stem, suffix));
        let ext = format.extension();

        Self {
            transcription: file("transcription.txt"),
            source_subtitles: file(&format!("russian.{}", ext)),
            translated_subtitles: file(&format!("english.{}", ext)),
            translation: file("translation.txt"),
            translated_audio: file("translated_audio.wav"),
            final_output: if kind.is_video() {
                file("translated.mp4")
            } else {
                file("translated.wav")
            },
        }
    }
}

/// Write a UTF-8 text export, creating the directory if needed.
pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents)
        .map_err(|e| RevoiceError::Export(format!("{}: {}", path.display(), e)))?;
    info!("Saved {}", path.display());
    Ok(())
}

pub fn write_subtitles(
    path: &Path,
    segments: &[Segment],
    side: TextSide,
    format: SubtitleFormat,
) -> Result<()> {
    let formatter = create_formatter(format);
    let entries = subtitle_entries(segments, side);
    write_text(path, &formatter.format(&entries))
}
