use crate::audio::extract::{AUDIO_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::config::{Config, ProcessingMode, SubtitleFormat};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::fs;
use std::path::{Path, PathBuf};

pub struct InteractiveResult {
    pub input: PathBuf,
    pub config: Config,
}

pub fn run_interactive_wizard() -> anyhow::Result<InteractiveResult> {
    print_header();

    // A broken config file should not block the wizard.
    let mut config = Config::load().unwrap_or_default();

    // Step 1: Source file
    let input = select_source_file()?;

    // Step 2: Processing mode
    config.mode = select_mode(config.mode)?;

    // Step 3: Voice cloning reference (optional)
    config.synthesizer.voice_reference = select_voice_reference(&config)?;

    // Step 4: Duration sync
    config.sync_duration = Confirm::new()
        .with_prompt("Match the translated audio length to the original?")
        .default(config.sync_duration)
        .interact()?;

    // Step 5: Subtitle format and output directory
    config.subtitle_format = select_subtitle_format(config.subtitle_format)?;
    let output_dir: String = Input::new()
        .with_prompt("Output directory")
        .default(config.output_dir.display().to_string())
        .interact_text()?;
    config.output_dir = PathBuf::from(output_dir.trim());

    // Step 6: Confirm
    print_summary(&input, &config);

    let go = Confirm::new()
        .with_prompt("Start dubbing?")
        .default(true)
        .interact()?;
    if !go {
        anyhow::bail!("Wizard aborted, nothing was processed");
    }

    if Confirm::new()
        .with_prompt("Save these settings as defaults?")
        .default(false)
        .interact()?
    {
        save_config(&config)?;
        println!("{} saved as defaults\n", style("✓").green());
    }

    println!();
    Ok(InteractiveResult { input, config })
}

fn print_header() {
    let title = "revoice  ·  Russian → English voice dubbing";
    let rule = "─".repeat(title.chars().count() + 4);
    println!();
    println!("{}", style(format!("┌{}┐", rule)).cyan());
    println!("{}", style(format!("│  {}  │", title)).cyan().bold());
    println!("{}", style(format!("└{}┘", rule)).cyan());
    println!();
}

fn save_config(config: &Config) -> anyhow::Result<()> {
    let Some(path) = Config::config_file_path() else {
        anyhow::bail!("No configuration directory on this system");
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, toml::to_string_pretty(config)?)?;
    Ok(())
}

/// A media file found next to the working directory.
struct MediaFile {
    path: PathBuf,
    bytes: Option<u64>,
}

impl MediaFile {
    fn label(&self) -> String {
        let size = self.bytes.map(format_size).unwrap_or_else(|| "?".into());
        format!("{}  [{}]", self.path.display(), size)
    }
}

fn select_source_file() -> anyhow::Result<PathBuf> {
    println!("{}", style("Source media").bold().underlined());

    let candidates: Vec<MediaFile> = scan_media_files(Path::new("."))?
        .into_iter()
        .map(|path| MediaFile {
            bytes: fs::metadata(&path).ok().map(|m| m.len()),
            path,
        })
        .collect();

    if candidates.is_empty() {
        println!("  {}", style("nothing playable in the current directory").dim());
        return prompt_existing_path("Path to a video or audio file");
    }

    let mut labels: Vec<String> = candidates.iter().map(MediaFile::label).collect();
    labels.push("Other file...".into());

    let picked = Select::new()
        .with_prompt("Which recording should be dubbed?")
        .items(&labels)
        .default(0)
        .interact()?;

    match candidates.into_iter().nth(picked) {
        Some(file) => Ok(file.path),
        None => prompt_existing_path("Path to a video or audio file"),
    }
}

fn prompt_existing_path(prompt: &str) -> anyhow::Result<PathBuf> {
    let raw: String = Input::new()
        .with_prompt(prompt)
        .validate_with(|value: &String| -> Result<(), String> {
            let candidate = Path::new(value.trim());
            if candidate.is_file() {
                Ok(())
            } else {
                Err(format!("{} is not a file", candidate.display()))
            }
        })
        .interact_text()?;
    Ok(PathBuf::from(raw.trim()))
}

fn is_supported(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    AUDIO_EXTENSIONS
        .iter()
        .chain(VIDEO_EXTENSIONS)
        .any(|known| *known == ext)
}

fn scan_media_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_supported(path))
        .collect();
    found.sort_unstable_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(found)
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Pick one of `options`, each shown as `name: hint`.
fn choose<T: Copy + PartialEq>(
    prompt: &str,
    options: &[(&str, &str, T)],
    current: T,
) -> anyhow::Result<T> {
    let labels: Vec<String> = options
        .iter()
        .map(|(name, hint, _)| format!("{:<8} {}", name, style(hint).dim()))
        .collect();
    let default = options
        .iter()
        .position(|(_, _, value)| *value == current)
        .unwrap_or(0);

    let picked = Select::new()
        .with_prompt(prompt)
        .items(&labels)
        .default(default)
        .interact()?;
    Ok(options[picked].2)
}

fn select_mode(current: ProcessingMode) -> anyhow::Result<ProcessingMode> {
    choose(
        "Processing mode",
        &[
            ("fast", "medium ASR, no translation context", ProcessingMode::Fast),
            ("quality", "large-v3 ASR, context-aware translation", ProcessingMode::Quality),
        ],
        current,
    )
}

fn select_voice_reference(config: &Config) -> anyhow::Result<Option<PathBuf>> {
    if let Some(existing) = &config.synthesizer.voice_reference {
        if existing.exists()
            && Confirm::new()
                .with_prompt(format!("Clone voice from {}?", existing.display()))
                .default(true)
                .interact()?
        {
            return Ok(Some(existing.clone()));
        }
    }

    if !Confirm::new()
        .with_prompt("Clone the speaker's voice from a reference recording?")
        .default(false)
        .interact()?
    {
        return Ok(None);
    }

    let path = prompt_existing_path("Reference WAV (6-30 seconds of clean speech)")?;
    Ok(Some(path))
}

fn select_subtitle_format(current: SubtitleFormat) -> anyhow::Result<SubtitleFormat> {
    choose(
        "Subtitle format",
        &[
            ("srt", "plays almost everywhere", SubtitleFormat::Srt),
            ("vtt", "for HTML5 players", SubtitleFormat::Vtt),
        ],
        current,
    )
}

fn print_summary(input: &Path, config: &Config) {
    let voice = match &config.synthesizer.voice_reference {
        Some(reference) => format!("cloned from {}", reference.display()),
        None => format!("stock speaker '{}'", config.synthesizer.default_speaker),
    };
    let rows = [
        ("input", input.display().to_string()),
        ("output", config.output_dir.display().to_string()),
        ("mode", config.mode.to_string()),
        ("voice", voice),
        ("sync", if config.sync_duration { "on" } else { "off" }.to_string()),
        ("subtitles", config.subtitle_format.to_string()),
    ];

    println!("\n{}", style("Ready to dub").bold().underlined());
    for (key, value) in rows {
        println!("  {:<10} {}", style(key).dim(), style(value).cyan());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("clip.MKV")));
        assert!(is_supported(Path::new("voice.ogg")));
        assert!(!is_supported(Path::new("notes.md")));
    }

    #[test]
    fn test_scan_media_files_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["b.mp4", "a.wav", "readme.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let files = scan_media_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.mp4"]);
    }
}
