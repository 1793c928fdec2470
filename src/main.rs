use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use revoice::audio::{check_ffmpeg, check_ffprobe};
use revoice::config::{Config, Device, ProcessingMode, SubtitleFormat};
use revoice::executor::RunExecutor;
use revoice::interactive::run_interactive_wizard;
use revoice::pipeline::{print_summary, PipelineOrchestrator, RunRequest};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "revoice")]
#[command(version, about = "Offline Russian to English speech translation")]
#[command(
    long_about = "Transcribe Russian speech, translate it to English and dub it back with a cloned voice, \
using locally hosted recognition, translation and synthesis servers."
)]
struct Cli {
    /// Input video/audio file
    #[arg(required_unless_present = "interactive")]
    input: Option<PathBuf>,

    /// Processing mode: fast, quality
    #[arg(short, long)]
    mode: Option<String>,

    /// Keep the natural length of the translated speech
    #[arg(long)]
    no_sync: bool,

    /// Run models on CPU
    #[arg(long)]
    cpu: bool,

    /// Reference recording to clone the speaker's voice from
    #[arg(long)]
    voice: Option<PathBuf>,

    /// Directory for all outputs
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Subtitle format: srt, vtt
    #[arg(short = 'f', long)]
    subtitle_format: Option<String>,

    /// Number of segments processed at once
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Guided setup instead of flags
    #[arg(short, long)]
    interactive: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Fold command-line flags over the loaded configuration.
fn apply_cli(cli: &Cli, config: &mut Config) -> Result<()> {
    if let Some(mode) = &cli.mode {
        config.mode = mode
            .parse::<ProcessingMode>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(format) = &cli.subtitle_format {
        config.subtitle_format = format
            .parse::<SubtitleFormat>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if cli.no_sync {
        config.sync_duration = false;
    }
    if cli.cpu {
        config.device = Device::Cpu;
    }
    if let Some(voice) = &cli.voice {
        if !voice.exists() {
            anyhow::bail!("Voice reference not found: {}", voice.display());
        }
        config.synthesizer.voice_reference = Some(voice.clone());
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let (input, mut config) = if cli.interactive {
        let wizard = run_interactive_wizard()?;
        (wizard.input, wizard.config)
    } else {
        let input = cli
            .input
            .clone()
            .context("An input file is required")?;
        let config = Config::load().context("Failed to load configuration")?;
        (input, config)
    };
    apply_cli(&cli, &mut config)?;

    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    config
        .validate()
        .context("Configuration validation failed")?;
    check_ffmpeg().context("FFmpeg is required for audio extraction and muxing")?;
    if let Err(e) = check_ffprobe() {
        warn!("{}", e);
    }

    info!("Input:    {}", input.display());
    info!("Output:   {}", config.output_dir.display());
    info!("Mode:     {}", config.mode);
    info!("Sync:     {}", config.sync_duration);

    let executor = RunExecutor::new();
    let orchestrator = PipelineOrchestrator::from_config(config);
    let mut handle = executor.submit(orchestrator, RunRequest::new(&input))?;

    let cancel = handle.cancel_flag();
    ctrlc::set_handler(move || {
        warn!("Interrupted, stopping after the current step...");
        cancel.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    let pb = progress_bar();
    while let Some(event) = handle.next_event().await {
        pb.set_position(event.percent as u64);
        if event.is_error {
            pb.abandon_with_message(event.label);
        } else {
            pb.set_message(event.label);
        }
    }

    let outcome = handle.wait().await;
    match outcome.result {
        Ok(result) => {
            pb.finish_with_message("✓ Done");
            print_summary(&result);
            Ok(())
        }
        Err(failure) => {
            if !pb.is_finished() {
                pb.abandon();
            }
            Err(anyhow::Error::new(failure)).context("Processing failed")
        }
    }
}
