use anyhow::{Context, Result};
use audiosub::config::{Config, DecoderKind, Mode, Provider};
use audiosub::{derive_output_path, print_summary, Pipeline};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "audiosub")]
#[command(version, about = "Convert recorded audio into SRT subtitles")]
#[command(
    long_about = "Decode an audio file (wav, mp3, m4a, caf, flac, ogg, aac), recognize its speech and write a numbered, timed SRT track."
)]
struct Cli {
    /// Input audio file
    input: PathBuf,

    /// Output subtitle file (defaults to the input name with .srt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Recognition provider: whisper, local
    #[arg(short, long)]
    provider: Option<String>,

    /// Segmentation mode: windowed, native
    #[arg(short, long)]
    mode: Option<String>,

    /// Window length in seconds for windowed mode
    #[arg(short, long)]
    window: Option<f64>,

    /// Number of concurrent engine requests
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Source language code (e.g., en, ja, es)
    #[arg(short, long)]
    language: Option<String>,

    /// Audio decoder: native, ffmpeg
    #[arg(long)]
    decoder: Option<String>,

    /// Path to a local whisper.cpp model
    #[arg(long)]
    model: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn apply_overrides(cli: &Cli, config: &mut Config) -> Result<()> {
    if let Some(ref provider) = cli.provider {
        config.provider = provider
            .parse::<Provider>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(ref mode) = cli.mode {
        config.mode = mode.parse::<Mode>().map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(ref decoder) = cli.decoder {
        config.decoder = decoder
            .parse::<DecoderKind>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(window) = cli.window {
        config.window_secs = window;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(ref language) = cli.language {
        config.language = Some(language.clone());
    }
    if let Some(ref model) = cli.model {
        config.model_path = Some(model.clone());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_overrides(&cli, &mut config)?;
    config.validate().context("Configuration validation failed")?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| derive_output_path(&cli.input));

    info!("Input:    {}", cli.input.display());
    info!("Output:   {}", output.display());
    info!("Provider: {} ({})", config.provider, config.mode);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted, finishing with the windows already recognized");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    let pipeline = Pipeline::from_config(&config)
        .context("Failed to set up pipeline")?
        .with_progress(!cli.quiet);

    let report = pipeline
        .convert_file(&cli.input, &output, &cancel)
        .await
        .with_context(|| format!("Failed to convert {}", cli.input.display()))?;

    print_summary(&report, &output);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "audiosub",
            "memo.caf",
            "--mode",
            "native",
            "--window",
            "10",
            "--decoder",
            "ffmpeg",
        ]);
        let mut config = Config::default();
        apply_overrides(&cli, &mut config).unwrap();

        assert_eq!(config.mode, Mode::Native);
        assert_eq!(config.window_secs, 10.0);
        assert_eq!(config.decoder, DecoderKind::Ffmpeg);
        assert_eq!(config.provider, Provider::Whisper);
    }

    #[test]
    fn test_cli_rejects_unknown_provider() {
        let cli = Cli::parse_from(["audiosub", "memo.wav", "--provider", "google"]);
        let mut config = Config::default();
        assert!(apply_overrides(&cli, &mut config).is_err());
    }
}
