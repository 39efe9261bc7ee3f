use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use voiceprint::analysis::{ClipExtractor, SelectedFeatures, SelectionStats};
use voiceprint::audio::{
    import_wav, CaptureController, CaptureSummary, ContainerHeader, CpalPcmDevice, PcmDevice,
    SyntheticPcmDevice, HEADER_LEN,
};
use voiceprint::config::AppConfig;
use voiceprint::error::ExtractionError;
use voiceprint::upload::{FeatureEntry, UploadRequest};

#[derive(Parser, Debug)]
#[command(
    name = "voiceprint_cli",
    about = "Record voice clips and extract MFCC voiceprints"
)]
struct Cli {
    /// JSON configuration file (defaults are used if missing or invalid)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a clip until the duration ceiling or Ctrl-C
    Record {
        #[arg(long)]
        output: PathBuf,
        /// Duration ceiling in seconds (overrides the config)
        #[arg(long)]
        seconds: Option<f32>,
        #[arg(long)]
        sample_rate: Option<u32>,
        /// Record from a synthetic source instead of a microphone
        #[arg(long, value_enum)]
        synthetic: Option<SyntheticKind>,
        /// Input device name (default input if omitted)
        #[arg(long)]
        device: Option<String>,
    },
    /// List available input devices
    Devices,
    /// Print the header of a WAV clip as JSON
    Inspect { path: PathBuf },
    /// Extract the feature upload payload from a WAV clip
    Extract {
        path: PathBuf,
        /// Apply pre-emphasis before framing
        #[arg(long)]
        pre_emphasis: bool,
        /// Emit every retained vector instead of only the representative
        #[arg(long)]
        all: bool,
        /// Decode through hound (float, 24-bit, multi-channel files)
        #[arg(long)]
        import: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SyntheticKind {
    Sine,
    Noise,
    Silence,
}

fn main() -> ExitCode {
    voiceprint::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Record {
            output,
            seconds,
            sample_rate,
            synthetic,
            device,
        } => run_record(config, &output, seconds, sample_rate, synthetic, device),
        Commands::Devices => run_devices(),
        Commands::Inspect { path } => run_inspect(&path),
        Commands::Extract {
            path,
            pre_emphasis,
            all,
            import,
            output,
        } => run_extract(config, &path, pre_emphasis, all, import, output),
    }
}

fn run_record(
    mut config: AppConfig,
    output: &Path,
    seconds: Option<f32>,
    sample_rate: Option<u32>,
    synthetic: Option<SyntheticKind>,
    device: Option<String>,
) -> Result<ExitCode> {
    if let Some(seconds) = seconds {
        config.capture.max_duration_secs = Some(seconds);
    }
    if let Some(rate) = sample_rate {
        config.capture.sample_rate = rate;
    }

    let controller =
        CaptureController::new(config.capture.clone()).context("invalid capture configuration")?;

    let summary = match synthetic {
        Some(SyntheticKind::Sine) => record_with(&controller, SyntheticPcmDevice::sine(440.0).paced(), output),
        Some(SyntheticKind::Noise) => record_with(&controller, SyntheticPcmDevice::noise().paced(), output),
        Some(SyntheticKind::Silence) => {
            record_with(&controller, SyntheticPcmDevice::silence().paced(), output)
        }
        None => match device {
            Some(name) => record_with(&controller, CpalPcmDevice::named(name), output),
            None => record_with(&controller, CpalPcmDevice::new(), output),
        },
    }?;

    controller
        .shutdown_default()
        .context("capture worker did not exit")?;
    println!("{}", serde_json::to_string_pretty(&RecordReport::from(&summary))?);
    Ok(ExitCode::from(0))
}

fn record_with<D: PcmDevice>(
    controller: &CaptureController,
    device: D,
    output: &Path,
) -> Result<CaptureSummary> {
    let completion = controller
        .start(device, output)
        .with_context(|| format!("starting capture into {}", output.display()))?;
    let signal = controller.stop_signal();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;

    let summary = runtime.block_on(async move {
        let mut wait = Box::pin(completion.wait());
        tokio::select! {
            result = &mut wait => result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopping...");
                signal.stop();
                wait.await
            }
        }
    })?;

    Ok(summary)
}

fn run_devices() -> Result<ExitCode> {
    let devices = CpalPcmDevice::list_devices()?;
    if devices.is_empty() {
        println!("No input devices found");
    }
    for name in devices {
        println!("{}", name);
    }
    Ok(ExitCode::from(0))
}

fn run_inspect(path: &Path) -> Result<ExitCode> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let header = ContainerHeader::parse(&bytes)
        .with_context(|| format!("parsing header of {}", path.display()))?;

    let payload_bytes = bytes.len().saturating_sub(HEADER_LEN);
    let report = InspectReport {
        path: path.display().to_string(),
        finalized: !(header.data_len == 0 && payload_bytes > 0),
        sizes_consistent: header.sizes_consistent(),
        payload_bytes,
        duration_secs: header.data_len as f64 / header.byte_rate as f64,
        header,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_extract(
    mut config: AppConfig,
    path: &Path,
    pre_emphasis: bool,
    all: bool,
    import: bool,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    if pre_emphasis {
        config.extraction.apply_pre_emphasis = true;
    }
    let send_all = all || config.upload.send_all_vectors;

    let mut extractor =
        ClipExtractor::new(config.extraction).context("invalid extraction configuration")?;

    let result = if import {
        let clip = import_wav(path)?;
        extractor.extract_samples(&clip.samples, clip.sample_rate)
    } else {
        extractor.extract_file(path)
    };

    let selected = match result {
        Ok(selected) => selected,
        Err(ExtractionError::EmptyFeatureSet) => {
            eprintln!("No usable frames in {}", path.display());
            return Ok(ExitCode::from(2));
        }
        Err(err) => {
            return Err(err).with_context(|| format!("extracting features from {}", path.display()))
        }
    };

    let report = ExtractReport::new(path, &selected, send_all);
    let json = serde_json::to_string_pretty(&report)?;
    if let Some(output) = output {
        fs::write(&output, json).with_context(|| format!("writing {}", output.display()))?;
    } else {
        println!("{json}");
    }
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct RecordReport<'a> {
    path: String,
    sample_rate: u32,
    data_bytes: u64,
    duration_secs: f64,
    stop_reason: &'a voiceprint::audio::StopReason,
}

impl<'a> From<&'a CaptureSummary> for RecordReport<'a> {
    fn from(summary: &'a CaptureSummary) -> Self {
        Self {
            path: summary.path.display().to_string(),
            sample_rate: summary.config.sample_rate,
            data_bytes: summary.data_bytes,
            duration_secs: summary.duration_secs(),
            stop_reason: &summary.stop_reason,
        }
    }
}

#[derive(Serialize)]
struct InspectReport {
    path: String,
    header: ContainerHeader,
    finalized: bool,
    sizes_consistent: bool,
    payload_bytes: usize,
    duration_secs: f64,
}

#[derive(Serialize)]
struct ExtractReport {
    file: String,
    stats: SelectionStats,
    retained: usize,
    entries: Vec<FeatureEntry>,
}

impl ExtractReport {
    fn new(path: &Path, selected: &SelectedFeatures, send_all: bool) -> Self {
        let entries = match UploadRequest::feature_vectors(selected, send_all) {
            UploadRequest::FeatureVectors(entries) => entries,
            UploadRequest::ContainerFile(_) => Vec::new(),
        };
        Self {
            file: path.display().to_string(),
            stats: selected.stats(),
            retained: selected.vectors().len(),
            entries,
        }
    }
}
