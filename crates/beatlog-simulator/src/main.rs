//! Desktop simulator for the beatlog beat detector and BPM logger.
//!
//! Runs the beatlog-core control loop against a synthetic click track or a
//! recorded WAV file, shows the indicator color as a terminal swatch, and
//! writes the per-minute BPM log to a text file or into a FAT disk image.
//!
//! By default time is virtual: the clock only advances when the loop sleeps,
//! so several minutes of device time finish in well under a second. Use
//! `--realtime` to run at wall-clock speed.
//!
//! ```text
//! beatlog-simulator --bpm 96 --duration 180
//! beatlog-simulator --wav drums.wav --log drums_bpm.txt
//! beatlog-simulator --realtime --sd-image card.img
//! RUST_LOG=debug beatlog-simulator --clock-offset 4294900000
//! ```

mod clock;
mod indicator;
mod sensor;
mod storage;
mod time_source;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use beatlog_core::storage::sd_card::SdCardLog;
use beatlog_core::{
    BeatController, DetectorConfig, Indicator, LogSink, RunSummary, SoundSensor,
};
use clap::Parser;
use log::{info, warn};
use time::OffsetDateTime;

use crate::clock::{SimClock, SystemClock, VirtualClock};
use crate::indicator::TerminalIndicator;
use crate::sensor::{ClickTrack, WavSensor};
use crate::storage::{FileBlockDevice, FileLog};
use crate::time_source::{CalendarTime, format_elapsed, local_now};

/// Simulated run length when virtual time has no other end.
const DEFAULT_VIRTUAL_DURATION: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(name = "beatlog-simulator", version, about)]
struct Cli {
    /// Tempo of the synthetic click track
    #[arg(long, default_value_t = 120.0)]
    bpm: f32,

    /// Replay a WAV recording instead of the click track
    #[arg(long, value_name = "FILE")]
    wav: Option<PathBuf>,

    /// Seconds of device time to run (default: the recording length, or 300
    /// in virtual time; unlimited with --realtime)
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Use the wall clock and real sleeps instead of virtual time
    #[arg(long)]
    realtime: bool,

    /// Text file the BPM log is appended to
    #[arg(long, value_name = "FILE", default_value = "bpm_log.txt")]
    log: PathBuf,

    /// Write the log into BPM_LOG.TXT on a FAT disk image instead
    #[arg(long, value_name = "IMAGE", conflicts_with = "log")]
    sd_image: Option<PathBuf>,

    /// JSON file with detector settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the beat threshold
    #[arg(long)]
    threshold: Option<u16>,

    /// Override the minimum interval between beats
    #[arg(long)]
    refractory_ms: Option<u32>,

    /// Seed for indicator colors and click-track noise
    #[arg(long)]
    seed: Option<u64>,

    /// Initial value of the millisecond tick counter
    #[arg(long, default_value_t = 0)]
    clock_offset: u32,
}

impl Cli {
    /// Detector settings: defaults, then the JSON file, then flags.
    fn detector_config(&self) -> Result<DetectorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("failed to open config {}", path.display()))?;
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => DetectorConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(refractory_ms) = self.refractory_ms {
            config.refractory_ms = refractory_ms;
        }
        Ok(config)
    }

    fn duration(&self) -> Result<Option<Duration>> {
        self.duration
            .map(Duration::try_from_secs_f64)
            .transpose()
            .context("invalid --duration")
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.detector_config()?;
    let start = local_now();

    let stop = Arc::new(AtomicBool::new(false));
    spawn_ctrl_c_watcher(Arc::clone(&stop))?;

    info!("Starting beatlog simulator");
    let summary = if cli.realtime {
        let clock = SystemClock::new(cli.clock_offset);
        simulate(&cli, config, clock, TerminalIndicator::stderr(), start, &stop)?
    } else {
        let clock = VirtualClock::new(cli.clock_offset);
        simulate(&cli, config, clock, TerminalIndicator::stderr(), start, &stop)?
    };

    info!(
        "Simulator exiting | {} iterations | {} beats | {} records written | {} failed flushes",
        summary.iterations, summary.beats, summary.records_written, summary.flush_failures
    );
    Ok(())
}

/// Set `stop` when Ctrl-C is pressed.
///
/// The control loop is blocking, so the signal is awaited on a helper thread
/// with its own single-threaded runtime.
fn spawn_ctrl_c_watcher(stop: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    std::thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Ctrl-C received, stopping after the current iteration");
                        stop.store(true, Ordering::SeqCst);
                    }
                    Err(e) => warn!("Ctrl-C handler unavailable: {}", e),
                }
            });
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}

/// Build the remaining hardware stand-ins on `clock` and run the control loop.
fn simulate<C, I>(
    cli: &Cli,
    config: DetectorConfig,
    clock: C,
    indicator: I,
    start: OffsetDateTime,
    stop: &AtomicBool,
) -> Result<RunSummary>
where
    C: SimClock + 'static,
    I: Indicator,
{
    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut duration = cli.duration()?;

    let mut sensor: Box<dyn SoundSensor> = match &cli.wav {
        Some(path) => {
            let wav = WavSensor::open(path, clock.clone())?;
            info!(
                "Replaying {} ({})",
                path.display(),
                format_elapsed(wav.duration())
            );
            duration = duration.or(Some(wav.duration()));
            Box::new(wav)
        }
        None => {
            info!("Synthetic click track at {} BPM", cli.bpm);
            Box::new(ClickTrack::new(cli.bpm, clock.clone(), seed)?)
        }
    };

    if duration.is_none() && !cli.realtime {
        duration = Some(DEFAULT_VIRTUAL_DURATION);
    }
    if let Some(duration) = duration {
        info!("Running for {} of device time", format_elapsed(duration));
    }

    let calendar = CalendarTime::new(start, clock.clone());
    let mut sink: Box<dyn LogSink> = match &cli.sd_image {
        Some(image) => {
            let device = FileBlockDevice::open(image)
                .with_context(|| format!("failed to open SD image {}", image.display()))?;
            let log = SdCardLog::new(device, calendar.clone());
            info!("Logging to {} on {}", log.file_name(), image.display());
            Box::new(log)
        }
        None => {
            info!("Logging to {}", cli.log.display());
            Box::new(FileLog::new(&cli.log))
        }
    };

    let mut controller = BeatController::new(
        config,
        &mut *sensor,
        clock.clone(),
        clock.clone(),
        indicator,
    )
    .map_err(|e| anyhow!("failed to start the beat detector: {}", e))?;
    if cli.seed.is_some() {
        controller = controller.with_color_seed(seed);
    }

    let summary = controller.run(&mut *sink, &calendar, || {
        stop.load(Ordering::SeqCst) || duration.is_some_and(|d| clock.elapsed() >= d)
    });

    info!(
        "Ran {} of device time, last tempo estimate: {}",
        format_elapsed(clock.elapsed()),
        controller
            .history()
            .estimate_bpm()
            .map(|bpm| format!("{:.1} BPM", bpm))
            .unwrap_or_else(|| "n/a".into())
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["beatlog-simulator"]).unwrap();
        assert_eq!(cli.bpm, 120.0);
        assert_eq!(cli.log, PathBuf::from("bpm_log.txt"));
        assert!(!cli.realtime);
        assert_eq!(cli.detector_config().unwrap(), DetectorConfig::default());
        assert_eq!(cli.duration().unwrap(), None);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector.json");
        std::fs::write(&path, r#"{ "threshold": 20000, "history_capacity": 16 }"#).unwrap();

        let cli = Cli::try_parse_from([
            "beatlog-simulator",
            "--config",
            path.to_str().unwrap(),
            "--threshold",
            "15000",
            "--refractory-ms",
            "250",
        ])
        .unwrap();
        let config = cli.detector_config().unwrap();

        assert_eq!(config.threshold, 15_000);
        assert_eq!(config.refractory_ms, 250);
        assert_eq!(config.history_capacity, 16);
        assert_eq!(config.flush_period_ms, 60_000);
    }

    #[test]
    fn test_sd_image_conflicts_with_log() {
        let result = Cli::try_parse_from([
            "beatlog-simulator",
            "--log",
            "a.txt",
            "--sd-image",
            "card.img",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_virtual_run_writes_minute_records() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("bpm_log.txt");
        let cli = Cli::try_parse_from([
            "beatlog-simulator",
            "--bpm",
            "100",
            "--duration",
            "125",
            "--seed",
            "3",
            "--log",
            log_path.to_str().unwrap(),
        ])
        .unwrap();

        let stop = AtomicBool::new(false);
        let summary = simulate(
            &cli,
            cli.detector_config().unwrap(),
            VirtualClock::new(0),
            TerminalIndicator::new(Vec::new()),
            OffsetDateTime::UNIX_EPOCH,
            &stop,
        )
        .unwrap();

        assert_eq!(summary.records_written, 3);
        let text = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "YYYY-MM-DD HH:MM:SS,bpm");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("1970-01-01 00:01:00,"), "{}", lines[1]);
        for line in &lines[1..] {
            let bpm: f32 = line.rsplit(',').next().unwrap().parse().unwrap();
            assert!((bpm - 100.0).abs() < 5.0, "{}", line);
        }
    }
}
