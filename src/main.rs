//! fexscope entry point: subcommand dispatch.
//!
//! - `live` — attach to a pid and run the HUD (optionally recording)
//! - `replay` — run the HUD over a recording
//! - `record` — headless recording without a terminal UI
//! - `watch` — wait for an emulator process to appear, then go live
//! - `pick` — choose among running emulator processes, then go live
//! - `export` — flatten a recording to CSV

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use fexscope::cli::{Cli, Command};
use fexscope::discovery;
use fexscope::export::export_csv;
use fexscope::recording::{RecordingReader, ReplaySource};
use fexscope::sampling::{LiveSource, SourceState};
use fexscope::source::FrameSource;
use fexscope::tui;

const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(1);
const HEADLESS_IDLE_SLEEP: Duration = Duration::from_millis(10);
const HEADLESS_STATUS_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Live { pid, sample_period, record } => {
            cmd_live(pid, sample_period, record.as_deref())
        }
        Command::Replay { path } => cmd_replay(&path),
        Command::Record { pid, output, sample_period, duration } => {
            cmd_record(pid, &output, sample_period, duration)
        }
        Command::Watch { sample_period, record } => cmd_watch(sample_period, record.as_deref()),
        Command::Pick { sample_period, record } => cmd_pick(sample_period, record.as_deref()),
        Command::Export { input, output } => cmd_export(&input, &output),
    }
}

fn install_shutdown_flag() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))
        .context("failed to register SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))
        .context("failed to register SIGTERM handler")?;
    Ok(shutdown)
}

fn cmd_live(pid: i32, sample_period_ms: u64, record: Option<&Path>) -> Result<()> {
    let shutdown = install_shutdown_flag()?;
    let mut source =
        LiveSource::attach(pid, Duration::from_millis(sample_period_ms), record)?;

    let result = tui::run_live(&mut source, &shutdown);
    source.shutdown();
    result
}

fn cmd_replay(path: &Path) -> Result<()> {
    let shutdown = install_shutdown_flag()?;
    let reader = RecordingReader::open(path)
        .with_context(|| format!("cannot open recording {}", path.display()))?;

    if reader.truncated() {
        eprintln!(
            "Warning: recording is truncated, replaying the {} frame(s) that were recovered.",
            reader.frame_count()
        );
    }

    let mut source = ReplaySource::new(reader);
    tui::run_replay(&mut source, &shutdown)
}

fn cmd_record(pid: i32, output: &Path, sample_period_ms: u64, duration_secs: u64) -> Result<()> {
    let shutdown = install_shutdown_flag()?;
    let mut source =
        LiveSource::attach(pid, Duration::from_millis(sample_period_ms), Some(output))?;

    let deadline = (duration_secs > 0).then(|| Duration::from_secs(duration_secs));
    let start = Instant::now();
    let mut last_status = Instant::now();
    let mut frames: u64 = 0;

    eprintln!("Recording PID {pid} to {} ...", output.display());

    loop {
        if shutdown.load(Ordering::Relaxed) {
            eprintln!("Interrupted.");
            break;
        }
        if source.state() == SourceState::TargetExited {
            eprintln!("Process {pid} exited.");
            break;
        }
        if source.state() == SourceState::Error {
            bail!("sampling failed, see log output");
        }
        if deadline.is_some_and(|limit| start.elapsed() >= limit) {
            eprintln!("Duration limit reached.");
            break;
        }

        match source.next_frame() {
            Some(_) => frames += 1,
            None => std::thread::sleep(HEADLESS_IDLE_SLEEP),
        }

        if last_status.elapsed() >= HEADLESS_STATUS_INTERVAL {
            let bytes = std::fs::metadata(output).map_or(0, |m| m.len());
            #[allow(clippy::cast_precision_loss)]
            let kib = bytes as f64 / 1024.0;
            eprintln!("  [{}s] {frames} frames, {kib:.1} KiB", start.elapsed().as_secs());
            last_status = Instant::now();
        }
    }

    source.shutdown();
    eprintln!("Finished: {frames} frames written to {}", output.display());
    Ok(())
}

fn cmd_watch(sample_period_ms: u64, record: Option<&Path>) -> Result<()> {
    let shutdown = install_shutdown_flag()?;
    eprintln!("Waiting for a FEX process to appear...");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            bail!("interrupted while waiting for a FEX process");
        }
        if let Some(pid) = discovery::find_latest() {
            info!("found FEX process {pid}");
            eprintln!("Found FEX process with PID {pid}");
            return cmd_live(pid, sample_period_ms, record);
        }
        std::thread::sleep(WATCH_POLL_INTERVAL);
    }
}

fn cmd_pick(sample_period_ms: u64, record: Option<&Path>) -> Result<()> {
    let pids = discovery::find_all();

    let pid = match pids.as_slice() {
        [] => bail!("no running FEX processes found"),
        [only] => {
            eprintln!("Only one FEX process found: PID {only}  {}", discovery::cmdline(*only));
            *only
        }
        _ => {
            let ordered = discovery::print_process_tree(&pids);
            discovery::prompt_selection(&ordered)?
        }
    };

    cmd_live(pid, sample_period_ms, record)
}

fn cmd_export(input: &Path, output: &Path) -> Result<()> {
    let reader = RecordingReader::open(input)
        .with_context(|| format!("cannot open recording {}", input.display()))?;

    if reader.truncated() {
        eprintln!("Warning: recording is truncated, exporting recovered frames only.");
    }

    let file = std::fs::File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut out = std::io::BufWriter::new(file);
    export_csv(&reader, &mut out)?;

    eprintln!(
        "Exported {} frames from {} to {}",
        reader.frame_count(),
        input.display(),
        output.display()
    );
    Ok(())
}
