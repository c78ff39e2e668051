//! Interactive trial recorder: binds a dataset, records trials on command and
//! browses recorded ones.

use anyhow::Context;
use clap::Parser;
use dialoguer::Input;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use trialrec_capture::capture::monitor_size;
use trialrec_capture::command::{parse_trial_input, ShellCommand, HELP};
use trialrec_capture::config::PointerSetting;
use trialrec_capture::viewer::{self, ViewerExit};
use trialrec_capture::{
    Config, Dataset, JpegWriter, MonitorSourceFactory, Playback, SharedCapture, SystemClock,
    TrialRecorder, TrialSummary,
};
use trialrec_input::{
    resolve_device, DeviceRole, EvdevHook, HookHandle, HookHandler, InputHook, PointerMode,
};

const FALLBACK_BOUNDS: (u32, u32) = (1920, 1080);

#[derive(Parser)]
#[command(name = "trialrec")]
#[command(about = "Record screen frames paired with keyboard and mouse events, in trials")]
#[command(version)]
struct Cli {
    /// Dataset folder to bind at startup (prompted for otherwise)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Capture rate in frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Record raw pointer deltas instead of absolute positions
    #[arg(long)]
    raw_pointer: bool,

    /// Keyboard device path (optional, will prompt if not provided)
    #[arg(long)]
    keyboard: Option<String>,

    /// Mouse device path (optional, will prompt if not provided)
    #[arg(long)]
    mouse: Option<String>,

    /// Monitor to capture (defaults to the primary monitor)
    #[arg(long)]
    monitor: Option<String>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only show errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "trialrec={},trialrec_capture={},trialrec_input={}",
            level, level, level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(dataset) = &cli.dataset {
        config.dataset.root = Some(dataset.clone());
    }
    if let Some(fps) = cli.fps {
        config.capture.fps = fps;
    }
    if cli.raw_pointer {
        config.input.pointer_mode = PointerSetting::Raw;
    }
    if let Some(path) = &cli.keyboard {
        config.input.keyboard_device = Some(path.clone());
    }
    if let Some(path) = &cli.mouse {
        config.input.mouse_device = Some(path.clone());
    }
    if let Some(name) = &cli.monitor {
        config.capture.monitor = Some(name.clone());
    }
}

fn lock(recorder: &Mutex<TrialRecorder>) -> MutexGuard<'_, TrialRecorder> {
    recorder.lock().unwrap_or_else(PoisonError::into_inner)
}

fn attach_hooks(config: &Config, handler: Arc<dyn HookHandler>) -> anyhow::Result<Vec<HookHandle>> {
    let bounds = match monitor_size(config.capture.monitor.as_deref()) {
        Ok(bounds) => bounds,
        Err(e) => {
            warn!("Using {:?} pointer bounds: {}", FALLBACK_BOUNDS, e);
            FALLBACK_BOUNDS
        }
    };
    let mode: PointerMode = config.input.pointer_mode.into();

    let keyboard = resolve_device(config.input.keyboard_device.as_deref(), DeviceRole::Keyboard)
        .context("No keyboard device")?;
    println!("Keyboard: {}", keyboard.name().unwrap_or("Unknown"));
    let mouse = resolve_device(config.input.mouse_device.as_deref(), DeviceRole::Pointer)
        .context("No mouse device")?;
    println!("Mouse: {}", mouse.name().unwrap_or("Unknown"));

    let mut handles = Vec::new();
    for device in [keyboard, mouse] {
        let hook: Box<dyn InputHook> = Box::new(EvdevHook::new(device, mode, bounds));
        handles.push(hook.subscribe(Arc::clone(&handler))?);
    }
    Ok(handles)
}

fn bind_dataset(recorder: &Mutex<TrialRecorder>, path: &Path) -> trialrec_capture::Result<()> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let dataset = Dataset::open(&path)?;
    let mut recorder = lock(recorder);
    let trials = recorder.bind_dataset(dataset)?;
    if trials > 0 {
        println!(
            "Found existing dataset with {} trials. Next trial is #{}.",
            trials,
            recorder.next_trial_number()
        );
    } else {
        println!("No existing trials found. Starting at trial #0.");
    }
    println!("Dataset folder is ready: {}", path.display());
    Ok(())
}

fn prompt_dataset(recorder: &Mutex<TrialRecorder>) -> anyhow::Result<()> {
    loop {
        let name: String = Input::new()
            .with_prompt("Enter dataset name")
            .validate_with(|input: &String| -> Result<(), &str> {
                if input.trim().is_empty() {
                    Err("Dataset name cannot be empty.")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
        match bind_dataset(recorder, Path::new(name.trim())) {
            Ok(()) => return Ok(()),
            Err(e) => eprintln!("Warning: {}", e),
        }
    }
}

fn print_summary(summary: &TrialSummary) {
    println!(
        "Trial {} saved: {} frames -> {}",
        summary.trial,
        summary.frames,
        summary.log_path.display()
    );
}

fn visualize(recorder: &Mutex<TrialRecorder>) -> anyhow::Result<()> {
    let dataset = {
        let recorder = lock(recorder);
        if recorder.is_recording() {
            eprintln!("Warning: stop the current trial before browsing.");
            return Ok(());
        }
        match recorder.dataset() {
            Some(dataset) => dataset.clone(),
            None => {
                eprintln!("Warning: {}", trialrec_capture::Error::NoDataset);
                return Ok(());
            }
        }
    };

    let answer: String = Input::new()
        .with_prompt("Enter trial number to visualize (leave blank for last trial)")
        .allow_empty(true)
        .interact_text()?;
    let playback = parse_trial_input(&answer).and_then(|trial| Playback::open(&dataset, trial));
    let mut playback = match playback {
        Ok(playback) => playback,
        Err(e) => {
            eprintln!("Warning: {}", e);
            return Ok(());
        }
    };

    let exit = viewer::run(&mut playback);
    println!("Visualization mode ended.");
    if let ViewerExit::FrameUnavailable(e) = exit? {
        eprintln!("Warning: {}", e);
    }
    Ok(())
}

fn warning(context: &str, error: &anyhow::Error) -> String {
    format!("Warning: {}: {:#}", context, error)
}

/// Print a failed shell command as a warning so the command loop keeps going.
fn report(context: &str, result: anyhow::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("{}", warning(context, &e));
            false
        }
    }
}

fn warn_stopped_hooks(hooks: &[HookHandle]) {
    for hook in hooks.iter().filter(|hook| !hook.is_running()) {
        eprintln!("Warning: input device {} is no longer delivering events.", hook.label());
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load();
    apply_overrides(&mut config, &cli);

    if cli.write_config {
        let path = config.save()?;
        println!("Wrote config to {}", path.display());
        return Ok(());
    }

    let capture = SharedCapture::new(Arc::new(SystemClock));
    let recorder = TrialRecorder::new(
        capture,
        config.trial_settings(),
        Arc::new(MonitorSourceFactory {
            name: config.capture.monitor.clone(),
        }),
        Arc::new(JpegWriter::new(config.capture.quality)),
    );
    let handler: Arc<dyn HookHandler> = Arc::new(recorder.ingestor());
    let hooks = attach_hooks(&config, handler)?;

    let recorder = Arc::new(Mutex::new(recorder));
    let recorder_ctrlc = Arc::clone(&recorder);
    ctrlc::set_handler(move || {
        let mut recorder = lock(&recorder_ctrlc);
        if recorder.is_recording() {
            match recorder.stop() {
                Ok(summary) => print_summary(&summary),
                Err(e) => eprintln!("Warning: failed to save trial: {}", e),
            }
        }
        std::process::exit(0);
    })?;

    let bound = match &config.dataset.root {
        Some(root) => match bind_dataset(&recorder, root) {
            Ok(()) => true,
            Err(e) => {
                eprintln!("Warning: {}", e);
                false
            }
        },
        None => false,
    };
    if !bound && !report("no dataset bound", prompt_dataset(&recorder)) {
        println!("Type n to choose a dataset.");
    }

    println!("{}", HELP);
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<ShellCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("Warning: {}", e);
                continue;
            }
        };

        match command {
            ShellCommand::Start => {
                warn_stopped_hooks(&hooks);
                match lock(&recorder).start() {
                    Ok(trial) => println!("Trial {} started. Type q to stop.", trial),
                    Err(e) => eprintln!("Warning: {}", e),
                }
            }
            ShellCommand::Stop => match lock(&recorder).stop() {
                Ok(summary) => print_summary(&summary),
                Err(e) => eprintln!("Warning: {}", e),
            },
            ShellCommand::ResetDataset => {
                if lock(&recorder).is_recording() {
                    eprintln!("Warning: stop the current trial before changing datasets.");
                } else {
                    report("dataset unchanged", prompt_dataset(&recorder));
                }
            }
            ShellCommand::Visualize => {
                report("visualization failed", visualize(&recorder));
            }
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Exit => {
                if lock(&recorder).is_recording() {
                    eprintln!("Warning: stop the current trial before exiting.");
                } else {
                    break;
                }
            }
        }
    }

    let mut recorder = lock(&recorder);
    if recorder.is_recording() {
        let summary = recorder.stop()?;
        print_summary(&summary);
    }
    println!("Exiting.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failures_become_warnings() {
        let not_a_tty = anyhow::Error::new(io::Error::new(io::ErrorKind::Other, "not a terminal"));
        assert!(!report("visualization failed", Err(not_a_tty)));
        assert!(report("visualization failed", Ok(())));

        let err = anyhow::anyhow!("prompt closed");
        assert_eq!(
            warning("dataset unchanged", &err),
            "Warning: dataset unchanged: prompt closed"
        );
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from(["trialrec", "--fps", "10", "--raw-pointer", "-d", "data"]);
        let mut config = Config::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.capture.fps, 10);
        assert_eq!(config.input.pointer_mode, PointerSetting::Raw);
        assert_eq!(config.dataset.root, Some(PathBuf::from("data")));
    }
}
