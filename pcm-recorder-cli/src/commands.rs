use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use pcm_recorder_core::{ResultCode, SessionOptions, SessionRegistry};
use pcm_recorder_cpal::{list_input_devices, CpalBackendFactory};

use crate::args::Args;

const RECORDINGS_FOLDER: &str = "pcm_recorder";

fn recordings_dir(output_dir: Option<&Path>) -> PathBuf {
    output_dir
        .map(Path::to_path_buf)
        .or_else(dirs_next::document_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(RECORDINGS_FOLDER)
}

/// `_<rate>_<channels>_<millis>_.pcm`
fn recording_file_name(sample_rate: i32, channels: i32, millis: i64) -> String {
    format!("_{}_{}_{}_.pcm", sample_rate, channels, millis)
}

fn capture_duration(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("invalid recording length: {} s", seconds))
}

fn check(code: ResultCode, op: &str) -> Result<()> {
    if !code.is_ok() {
        bail!("{} failed: {:?} ({})", op, code, code.as_i32());
    }
    Ok(())
}

pub fn list_devices() -> Result<()> {
    let devices = list_input_devices().context("failed to enumerate input devices")?;
    if devices.is_empty() {
        println!("No input devices found.");
    }
    for device in devices {
        println!(
            "{} {} ({} ch, {} Hz)",
            if device.is_default { "*" } else { " " },
            device.name,
            device.channels,
            device.sample_rate
        );
    }
    Ok(())
}

pub fn record(args: &Args) -> Result<()> {
    let duration = capture_duration(args.seconds)?;
    let dir = recordings_dir(args.output_dir.as_deref());
    let millis = chrono::Utc::now().timestamp_millis();
    let path = dir.join(recording_file_name(args.sample_rate, args.channels, millis));

    let options = SessionOptions {
        write_metadata: args.metadata,
        device_id: args.device.clone(),
    };
    let mut registry = SessionRegistry::with_options(CpalBackendFactory::new(), options);

    registry.select_backend(args.backend, &path);
    if !registry.is_active() {
        bail!("could not create a {} session for {}", args.backend, path.display());
    }

    if let Err(e) = capture(&mut registry, args, duration) {
        registry.release_recording();
        return Err(e);
    }

    let diagnostics = registry.diagnostics().unwrap_or_default();
    check(registry.release_recording(), "ReleaseRecording")?;

    println!("Saved {}", path.display());
    println!(
        "{} callbacks, {} frames, {} bytes, {} stray",
        diagnostics.callback_count,
        diagnostics.frames_written,
        diagnostics.bytes_written,
        diagnostics.stray_callbacks
    );
    Ok(())
}

fn capture(
    registry: &mut SessionRegistry<CpalBackendFactory>,
    args: &Args,
    duration: Duration,
) -> Result<()> {
    check(
        registry.init_recording(args.sample_rate, args.channels),
        "InitRecording",
    )?;
    if let Some(format) = registry.format() {
        log::info!(
            "Recording {} s at {} Hz, {} ch",
            args.seconds,
            format.sample_rate,
            format.channels
        );
    }

    check(registry.start_recording(), "StartRecording")?;
    thread::sleep(duration);
    check(registry.stop_recording(), "StopRecording")
}
