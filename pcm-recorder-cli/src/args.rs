use std::path::PathBuf;

use clap::Parser;

use pcm_recorder_core::BackendType;

/// Record raw 16-bit PCM from an input device.
#[derive(Debug, Parser)]
#[command(name = "pcm-recorder", version, about)]
pub struct Args {
    /// Capture backend: opensl (double-buffered queue), aaudio or oboe (callback stream),
    /// audiorecord (blocking reads on a capture thread).
    #[arg(short, long, default_value = "opensl")]
    pub backend: BackendType,

    /// Requested sample rate in Hz. Unsupported rates fall back to 16000.
    #[arg(short = 'r', long, default_value_t = 16_000)]
    pub sample_rate: i32,

    /// Channel count, 1 or 2.
    #[arg(short, long, default_value_t = 1)]
    pub channels: i32,

    /// Recording length in seconds.
    #[arg(short, long, default_value_t = 5.0)]
    pub seconds: f64,

    /// Directory receiving the `pcm_recorder/` folder. Defaults to the documents directory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Input device name. Defaults to the system input device.
    #[arg(short, long)]
    pub device: Option<String>,

    /// Write a `.metadata.json` sidecar next to the recording.
    #[arg(short, long)]
    pub metadata: bool,

    /// List input devices and exit.
    #[arg(long)]
    pub list_devices: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_short_mono_capture() {
        let args = Args::try_parse_from(["pcm-recorder"]).unwrap();
        assert_eq!(args.backend, BackendType::OpenSl);
        assert_eq!(args.sample_rate, 16_000);
        assert_eq!(args.channels, 1);
        assert!(!args.metadata);
        assert!(args.output_dir.is_none());
    }

    #[test]
    fn parses_backend_names() {
        let args =
            Args::try_parse_from(["pcm-recorder", "--backend", "oboe", "-r", "48000", "-c", "2"])
                .unwrap();
        assert_eq!(args.backend, BackendType::Oboe);
        assert_eq!(args.sample_rate, 48_000);
        assert_eq!(args.channels, 2);

        let args = Args::try_parse_from(["pcm-recorder", "--backend", "audiorecord"]).unwrap();
        assert_eq!(args.backend, BackendType::AudioRecord);
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(Args::try_parse_from(["pcm-recorder", "--backend", "wasapi"]).is_err());
    }
}
