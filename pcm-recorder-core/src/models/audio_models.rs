use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target number of capture buffers delivered per second (10 ms buffers).
pub const BUFFERS_PER_SECOND: u32 = 100;

/// Number of buffers used by the explicit double-buffer discipline.
pub const QUEUE_BUFFER_COUNT: usize = 2;

/// Sample rate used when the requested rate is not supported.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Bytes per 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Capture backend selected by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Undefined,
    /// Double-buffered capture with an explicit buffer queue.
    OpenSl,
    /// Callback-driven stream; stopping closes the stream.
    AAudio,
    /// Callback-driven stream; stopping keeps the stream open.
    Oboe,
    /// Blocking reads on a capture thread owned by the recorder.
    AudioRecord,
}

impl BackendType {
    /// Host-facing integer code.
    pub fn code(self) -> i32 {
        match self {
            Self::Undefined => -1,
            Self::OpenSl => 0,
            Self::AAudio => 1,
            Self::Oboe => 2,
            Self::AudioRecord => 3,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::OpenSl,
            1 => Self::AAudio,
            2 => Self::Oboe,
            3 => Self::AudioRecord,
            _ => Self::Undefined,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::OpenSl => "opensl",
            Self::AAudio => "aaudio",
            Self::Oboe => "oboe",
            Self::AudioRecord => "audiorecord",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "opensl" | "opensl-es" | "buffer-queue" => Ok(Self::OpenSl),
            "aaudio" => Ok(Self::AAudio),
            "oboe" => Ok(Self::Oboe),
            "audiorecord" | "audio-record" | "read-loop" => Ok(Self::AudioRecord),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// PCM sample encoding. Only signed 16-bit is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    #[serde(rename = "s16le")]
    I16,
}

/// Byte order of samples written to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    LittleEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceMode {
    None,
    LowLatency,
    PowerSaving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharingMode {
    Exclusive,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// Speaker layout for the captured channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMask {
    FrontCenter,
    FrontLeftRight,
}

impl ChannelMask {
    /// Stereo for two channels, front-center otherwise.
    pub fn for_channels(channels: u16) -> Self {
        if channels == 2 {
            Self::FrontLeftRight
        } else {
            Self::FrontCenter
        }
    }
}

/// Sample rates the capture engines accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplingRate {
    Hz8000,
    Hz16000,
    Hz22050,
    Hz24000,
    Hz32000,
    Hz44100,
    Hz48000,
    Hz64000,
    Hz88200,
    Hz96000,
}

impl SamplingRate {
    pub const ALL: [SamplingRate; 10] = [
        Self::Hz8000,
        Self::Hz16000,
        Self::Hz22050,
        Self::Hz24000,
        Self::Hz32000,
        Self::Hz44100,
        Self::Hz48000,
        Self::Hz64000,
        Self::Hz88200,
        Self::Hz96000,
    ];

    pub fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8_000,
            Self::Hz16000 => 16_000,
            Self::Hz22050 => 22_050,
            Self::Hz24000 => 24_000,
            Self::Hz32000 => 32_000,
            Self::Hz44100 => 44_100,
            Self::Hz48000 => 48_000,
            Self::Hz64000 => 64_000,
            Self::Hz88200 => 88_200,
            Self::Hz96000 => 96_000,
        }
    }

    pub fn from_hz(hz: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|rate| rate.hz() == hz)
    }

    /// Exact match against the supported table, falling back to 16 kHz.
    pub fn negotiate(requested: u32) -> Self {
        match Self::from_hz(requested) {
            Some(rate) => rate,
            None => {
                log::warn!(
                    "Unsupported sample rate: {}, so set default value: {}",
                    requested,
                    DEFAULT_SAMPLE_RATE
                );
                Self::Hz16000
            }
        }
    }
}

/// Negotiated PCM stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    /// Resolve a requested format, applying the sample-rate fallback.
    pub fn negotiate(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: SamplingRate::negotiate(sample_rate).hz(),
            channels,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Frames in one 10 ms capture buffer.
    pub fn frames_per_buffer(&self) -> usize {
        (self.sample_rate / BUFFERS_PER_SECOND) as usize
    }

    /// Samples (all channels) in one capture buffer.
    pub fn samples_per_buffer(&self) -> usize {
        self.frames_per_buffer() * self.channels as usize
    }

    pub fn byte_len(&self, frames: usize) -> usize {
        frames * self.bytes_per_frame()
    }

    pub fn channel_mask(&self) -> ChannelMask {
        ChannelMask::for_channels(self.channels)
    }

    /// Duration of `bytes` of captured audio, in seconds.
    pub fn duration_secs(&self, bytes: u64) -> f64 {
        let bytes_per_second = self.sample_rate as u64 * self.bytes_per_frame() as u64;
        if bytes_per_second == 0 {
            return 0.0;
        }
        bytes as f64 / bytes_per_second as f64
    }
}

/// Counters shared between the capture callback and the host thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    pub callback_count: u64,
    pub frames_written: u64,
    pub bytes_written: u64,
    pub stray_callbacks: u64,
    pub enqueue_failures: u64,
    pub sink_write_failures: u64,
    /// Blocking reads that returned less than a full buffer.
    pub short_reads: u64,
    pub read_errors: u64,
    /// Buffers handed to the driver by the most recent pre-arm.
    pub prearm_enqueued: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_codes_round_trip() {
        for backend in [
            BackendType::OpenSl,
            BackendType::AAudio,
            BackendType::Oboe,
            BackendType::AudioRecord,
        ] {
            assert_eq!(BackendType::from_code(backend.code()), backend);
        }
        assert_eq!(BackendType::from_code(-1), BackendType::Undefined);
        assert_eq!(BackendType::from_code(7), BackendType::Undefined);
    }

    #[test]
    fn backend_parses_from_cli_names() {
        assert_eq!("OpenSL".parse::<BackendType>(), Ok(BackendType::OpenSl));
        assert_eq!("aaudio".parse::<BackendType>(), Ok(BackendType::AAudio));
        assert_eq!(
            "audio-record".parse::<BackendType>(),
            Ok(BackendType::AudioRecord)
        );
        assert!("pulse".parse::<BackendType>().is_err());
    }

    #[test]
    fn supported_rates_match_exactly() {
        assert_eq!(SamplingRate::negotiate(44_100), SamplingRate::Hz44100);
        assert_eq!(SamplingRate::negotiate(8_000).hz(), 8_000);
    }

    #[test]
    fn unsupported_rate_falls_back_to_16k() {
        assert_eq!(SamplingRate::negotiate(11_025).hz(), DEFAULT_SAMPLE_RATE);
        assert_eq!(StreamFormat::negotiate(0, 1).sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn buffer_sizes_follow_ten_ms_periods() {
        let mono = StreamFormat::negotiate(16_000, 1);
        assert_eq!(mono.frames_per_buffer(), 160);
        assert_eq!(mono.samples_per_buffer(), 160);
        assert_eq!(mono.byte_len(160), 320);

        let stereo = StreamFormat::negotiate(44_100, 2);
        assert_eq!(stereo.frames_per_buffer(), 441);
        assert_eq!(stereo.samples_per_buffer(), 882);
        assert_eq!(stereo.bytes_per_frame(), 4);
    }

    #[test]
    fn channel_mask_for_layouts() {
        assert_eq!(ChannelMask::for_channels(1), ChannelMask::FrontCenter);
        assert_eq!(ChannelMask::for_channels(2), ChannelMask::FrontLeftRight);
    }

    #[test]
    fn duration_from_bytes() {
        let format = StreamFormat::negotiate(16_000, 1);
        approx::assert_relative_eq!(format.duration_secs(32_000), 1.0);
        approx::assert_relative_eq!(format.duration_secs(1_600), 0.05);
    }
}
