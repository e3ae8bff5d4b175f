use super::audio_models::{
    ByteOrder, ChannelMask, Direction, PerformanceMode, SampleFormat, SharingMode, StreamFormat,
};

/// Everything a driver needs to open a capture session or stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub format: StreamFormat,
    pub sample_format: SampleFormat,
    pub byte_order: ByteOrder,
    pub performance_mode: PerformanceMode,
    pub sharing_mode: SharingMode,
    pub direction: Direction,

    /// Specific input device, or None for the system default.
    pub device_id: Option<String>,
}

impl StreamRequest {
    /// Low-latency shared input request for `format`.
    pub fn capture(format: StreamFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn channel_mask(&self) -> ChannelMask {
        self.format.channel_mask()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.format.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.format.channels) {
            return Err(format!("unsupported channel count: {}", self.format.channels));
        }
        if self.direction != Direction::Input {
            return Err("capture streams must use the input direction".into());
        }
        Ok(())
    }
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self {
            format: StreamFormat {
                sample_rate: super::audio_models::DEFAULT_SAMPLE_RATE,
                channels: 1,
            },
            sample_format: SampleFormat::I16,
            byte_order: ByteOrder::LittleEndian,
            performance_mode: PerformanceMode::LowLatency,
            sharing_mode: SharingMode::Shared,
            direction: Direction::Input,
            device_id: None,
        }
    }
}

/// Host-level options applied to every session a registry creates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Write a `.metadata.json` sidecar next to the recording on release.
    pub write_metadata: bool,

    /// Input device passed to the backend, or None for the default device.
    pub device_id: Option<String>,
}

impl SessionOptions {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(device) = &self.device_id {
            if device.trim().is_empty() {
                return Err("device id must not be empty".into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_is_low_latency_shared_input() {
        let request = StreamRequest::capture(StreamFormat::negotiate(48_000, 2));
        assert_eq!(request.sample_format, SampleFormat::I16);
        assert_eq!(request.byte_order, ByteOrder::LittleEndian);
        assert_eq!(request.performance_mode, PerformanceMode::LowLatency);
        assert_eq!(request.sharing_mode, SharingMode::Shared);
        assert_eq!(request.direction, Direction::Input);
        assert_eq!(request.channel_mask(), ChannelMask::FrontLeftRight);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn rejects_unsupported_channel_counts() {
        for channels in [0, 3, 8] {
            let request = StreamRequest::capture(StreamFormat::negotiate(16_000, channels));
            assert!(request.validate().is_err(), "channels = {}", channels);
        }
    }

    #[test]
    fn blank_device_id_is_rejected() {
        let options = SessionOptions {
            device_id: Some("  ".into()),
            ..Default::default()
        };
        assert!(options.validate().is_err());
        assert!(SessionOptions::default().validate().is_ok());
    }
}
