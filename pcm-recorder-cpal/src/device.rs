//! Input device enumeration and stream configuration.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BufferSize, Device, SampleFormat, StreamConfig, SupportedBufferSize};

use pcm_recorder_core::models::audio_models::PerformanceMode;
use pcm_recorder_core::models::config::StreamRequest;
use pcm_recorder_core::models::error::{DriverError, DriverErrorKind};

use crate::error::{configs_error, devices_error};

/// An input device as reported by the default host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub channels: u16,
    pub sample_rate: u32,
}

/// List input devices on the default host.
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, DriverError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host.input_devices().map_err(devices_error)? {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let (channels, sample_rate) = match device.default_input_config() {
            Ok(config) => (config.channels(), config.sample_rate().0),
            Err(e) => {
                log::debug!("No default input config for {}: {}", name, e);
                (0, 0)
            }
        };
        devices.push(InputDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            channels,
            sample_rate,
        });
    }
    Ok(devices)
}

/// Whether the default host exposes any input device at all.
pub fn has_input_device() -> bool {
    cpal::default_host().default_input_device().is_some()
}

/// Find the input device named `device_id`, or the default input device.
pub fn resolve_input_device(device_id: Option<&str>) -> Result<Device, DriverError> {
    let host = cpal::default_host();
    let device = match device_id {
        Some(name) => host
            .input_devices()
            .map_err(devices_error)?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| {
                DriverError::new(
                    DriverErrorKind::ContentNotFound,
                    format!("input device not found: {}", name),
                )
            })?,
        None => host.default_input_device().ok_or_else(|| {
            DriverError::new(
                DriverErrorKind::ResourceError,
                "no default input device available",
            )
        })?,
    };
    log::info!(
        "Selected input device: {}",
        device.name().unwrap_or_else(|_| "unknown".into())
    );
    Ok(device)
}

/// One supported configuration range, reduced to what format selection needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConfigRange {
    pub channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
    pub format: SampleFormat,
    pub buffer: SupportedBufferSize,
}

/// Pick the range serving `channels` at `sample_rate`, preferring native 16-bit input.
pub(crate) fn choose_range(
    ranges: &[ConfigRange],
    channels: u16,
    sample_rate: u32,
) -> Option<ConfigRange> {
    let matching = || {
        ranges.iter().filter(move |r| {
            r.channels == channels && r.min_rate <= sample_rate && sample_rate <= r.max_rate
        })
    };
    matching()
        .find(|r| r.format == SampleFormat::I16)
        .or_else(|| matching().find(|r| r.format == SampleFormat::F32))
        .copied()
}

/// Fixed buffer of `frames` when the device allows it, else the host default.
pub(crate) fn buffer_size_for(supported: &SupportedBufferSize, frames: u32) -> BufferSize {
    match supported {
        SupportedBufferSize::Range { min, max } if *min <= frames && frames <= *max => {
            BufferSize::Fixed(frames)
        }
        _ => BufferSize::Default,
    }
}

/// The supported range `device` would capture `request` from.
pub(crate) fn supported_range(
    device: &Device,
    request: &StreamRequest,
) -> Result<ConfigRange, DriverError> {
    let ranges: Vec<ConfigRange> = device
        .supported_input_configs()
        .map_err(configs_error)?
        .map(|r| ConfigRange {
            channels: r.channels(),
            min_rate: r.min_sample_rate().0,
            max_rate: r.max_sample_rate().0,
            format: r.sample_format(),
            buffer: *r.buffer_size(),
        })
        .collect();

    let format = request.format;
    choose_range(&ranges, format.channels, format.sample_rate).ok_or_else(|| {
        DriverError::new(
            DriverErrorKind::ContentUnsupported,
            format!(
                "device cannot capture {} Hz, {} ch as i16 or f32",
                format.sample_rate, format.channels
            ),
        )
    })
}

/// Smallest buffer the device reports for `range`, in frames.
pub(crate) fn min_buffer_frames(range: &ConfigRange) -> Option<u32> {
    match range.buffer {
        SupportedBufferSize::Range { min, .. } if min > 0 => Some(min),
        _ => None,
    }
}

/// Resolve a cpal stream config and sample format for `request` on `device`.
pub(crate) fn stream_config(
    device: &Device,
    request: &StreamRequest,
) -> Result<(StreamConfig, SampleFormat), DriverError> {
    let format = request.format;
    let range = supported_range(device, request)?;

    let buffer_size = match request.performance_mode {
        PerformanceMode::LowLatency => {
            buffer_size_for(&range.buffer, format.frames_per_buffer() as u32)
        }
        _ => BufferSize::Default,
    };

    let config = StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size,
    };
    log::debug!(
        "Stream config: {} Hz, {} ch, {:?}, {:?}",
        format.sample_rate,
        format.channels,
        range.format,
        config.buffer_size
    );
    Ok((config, range.format))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> ConfigRange {
        ConfigRange {
            channels,
            min_rate: min,
            max_rate: max,
            format,
            buffer: SupportedBufferSize::Range { min: 64, max: 4096 },
        }
    }

    #[test]
    fn prefers_native_i16() {
        let ranges = [
            range(1, 8_000, 48_000, SampleFormat::F32),
            range(1, 8_000, 48_000, SampleFormat::I16),
        ];
        let chosen = choose_range(&ranges, 1, 16_000).unwrap();
        assert_eq!(chosen.format, SampleFormat::I16);
    }

    #[test]
    fn falls_back_to_f32() {
        let ranges = [range(2, 44_100, 48_000, SampleFormat::F32)];
        let chosen = choose_range(&ranges, 2, 48_000).unwrap();
        assert_eq!(chosen.format, SampleFormat::F32);
    }

    #[test]
    fn no_match_for_wrong_channels_or_rate() {
        let ranges = [range(2, 44_100, 48_000, SampleFormat::I16)];
        assert!(choose_range(&ranges, 1, 48_000).is_none());
        assert!(choose_range(&ranges, 2, 16_000).is_none());
    }

    #[test]
    fn fixed_buffer_only_inside_device_range() {
        let supported = SupportedBufferSize::Range { min: 64, max: 4096 };
        assert_eq!(buffer_size_for(&supported, 160), BufferSize::Fixed(160));
        assert_eq!(buffer_size_for(&supported, 16), BufferSize::Default);
        assert_eq!(
            buffer_size_for(&SupportedBufferSize::Unknown, 160),
            BufferSize::Default
        );
    }

    #[test]
    fn minimum_buffer_comes_from_the_range() {
        let chosen = range(1, 8_000, 48_000, SampleFormat::I16);
        assert_eq!(min_buffer_frames(&chosen), Some(64));

        let unknown = ConfigRange {
            buffer: SupportedBufferSize::Unknown,
            ..chosen
        };
        assert_eq!(min_buffer_frames(&unknown), None);
    }
}
