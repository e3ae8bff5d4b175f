use serde::{Deserialize, Serialize};

use super::audio_models::{BackendType, SampleFormat, StreamFormat};

/// Metadata describing a finished raw PCM recording.
///
/// The PCM file has no header, so this sidecar carries the format out-of-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub backend: BackendType,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub bytes_written: u64,
    pub frames: u64,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
}

impl RecordingMetadata {
    pub fn new(
        backend: BackendType,
        format: StreamFormat,
        bytes_written: u64,
        file_path: &str,
        checksum: &str,
    ) -> Self {
        let bytes_per_frame = format.bytes_per_frame() as u64;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            backend,
            sample_rate: format.sample_rate,
            channels: format.channels,
            sample_format: SampleFormat::I16,
            bytes_written,
            frames: if bytes_per_frame == 0 { 0 } else { bytes_written / bytes_per_frame },
            duration_secs: format.duration_secs(bytes_written),
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
