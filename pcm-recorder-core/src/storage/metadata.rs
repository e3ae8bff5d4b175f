use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::RecorderError;
use crate::models::recording_result::RecordingMetadata;

/// Sidecar path for a recording: `{recording_path}.metadata.json`.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    let mut name = recording_path.as_os_str().to_owned();
    name.push(".metadata.json");
    PathBuf::from(name)
}

/// Write recording metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), RecorderError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RecorderError::Storage(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .map_err(|e| RecorderError::Storage(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, RecorderError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| RecorderError::Storage(format!("failed to read metadata: {}", e)))?;
    let metadata: RecordingMetadata = serde_json::from_str(&json)
        .map_err(|e| RecorderError::Storage(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, RecorderError> {
    let data = fs::read(path)
        .map_err(|e| RecorderError::Storage(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::{BackendType, StreamFormat};

    #[test]
    fn sidecar_sits_next_to_recording() {
        let path = Path::new("/tmp/pcm_recorder/_16000_1_42_.pcm");
        assert_eq!(
            metadata_path(path),
            PathBuf::from("/tmp/pcm_recorder/_16000_1_42_.pcm.metadata.json")
        );
    }

    #[test]
    fn metadata_round_trips_through_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("capture.pcm");
        fs::write(&recording, [0u8; 1600]).unwrap();

        let checksum = sha256_file(&recording).unwrap();
        let metadata = RecordingMetadata::new(
            BackendType::OpenSl,
            StreamFormat::negotiate(16_000, 1),
            1600,
            &recording.to_string_lossy(),
            &checksum,
        );
        write_metadata(&metadata, &recording).unwrap();

        let loaded = read_metadata(&recording).unwrap();
        assert_eq!(loaded, metadata);
        assert_eq!(loaded.frames, 800);
        approx::assert_relative_eq!(loaded.duration_secs, 0.05);
    }

    #[test]
    fn checksum_of_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pcm");
        fs::write(&path, b"").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn missing_sidecar_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_metadata(&dir.path().join("nothing.pcm")).unwrap_err();
        assert!(matches!(err, RecorderError::Storage(_)));
    }
}
