use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::error::RecorderError;
use crate::traits::sample_sink::SampleSink;

/// Append-only raw PCM file.
///
/// ## File Format
///
/// ```text
/// [interleaved 16-bit little-endian PCM...]
/// ```
///
/// No header is written; sample rate and channel count travel out-of-band.
/// The file is created (truncating) when the sink is opened and closed by
/// [`SampleSink::close`] or on drop.
pub struct FileSink {
    file_path: PathBuf,
    writer: Option<BufWriter<File>>,
    total_bytes_written: u64,
}

impl FileSink {
    /// Create the output file, including missing parent directories.
    pub fn create(file_path: impl Into<PathBuf>) -> Result<Self, RecorderError> {
        let file_path = file_path.into();

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    RecorderError::Storage(format!("failed to create directory: {}", e))
                })?;
            }
        }

        let file = File::create(&file_path)
            .map_err(|e| RecorderError::Storage(format!("failed to create file: {}", e)))?;

        log::info!("Opened PCM sink at {}", file_path.display());

        Ok(Self {
            file_path,
            writer: Some(BufWriter::new(file)),
            total_bytes_written: 0,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl SampleSink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), RecorderError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RecorderError::Storage("file is not open for writing".into()))?;
        writer
            .write_all(bytes)
            .map_err(|e| RecorderError::Storage(format!("write failed: {}", e)))?;
        self.total_bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        match self.writer.as_mut() {
            Some(writer) => writer
                .flush()
                .map_err(|e| RecorderError::Storage(format!("flush failed: {}", e))),
            None => Ok(()),
        }
    }

    fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    fn close(&mut self) -> Result<(), RecorderError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let file = writer
            .into_inner()
            .map_err(|e| RecorderError::Storage(format!("flush failed: {}", e.error())))?;
        file.sync_all()
            .map_err(|e| RecorderError::Storage(format!("sync failed: {}", e)))?;
        log::info!(
            "Closed PCM sink at {} ({} bytes)",
            self.file_path.display(),
            self.total_bytes_written
        );
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Failed to close {}: {}", self.file_path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.pcm");

        let mut sink = FileSink::create(&path).unwrap();
        sink.write(&[1, 2, 3, 4]).unwrap();
        sink.write(&[5, 6]).unwrap();
        assert_eq!(sink.bytes_written(), 6);
        sink.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn create_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.pcm");
        fs::write(&path, [9u8; 32]).unwrap();

        let mut sink = FileSink::create(&path).unwrap();
        sink.write(&[1, 2]).unwrap();
        sink.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![1, 2]);
    }

    #[test]
    fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcm_recorder").join("nested").join("a.pcm");

        let sink = FileSink::create(&path).unwrap();
        assert!(sink.is_open());
        assert!(path.exists());
    }

    #[test]
    fn write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::create(dir.path().join("a.pcm")).unwrap();
        sink.close().unwrap();

        assert!(matches!(sink.write(&[0, 0]), Err(RecorderError::Storage(_))));
        // Closing twice is harmless.
        assert!(sink.close().is_ok());
    }

    #[test]
    fn drop_flushes_buffered_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pcm");
        {
            let mut sink = FileSink::create(&path).unwrap();
            sink.write(&[7; 10]).unwrap();
        }
        assert_eq!(fs::read(&path).unwrap().len(), 10);
    }
}
