use crate::models::error::RecorderError;

/// Append-only destination for captured PCM bytes.
///
/// Writes are sequential: no seeking, no overwrite. A sink is owned by exactly
/// one recorder and is written from the driver's callback thread, so
/// implementations must not block indefinitely in `write`.
pub trait SampleSink: Send {
    /// Append `bytes` to the sink.
    fn write(&mut self, bytes: &[u8]) -> Result<(), RecorderError>;

    /// Push buffered bytes to the underlying destination.
    fn flush(&mut self) -> Result<(), RecorderError>;

    /// Total bytes accepted so far.
    fn bytes_written(&self) -> u64;

    /// Flush and release the destination. Further writes fail.
    fn close(&mut self) -> Result<(), RecorderError> {
        self.flush()
    }
}
