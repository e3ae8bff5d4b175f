use crate::models::audio_models::StreamFormat;
use crate::models::config::StreamRequest;
use crate::models::error::DriverError;

/// A capture source the recorder pulls from with blocking reads.
///
/// The recorder owns the thread that calls [`read`](Self::read); the driver
/// only fills the slice it is handed.
pub trait BlockingSource: Send + 'static {
    /// The format reads deliver.
    fn format(&self) -> StreamFormat;

    fn start(&mut self) -> Result<(), DriverError>;

    fn stop(&mut self) -> Result<(), DriverError>;

    fn is_recording(&self) -> bool;

    /// Block until `out` is full or the driver's read timeout elapses.
    ///
    /// Returns the number of samples written to the front of `out`. Less than
    /// `out.len()` is a short read; zero means nothing arrived in time.
    fn read(&mut self, out: &mut [i16]) -> Result<usize, DriverError>;

    /// Free the hardware handle. Calling it twice is harmless.
    fn release(&mut self);
}

/// Opens [`BlockingSource`]s.
pub trait BlockingReadBackend: Send {
    type Source: BlockingSource;

    /// Smallest hardware buffer, in bytes, the driver accepts for `request`.
    fn min_buffer_bytes(&self, request: &StreamRequest) -> Result<usize, DriverError>;

    /// Open a source whose hardware buffer holds `buffer_bytes`.
    fn open_source(
        &mut self,
        request: &StreamRequest,
        buffer_bytes: usize,
    ) -> Result<Self::Source, DriverError>;
}
