use crate::models::audio_models::{BackendType, CaptureDiagnostics, StreamFormat};
use crate::models::config::SessionOptions;
use crate::models::error::RecorderError;
use crate::models::state::RecorderState;

use super::sample_sink::SampleSink;

/// Lifecycle contract shared by every capture backend.
///
/// Calls arrive from one host thread; audio arrives on a driver thread the
/// recorder does not control.
pub trait Recorder: Send {
    fn backend_type(&self) -> BackendType;

    fn state(&self) -> RecorderState;

    /// Negotiated format, once initialized.
    fn format(&self) -> Option<StreamFormat>;

    fn diagnostics(&self) -> CaptureDiagnostics;

    /// Open the backend session for 16-bit PCM at the requested format.
    /// Transitions: uninitialized → initialized.
    fn init_recording(&mut self, sample_rate: u32, channels: u16) -> Result<(), RecorderError>;

    /// Begin delivering audio to the sink. Transitions: initialized → recording.
    fn start_recording(&mut self) -> Result<(), RecorderError>;

    /// Halt delivery and drain the backend. Transitions: recording → initialized/stopped.
    fn stop_recording(&mut self) -> Result<(), RecorderError>;

    /// Free every backend handle and close the sink. Transitions: any → released.
    fn release(&mut self) -> Result<(), RecorderError>;
}

/// Builds recorders for the session registry.
pub trait BackendFactory: Send {
    /// Construct a recorder for `backend` that writes into `sink`.
    ///
    /// Fails with `RecorderError::Create` when the backend engine cannot be built.
    fn create(
        &mut self,
        backend: BackendType,
        sink: Box<dyn SampleSink>,
        options: &SessionOptions,
    ) -> Result<Box<dyn Recorder>, RecorderError>;
}
