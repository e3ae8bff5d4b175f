use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{BackendType, CaptureDiagnostics};
use crate::models::error::RecorderError;
use crate::models::state::RecorderState;
use crate::traits::sample_sink::SampleSink;

/// State touched by both the host thread and the driver's callback thread.
///
/// The callback holds the lock for its state check and its sink write, so
/// taking the lock on the host side waits for an in-flight write to finish.
pub(crate) struct CaptureShared {
    pub(crate) state: RecorderState,
    pub(crate) sink: Option<Box<dyn SampleSink>>,
    pub(crate) diagnostics: CaptureDiagnostics,
}

impl CaptureShared {
    /// Count a callback that arrived outside the recording state.
    pub(crate) fn discard_stray(&mut self, backend: BackendType) {
        self.diagnostics.stray_callbacks += 1;
        log::debug!(
            "[{}] Buffer callback in non-recording state: {}",
            backend,
            self.state.as_str()
        );
    }

    /// Append `bytes` covering `frames` frames to the sink.
    pub(crate) fn write(&mut self, bytes: &[u8], frames: usize) {
        self.diagnostics.callback_count += 1;
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        match sink.write(bytes) {
            Ok(()) => {
                self.diagnostics.frames_written += frames as u64;
                self.diagnostics.bytes_written += bytes.len() as u64;
            }
            Err(e) => {
                self.diagnostics.sink_write_failures += 1;
                log::error!("Failed to write audio data: {}", e);
            }
        }
    }
}

pub(crate) type SharedCapture = Arc<Mutex<CaptureShared>>;

/// Host-side half of a recorder: the backend tag plus the shared capture state.
pub(crate) struct RecorderCore {
    pub(crate) backend: BackendType,
    pub(crate) shared: SharedCapture,
}

impl RecorderCore {
    pub(crate) fn new(backend: BackendType, sink: Box<dyn SampleSink>) -> Self {
        Self {
            backend,
            shared: Arc::new(Mutex::new(CaptureShared {
                state: RecorderState::Uninitialized,
                sink: Some(sink),
                diagnostics: CaptureDiagnostics::default(),
            })),
        }
    }

    pub(crate) fn state(&self) -> RecorderState {
        self.shared.lock().state
    }

    /// Transition under the shared lock; acts as the barrier against the callback.
    pub(crate) fn set_state(&self, state: RecorderState) {
        let mut shared = self.shared.lock();
        if shared.state != state {
            log::info!(
                "[{}] {} -> {}",
                self.backend,
                shared.state.as_str(),
                state.as_str()
            );
        }
        shared.state = state;
    }

    pub(crate) fn diagnostics(&self) -> CaptureDiagnostics {
        self.shared.lock().diagnostics.clone()
    }

    pub(crate) fn require(&self, expected: RecorderState, op: &str) -> Result<(), RecorderError> {
        let state = self.state();
        if state != expected {
            log::warn!(
                "[{}] {} error, invalid state: {}",
                self.backend,
                op,
                state.as_str()
            );
            return Err(RecorderError::State(format!(
                "{} requires {} state, recorder is {}",
                op,
                expected.as_str(),
                state.as_str()
            )));
        }
        Ok(())
    }

    /// Mark the recorder released and close the sink outside the lock.
    ///
    /// Callers must have unregistered or closed the driver callback first.
    pub(crate) fn release_sink(&self) -> Result<(), RecorderError> {
        let sink = {
            let mut shared = self.shared.lock();
            shared.state = RecorderState::Released;
            shared.sink.take()
        };
        match sink {
            Some(mut sink) => sink.close().map_err(|e| {
                log::error!("[{}] Failed to close sample sink: {}", self.backend, e);
                e
            }),
            None => Ok(()),
        }
    }
}
