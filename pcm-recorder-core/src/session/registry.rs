use std::path::{Path, PathBuf};

use crate::models::audio_models::{BackendType, CaptureDiagnostics, StreamFormat};
use crate::models::config::SessionOptions;
use crate::models::error::{RecorderError, ResultCode};
use crate::models::recording_result::RecordingMetadata;
use crate::models::state::RecorderState;
use crate::storage::file_sink::FileSink;
use crate::storage::metadata;
use crate::traits::recorder::{BackendFactory, Recorder};
use crate::traits::sample_sink::SampleSink;

struct ActiveSession {
    backend: BackendType,
    recorder: Box<dyn Recorder>,
    output_path: Option<PathBuf>,
}

/// Host-facing entry point holding at most one active recorder.
///
/// Every lifecycle call maps the recorder's `Result` to a [`ResultCode`];
/// with no active session each returns [`ResultCode::NoSession`].
///
/// ```text
/// select_backend → init_recording → start_recording ⇄ stop_recording → release_recording
/// ```
pub struct SessionRegistry<F: BackendFactory> {
    factory: F,
    options: SessionOptions,
    active: Option<ActiveSession>,
}

impl<F: BackendFactory> SessionRegistry<F> {
    pub fn new(factory: F) -> Self {
        Self::with_options(factory, SessionOptions::default())
    }

    pub fn with_options(factory: F, options: SessionOptions) -> Self {
        Self {
            factory,
            options,
            active: None,
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Backend of the active session, or `Undefined` when there is none.
    pub fn active_backend(&self) -> BackendType {
        self.active
            .as_ref()
            .map_or(BackendType::Undefined, |s| s.backend)
    }

    pub fn state(&self) -> Option<RecorderState> {
        self.active.as_ref().map(|s| s.recorder.state())
    }

    pub fn format(&self) -> Option<StreamFormat> {
        self.active.as_ref().and_then(|s| s.recorder.format())
    }

    pub fn diagnostics(&self) -> Option<CaptureDiagnostics> {
        self.active.as_ref().map(|s| s.recorder.diagnostics())
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.active.as_ref().and_then(|s| s.output_path.as_deref())
    }

    /// Open `output_path` and create a recorder for `backend` writing into it.
    ///
    /// Failures are logged and leave the registry empty.
    pub fn select_backend(&mut self, backend: BackendType, output_path: impl AsRef<Path>) {
        let output_path = output_path.as_ref();
        log::info!("SelectBackend: {} -> {}", backend, output_path.display());
        if !self.can_select(backend) {
            return;
        }

        let sink = match FileSink::create(output_path) {
            Ok(sink) => sink,
            Err(e) => {
                log::error!("SelectBackend: cannot open {}: {}", output_path.display(), e);
                return;
            }
        };
        self.install(backend, Box::new(sink), Some(output_path.to_path_buf()));
    }

    /// Like [`select_backend`](Self::select_backend) with a caller-supplied sink.
    pub fn select_backend_with_sink(&mut self, backend: BackendType, sink: Box<dyn SampleSink>) {
        log::info!("SelectBackend: {} -> custom sink", backend);
        if self.can_select(backend) {
            self.install(backend, sink, None);
        }
    }

    fn can_select(&self, backend: BackendType) -> bool {
        if let Some(active) = &self.active {
            log::warn!(
                "SelectBackend ignored: {} session is still active",
                active.backend
            );
            return false;
        }
        if backend == BackendType::Undefined {
            log::warn!("SelectBackend ignored: undefined backend");
            return false;
        }
        if let Err(e) = self.options.validate() {
            log::warn!("SelectBackend ignored: {}", e);
            return false;
        }
        true
    }

    fn install(
        &mut self,
        backend: BackendType,
        sink: Box<dyn SampleSink>,
        output_path: Option<PathBuf>,
    ) {
        match self.factory.create(backend, sink, &self.options) {
            Ok(recorder) => {
                self.active = Some(ActiveSession {
                    backend,
                    recorder,
                    output_path,
                });
            }
            Err(e) => log::error!("SelectBackend: cannot create {} recorder: {}", backend, e),
        }
    }

    fn session_mut(&mut self, op: &str) -> Option<&mut ActiveSession> {
        if self.active.is_none() {
            log::warn!("{}: no active session", op);
        }
        self.active.as_mut()
    }

    pub fn init_recording(&mut self, sample_rate: i32, channels: i32) -> ResultCode {
        let Some(session) = self.session_mut("InitRecording") else {
            return ResultCode::NoSession;
        };
        let (Ok(sample_rate), Ok(channels)) = (u32::try_from(sample_rate), u16::try_from(channels))
        else {
            log::warn!(
                "InitRecording: invalid arguments {} Hz, {} ch",
                sample_rate,
                channels
            );
            return ResultCode::InitError;
        };
        session.recorder.init_recording(sample_rate, channels).into()
    }

    pub fn start_recording(&mut self) -> ResultCode {
        match self.session_mut("StartRecording") {
            Some(session) => session.recorder.start_recording().into(),
            None => ResultCode::NoSession,
        }
    }

    pub fn stop_recording(&mut self) -> ResultCode {
        match self.session_mut("StopRecording") {
            Some(session) => session.recorder.stop_recording().into(),
            None => ResultCode::NoSession,
        }
    }

    /// Release the active recorder. The registry forgets it whatever the outcome.
    pub fn release_recording(&mut self) -> ResultCode {
        let Some(mut session) = self.active.take() else {
            log::warn!("ReleaseRecording: no active session");
            return ResultCode::NoSession;
        };

        let format = session.recorder.format();
        let result = session.recorder.release();
        let bytes_written = session.recorder.diagnostics().bytes_written;
        drop(session.recorder);

        if let Err(e) = &result {
            log::warn!("ReleaseRecording [{}]: {}", session.backend, e);
            return ResultCode::from(result);
        }

        if self.options.write_metadata {
            if let (Some(path), Some(format)) = (session.output_path.as_deref(), format) {
                if let Err(e) = write_sidecar(session.backend, format, bytes_written, path) {
                    log::error!("ReleaseRecording: metadata sidecar failed: {}", e);
                    return e.code();
                }
            }
        }
        ResultCode::NoError
    }
}

fn write_sidecar(
    backend: BackendType,
    format: StreamFormat,
    bytes_written: u64,
    path: &Path,
) -> Result<(), RecorderError> {
    let checksum = metadata::sha256_file(path)?;
    let meta = RecordingMetadata::new(
        backend,
        format,
        bytes_written,
        &path.to_string_lossy(),
        &checksum,
    );
    metadata::write_metadata(&meta, path)?;
    log::info!(
        "Wrote metadata for {} ({} bytes)",
        path.display(),
        bytes_written
    );
    Ok(())
}

impl<F: BackendFactory> Drop for SessionRegistry<F> {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.release_recording();
        }
    }
}
