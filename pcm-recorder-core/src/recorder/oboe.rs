use crate::models::audio_models::{BackendType, CaptureDiagnostics, StreamFormat};
use crate::models::error::RecorderError;
use crate::models::state::RecorderState;
use crate::traits::recorder::Recorder;
use crate::traits::sample_sink::SampleSink;
use crate::traits::stream::{AudioStream, StreamBackend};

use super::shared::RecorderCore;
use super::stream_capture::{close_stream, flush_sink, open_stream, start_stream};

/// Push-style recorder that keeps its stream open between captures.
///
/// Stop only pauses the stream and returns to `Initialized`, so the next
/// start reuses the same stream.
pub struct OboeRecorder<B: StreamBackend> {
    core: RecorderCore,
    driver: B,
    stream: Option<B::Stream>,
    format: Option<StreamFormat>,
    device_id: Option<String>,
}

impl<B: StreamBackend> OboeRecorder<B> {
    pub fn new(driver: B, sink: Box<dyn SampleSink>) -> Self {
        log::info!("=== OboeRecorder created ===");
        Self {
            core: RecorderCore::new(BackendType::Oboe, sink),
            driver,
            stream: None,
            format: None,
            device_id: None,
        }
    }

    pub fn with_device(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn has_open_stream(&self) -> bool {
        self.stream.is_some()
    }
}

impl<B: StreamBackend> Recorder for OboeRecorder<B> {
    fn backend_type(&self) -> BackendType {
        BackendType::Oboe
    }

    fn state(&self) -> RecorderState {
        self.core.state()
    }

    fn format(&self) -> Option<StreamFormat> {
        self.format
    }

    fn diagnostics(&self) -> CaptureDiagnostics {
        self.core.diagnostics()
    }

    fn init_recording(&mut self, sample_rate: u32, channels: u16) -> Result<(), RecorderError> {
        if self.core.state().is_initialized() {
            log::info!("[Oboe] InitRecording: already initialized");
            return Ok(());
        }
        self.core.require(RecorderState::Uninitialized, "InitRecording")?;

        let (stream, format) = open_stream(
            &mut self.driver,
            &self.core.shared,
            BackendType::Oboe,
            sample_rate,
            channels,
            self.device_id.clone(),
        )?;
        self.stream = Some(stream);
        self.format = Some(format);
        self.core.set_state(RecorderState::Initialized);
        Ok(())
    }

    fn start_recording(&mut self) -> Result<(), RecorderError> {
        log::info!("[Oboe] StartRecording ....");
        if self.core.state().is_recording() {
            log::warn!("[Oboe] StartRecording: already recording");
            return Err(RecorderError::StartRecording("already recording".into()));
        }
        self.core.require(RecorderState::Initialized, "StartRecording")?;
        start_stream(&self.core, self.stream.as_mut())
    }

    fn stop_recording(&mut self) -> Result<(), RecorderError> {
        log::info!("[Oboe] StopRecording ...");
        self.core.require(RecorderState::Recording, "StopRecording")?;

        // A stream that refused to stop is still delivering; stay Recording so Stop can be retried.
        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.request_stop() {
                log::warn!("[Oboe] StopRecording requestStop error: {}", e);
                return Err(RecorderError::Stop(format!("request stop failed: {}", e)));
            }
        }

        self.core.set_state(RecorderState::Initialized);
        flush_sink(&self.core);
        Ok(())
    }

    fn release(&mut self) -> Result<(), RecorderError> {
        if self.core.state().is_released() {
            return Ok(());
        }
        if self.core.state().is_recording() {
            if let Err(e) = self.stop_recording() {
                log::warn!("[Oboe] Stop during release failed: {}", e);
            }
        }
        if let Some(stream) = self.stream.take() {
            let _ = close_stream(BackendType::Oboe, stream);
        }
        self.core.release_sink()
    }
}

impl<B: StreamBackend> Drop for OboeRecorder<B> {
    fn drop(&mut self) {
        log::info!("=== OboeRecorder dropped ===");
        if let Err(e) = self.release() {
            log::error!("Release on drop failed: {}", e);
        }
    }
}
