use pcm_recorder_core::models::audio_models::BackendType;
use pcm_recorder_core::models::config::SessionOptions;
use pcm_recorder_core::models::error::RecorderError;
use pcm_recorder_core::recorder::{
    AAudioRecorder, AudioRecordRecorder, OboeRecorder, OpenSlRecorder,
};
use pcm_recorder_core::traits::recorder::{BackendFactory, Recorder};
use pcm_recorder_core::traits::sample_sink::SampleSink;

use crate::blocking_read::CpalReadBackend;
use crate::buffer_queue::CpalBufferQueueEngine;
use crate::device;
use crate::stream::CpalStreamBackend;

/// Builds recorders that capture from real input devices through cpal.
///
/// The buffer-queue backend runs on [`CpalBufferQueueEngine`]; both push
/// backends run on [`CpalStreamBackend`] and the read-loop backend on
/// [`CpalReadBackend`].
#[derive(Debug, Default)]
pub struct CpalBackendFactory;

impl CpalBackendFactory {
    pub fn new() -> Self {
        Self
    }
}

impl BackendFactory for CpalBackendFactory {
    fn create(
        &mut self,
        backend: BackendType,
        sink: Box<dyn SampleSink>,
        options: &SessionOptions,
    ) -> Result<Box<dyn Recorder>, RecorderError> {
        let device_id = options.device_id.clone();
        if let Err(e) = device::resolve_input_device(device_id.as_deref()) {
            log::warn!("[{}] engine creation failed: {}", backend, e);
            return Err(RecorderError::Create(e.to_string()));
        }

        let recorder: Box<dyn Recorder> = match backend {
            BackendType::OpenSl => {
                let engine = CpalBufferQueueEngine::new().map_err(|e| {
                    log::warn!("[{}] engine creation failed: {}", backend, e);
                    RecorderError::Create(e.to_string())
                })?;
                Box::new(OpenSlRecorder::new(engine, sink).with_device(device_id))
            }
            BackendType::AAudio => {
                Box::new(AAudioRecorder::new(CpalStreamBackend::new(), sink).with_device(device_id))
            }
            BackendType::Oboe => {
                Box::new(OboeRecorder::new(CpalStreamBackend::new(), sink).with_device(device_id))
            }
            BackendType::AudioRecord => Box::new(
                AudioRecordRecorder::new(CpalReadBackend::new(), sink).with_device(device_id),
            ),
            BackendType::Undefined => {
                return Err(RecorderError::Create("undefined backend".into()));
            }
        };
        Ok(recorder)
    }
}
