//! In-process drivers for exercising recorders without audio hardware.
//!
//! Each driver is paired with a controller that injects audio, forces late
//! callbacks, injects failures and counts live driver handles.

pub mod blocking_read;
pub mod buffer_queue;
pub mod sink;
pub mod stream;

pub use blocking_read::{
    ReadFaults, SimulatedReadBackend, SimulatedReadController, SimulatedReadSource,
};
pub use buffer_queue::{
    QueueFaults, SimulatedBufferQueueEngine, SimulatedBufferQueueRecorder,
    SimulatedQueueController,
};
pub use sink::SharedMemorySink;
pub use stream::{SimulatedStream, SimulatedStreamBackend, SimulatedStreamController, StreamFaults};

use crate::models::audio_models::BackendType;
use crate::models::config::SessionOptions;
use crate::models::error::RecorderError;
use crate::recorder::{AAudioRecorder, AudioRecordRecorder, OboeRecorder, OpenSlRecorder};
use crate::traits::recorder::{BackendFactory, Recorder};
use crate::traits::sample_sink::SampleSink;

/// Builds recorders on top of the simulated drivers.
#[derive(Clone, Default)]
pub struct SimulatedBackendFactory {
    pub queue: SimulatedQueueController,
    pub stream: SimulatedStreamController,
    pub read: SimulatedReadController,
    /// Make the next `create` calls fail as if the engine could not be built.
    pub fail_create: bool,
    created: usize,
}

impl SimulatedBackendFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorders successfully created so far.
    pub fn created(&self) -> usize {
        self.created
    }
}

impl BackendFactory for SimulatedBackendFactory {
    fn create(
        &mut self,
        backend: BackendType,
        sink: Box<dyn SampleSink>,
        options: &SessionOptions,
    ) -> Result<Box<dyn Recorder>, RecorderError> {
        if self.fail_create {
            log::warn!("[{}] simulated engine creation failure", backend);
            return Err(RecorderError::Create(format!(
                "simulated {} engine creation failure",
                backend
            )));
        }

        let device = options.device_id.clone();
        let recorder: Box<dyn Recorder> = match backend {
            BackendType::OpenSl => Box::new(
                OpenSlRecorder::new(self.queue.engine(), sink).with_device(device),
            ),
            BackendType::AAudio => Box::new(
                AAudioRecorder::new(self.stream.backend(), sink).with_device(device),
            ),
            BackendType::Oboe => Box::new(
                OboeRecorder::new(self.stream.backend(), sink).with_device(device),
            ),
            BackendType::AudioRecord => Box::new(
                AudioRecordRecorder::new(self.read.backend(), sink).with_device(device),
            ),
            BackendType::Undefined => {
                return Err(RecorderError::Create("undefined backend".into()));
            }
        };
        self.created += 1;
        Ok(recorder)
    }
}
