//! # pcm-recorder-core
//!
//! Platform-agnostic PCM capture core.
//!
//! Drives audio input through one of four recorders and streams raw 16-bit
//! little-endian PCM into a sink. Hardware adapters implement the driver
//! traits (`BufferQueueEngine`, `StreamBackend` or `BlockingReadBackend`) and a
//! `BackendFactory` that plugs into the `SessionRegistry`.
//!
//! ## Architecture
//!
//! ```text
//! pcm-recorder-core (this crate)
//! ├── traits/       ← Recorder, BackendFactory, BufferQueue*, StreamBackend, BlockingSource, SampleSink
//! ├── models/       ← RecorderError, ResultCode, RecorderState, StreamFormat, BackendType
//! ├── processing/   ← CaptureBuffer, BufferPool, little-endian PCM encoding
//! ├── recorder/     ← OpenSlRecorder (double buffer), AAudioRecorder, OboeRecorder (push),
//! │                   AudioRecordRecorder (blocking reads on its own thread)
//! ├── session/      ← SessionRegistry (host entry point)
//! ├── storage/      ← FileSink, metadata sidecar
//! └── simulated/    ← in-process drivers with failure injection
//! ```

pub mod models;
pub mod processing;
pub mod recorder;
pub mod session;
pub mod simulated;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{
    BackendType, CaptureDiagnostics, SamplingRate, StreamFormat, BUFFERS_PER_SECOND,
    DEFAULT_SAMPLE_RATE, QUEUE_BUFFER_COUNT,
};
pub use models::config::{SessionOptions, StreamRequest};
pub use models::error::{DriverError, DriverErrorKind, RecorderError, ResultCode};
pub use models::recording_result::RecordingMetadata;
pub use models::state::RecorderState;
pub use processing::capture_buffer::{BufferPool, CaptureBuffer};
pub use recorder::{AAudioRecorder, AudioRecordRecorder, OboeRecorder, OpenSlRecorder};
pub use session::registry::SessionRegistry;
pub use storage::file_sink::FileSink;
pub use traits::blocking_read::{BlockingReadBackend, BlockingSource};
pub use traits::buffer_queue::{
    BufferQueue, BufferQueueCallback, BufferQueueEngine, BufferQueueRecorder, EnqueueError,
    QueueState, RecordState,
};
pub use traits::recorder::{BackendFactory, Recorder};
pub use traits::sample_sink::SampleSink;
pub use traits::stream::{
    AudioStream, DataCallback, DataCallbackResult, ErrorCallback, FrameBlock, StreamBackend,
    StreamState,
};
