//! # pcm-recorder-cpal
//!
//! Hardware input for pcm-recorder, built on cpal.
//!
//! Provides:
//! - `CpalBufferQueueEngine`: buffer-queue driver filling recorder-owned buffers from a cpal stream
//! - `CpalStreamBackend`: callback stream driver pushing each cpal block to the recorder
//! - `CpalReadBackend`: blocking-read driver the recorder's capture thread pulls from
//! - `CpalBackendFactory`: `BackendFactory` wiring the drivers into the session registry
//! - `device`: input device enumeration
//!
//! Each cpal stream lives on its own thread, since `cpal::Stream` is not `Send`
//! on every host.
//!
//! ## Usage
//! ```ignore
//! use pcm_recorder_core::{BackendType, SessionRegistry};
//! use pcm_recorder_cpal::CpalBackendFactory;
//!
//! let mut registry = SessionRegistry::new(CpalBackendFactory::new());
//! registry.select_backend(BackendType::OpenSl, "capture.pcm");
//! registry.init_recording(16_000, 1);
//! registry.start_recording();
//! ```

pub mod blocking_read;
pub mod buffer_queue;
pub mod device;
mod error;
pub mod factory;
pub mod stream;
mod stream_thread;

pub use blocking_read::{CpalReadBackend, CpalReadSource};
pub use buffer_queue::{CpalBufferQueueEngine, CpalQueueRecorder};
pub use device::{has_input_device, list_input_devices, InputDeviceInfo};
pub use factory::CpalBackendFactory;
pub use stream::{CpalStream, CpalStreamBackend};
