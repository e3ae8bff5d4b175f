use crate::models::config::StreamRequest;
use crate::models::error::DriverError;
use crate::processing::capture_buffer::CaptureBuffer;

/// Record state of a buffer-queue recorder object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    Stopped,
    Paused,
    Recording,
}

/// Snapshot of a buffer queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueState {
    /// Buffers currently held by the driver.
    pub count: usize,
    /// Buffers the driver has filled and returned since creation.
    pub index: u64,
}

/// An enqueue the driver refused. The buffer is handed back, never lost.
#[derive(Debug)]
pub struct EnqueueError {
    pub buffer: CaptureBuffer,
    pub error: DriverError,
}

/// The driver-side queue of buffers waiting to be filled.
///
/// Drivers fill buffers strictly in enqueue order and only the head of the
/// queue is written at any time.
pub trait BufferQueue: Send + Sync {
    /// Hand `buffer` to the driver.
    fn enqueue(&self, buffer: CaptureBuffer) -> Result<(), EnqueueError>;

    /// Drop every queued buffer, returning them to the caller.
    fn clear(&self) -> Result<Vec<CaptureBuffer>, DriverError>;

    fn state(&self) -> Result<QueueState, DriverError>;
}

/// Called by the driver each time the head buffer is full.
///
/// Receives the filled buffer by value and the queue, so the callback can
/// re-enqueue without touching host-side handles.
pub type BufferQueueCallback = Box<dyn FnMut(CaptureBuffer, &dyn BufferQueue) + Send + 'static>;

/// A realized buffer-queue recorder object.
pub trait BufferQueueRecorder: BufferQueue {
    fn set_record_state(&self, state: RecordState) -> Result<(), DriverError>;

    fn record_state(&self) -> Result<RecordState, DriverError>;

    /// Install or remove the buffer-queue callback.
    ///
    /// Removing the callback must wait for an in-flight invocation to return,
    /// so no callback runs after `register_callback(None)` completes.
    fn register_callback(&self, callback: Option<BufferQueueCallback>) -> Result<(), DriverError>;

    /// Destroy the recorder object and free its driver resources.
    fn destroy(&mut self);
}

/// The engine that creates buffer-queue recorder objects.
pub trait BufferQueueEngine: Send {
    type Recorder: BufferQueueRecorder;

    /// Create and realize a recorder object for `request` with a queue of
    /// `queue_len` buffers.
    fn create_recorder(
        &mut self,
        request: &StreamRequest,
        queue_len: usize,
    ) -> Result<Self::Recorder, DriverError>;

    /// Destroy the engine object.
    fn destroy(&mut self);
}
