use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::StreamRequest;
use crate::models::error::{DriverError, DriverErrorKind};
use crate::processing::capture_buffer::CaptureBuffer;
use crate::traits::buffer_queue::{
    BufferQueue, BufferQueueCallback, BufferQueueEngine, BufferQueueRecorder, EnqueueError,
    QueueState, RecordState,
};

/// Failures the simulated buffer-queue driver can be told to produce.
#[derive(Debug, Clone, Default)]
pub struct QueueFaults {
    pub create_recorder: bool,
    pub register_callback: bool,
    pub enqueue: bool,
    pub clear: bool,
    pub start: bool,
    pub stop: bool,
    /// `clear` keeps the head buffer, as if it were still being filled.
    pub hold_head_on_clear: bool,
}

#[derive(Debug, Default)]
struct QueueCounters {
    live_engines: AtomicUsize,
    live_recorders: AtomicUsize,
    recorders_created: AtomicUsize,
}

struct QueueSlots {
    queue: VecDeque<CaptureBuffer>,
    record_state: RecordState,
    filled: u64,
    capacity: usize,
}

/// Queue state shared by the recorder object and the test controller.
struct SimQueue {
    slots: Mutex<QueueSlots>,
    // Separate lock: the callback re-enters `enqueue` on this same queue.
    callback: Mutex<Option<BufferQueueCallback>>,
    faults: Arc<Mutex<QueueFaults>>,
    enqueued_indices: Mutex<Vec<usize>>,
}

impl SimQueue {
    fn fault(&self, f: impl Fn(&QueueFaults) -> bool, what: &str) -> Result<(), DriverError> {
        if f(&*self.faults.lock()) {
            return Err(DriverError::new(
                DriverErrorKind::ResourceError,
                format!("simulated {} failure", what),
            ));
        }
        Ok(())
    }

    /// Fill the head buffer with `samples` and hand it to the callback.
    fn deliver(&self, samples: &[i16], require_recording: bool) -> bool {
        let filled = {
            let mut slots = self.slots.lock();
            if require_recording && slots.record_state != RecordState::Recording {
                return false;
            }
            let Some(mut buffer) = slots.queue.pop_front() else {
                return false;
            };
            slots.filled += 1;
            let dst = buffer.as_mut_slice();
            let n = samples.len().min(dst.len());
            dst[..n].copy_from_slice(&samples[..n]);
            let channels = buffer.channels().max(1) as usize;
            buffer.set_frames(n / channels);
            buffer
        };

        let mut callback = self.callback.lock();
        match callback.as_mut() {
            Some(cb) => {
                cb(filled, self);
                true
            }
            None => {
                // Nobody listening: the buffer stays with the driver.
                self.slots.lock().queue.push_back(filled);
                false
            }
        }
    }
}

impl BufferQueue for SimQueue {
    fn enqueue(&self, buffer: CaptureBuffer) -> Result<(), EnqueueError> {
        if let Err(error) = self.fault(|f| f.enqueue, "enqueue") {
            return Err(EnqueueError { buffer, error });
        }
        let mut slots = self.slots.lock();
        if slots.queue.len() >= slots.capacity {
            return Err(EnqueueError {
                buffer,
                error: DriverError::new(DriverErrorKind::BufferInsufficient, "queue is full"),
            });
        }
        self.enqueued_indices.lock().push(buffer.index());
        slots.queue.push_back(buffer);
        Ok(())
    }

    fn clear(&self) -> Result<Vec<CaptureBuffer>, DriverError> {
        self.fault(|f| f.clear, "clear")?;
        let hold_head = self.faults.lock().hold_head_on_clear;
        let mut slots = self.slots.lock();
        let keep = if hold_head { slots.queue.pop_front() } else { None };
        let reclaimed = slots.queue.drain(..).collect();
        slots.queue.extend(keep);
        Ok(reclaimed)
    }

    fn state(&self) -> Result<QueueState, DriverError> {
        let slots = self.slots.lock();
        Ok(QueueState {
            count: slots.queue.len(),
            index: slots.filled,
        })
    }
}

/// Recorder object produced by [`SimulatedBufferQueueEngine`].
pub struct SimulatedBufferQueueRecorder {
    queue: Arc<SimQueue>,
    counters: Arc<QueueCounters>,
    destroyed: bool,
}

impl BufferQueue for SimulatedBufferQueueRecorder {
    fn enqueue(&self, buffer: CaptureBuffer) -> Result<(), EnqueueError> {
        self.queue.enqueue(buffer)
    }

    fn clear(&self) -> Result<Vec<CaptureBuffer>, DriverError> {
        self.queue.clear()
    }

    fn state(&self) -> Result<QueueState, DriverError> {
        BufferQueue::state(self.queue.as_ref())
    }
}

impl BufferQueueRecorder for SimulatedBufferQueueRecorder {
    fn set_record_state(&self, state: RecordState) -> Result<(), DriverError> {
        match state {
            RecordState::Recording => self.queue.fault(|f| f.start, "start")?,
            RecordState::Stopped => self.queue.fault(|f| f.stop, "stop")?,
            RecordState::Paused => {}
        }
        self.queue.slots.lock().record_state = state;
        Ok(())
    }

    fn record_state(&self) -> Result<RecordState, DriverError> {
        Ok(self.queue.slots.lock().record_state)
    }

    fn register_callback(&self, callback: Option<BufferQueueCallback>) -> Result<(), DriverError> {
        if callback.is_some() {
            self.queue.fault(|f| f.register_callback, "register callback")?;
        }
        *self.queue.callback.lock() = callback;
        Ok(())
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        *self.queue.callback.lock() = None;
        self.queue.slots.lock().queue.clear();
        self.counters.live_recorders.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for SimulatedBufferQueueRecorder {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// In-process buffer-queue engine. Audio is injected through its
/// [`SimulatedQueueController`].
pub struct SimulatedBufferQueueEngine {
    controller: SimulatedQueueController,
    destroyed: bool,
}

impl BufferQueueEngine for SimulatedBufferQueueEngine {
    type Recorder = SimulatedBufferQueueRecorder;

    fn create_recorder(
        &mut self,
        request: &StreamRequest,
        queue_len: usize,
    ) -> Result<Self::Recorder, DriverError> {
        let faults = Arc::clone(&self.controller.faults);
        if faults.lock().create_recorder {
            return Err(DriverError::new(
                DriverErrorKind::ContentUnsupported,
                "simulated create recorder failure",
            ));
        }

        let queue = Arc::new(SimQueue {
            slots: Mutex::new(QueueSlots {
                queue: VecDeque::with_capacity(queue_len),
                record_state: RecordState::Stopped,
                filled: 0,
                capacity: queue_len,
            }),
            callback: Mutex::new(None),
            faults,
            enqueued_indices: Mutex::new(Vec::new()),
        });
        log::debug!(
            "Simulated recorder: {} Hz, {} ch, queue of {}",
            request.format.sample_rate,
            request.format.channels,
            queue_len
        );

        *self.controller.current.lock() = Some(Arc::clone(&queue));
        self.controller.counters.live_recorders.fetch_add(1, Ordering::SeqCst);
        self.controller.counters.recorders_created.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedBufferQueueRecorder {
            queue,
            counters: Arc::clone(&self.controller.counters),
            destroyed: false,
        })
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.controller.counters.live_engines.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SimulatedBufferQueueEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Test-side handle onto every engine it creates.
#[derive(Clone, Default)]
pub struct SimulatedQueueController {
    current: Arc<Mutex<Option<Arc<SimQueue>>>>,
    faults: Arc<Mutex<QueueFaults>>,
    counters: Arc<QueueCounters>,
}

impl SimulatedQueueController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> SimulatedBufferQueueEngine {
        self.counters.live_engines.fetch_add(1, Ordering::SeqCst);
        SimulatedBufferQueueEngine {
            controller: self.clone(),
            destroyed: false,
        }
    }

    pub fn set_faults(&self, faults: QueueFaults) {
        *self.faults.lock() = faults;
    }

    pub fn update_faults(&self, f: impl FnOnce(&mut QueueFaults)) {
        f(&mut *self.faults.lock());
    }

    fn queue(&self) -> Option<Arc<SimQueue>> {
        self.current.lock().clone()
    }

    /// Fill the head buffer and run the callback, if the driver is recording.
    pub fn fire(&self, samples: &[i16]) -> bool {
        self.queue().is_some_and(|q| q.deliver(samples, true))
    }

    /// Deliver the head buffer even though the driver was told to stop.
    pub fn fire_late(&self, samples: &[i16]) -> bool {
        self.queue().is_some_and(|q| q.deliver(samples, false))
    }

    pub fn queued(&self) -> usize {
        self.queue().map_or(0, |q| q.slots.lock().queue.len())
    }

    pub fn record_state(&self) -> Option<RecordState> {
        self.queue().map(|q| q.slots.lock().record_state)
    }

    /// Buffer indices in the order they were enqueued.
    pub fn enqueued_indices(&self) -> Vec<usize> {
        self.queue()
            .map(|q| q.enqueued_indices.lock().clone())
            .unwrap_or_default()
    }

    pub fn has_callback(&self) -> bool {
        self.queue().is_some_and(|q| q.callback.lock().is_some())
    }

    pub fn live_engines(&self) -> usize {
        self.counters.live_engines.load(Ordering::SeqCst)
    }

    pub fn live_recorders(&self) -> usize {
        self.counters.live_recorders.load(Ordering::SeqCst)
    }

    pub fn recorders_created(&self) -> usize {
        self.counters.recorders_created.load(Ordering::SeqCst)
    }
}
