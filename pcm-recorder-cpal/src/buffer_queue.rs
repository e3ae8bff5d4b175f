//! Buffer-queue engine on top of a cpal input stream.
//!
//! cpal pushes arbitrarily sized blocks; this driver copies them into the head
//! of its queue and hands each buffer back through the registered callback as
//! soon as it is full, the way a native buffer-queue engine would.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use pcm_recorder_core::models::config::StreamRequest;
use pcm_recorder_core::models::error::{DriverError, DriverErrorKind};
use pcm_recorder_core::processing::capture_buffer::CaptureBuffer;
use pcm_recorder_core::traits::buffer_queue::{
    BufferQueue, BufferQueueCallback, BufferQueueEngine, BufferQueueRecorder, EnqueueError,
    QueueState, RecordState,
};

use crate::device::{resolve_input_device, stream_config};
use crate::error::stream_error;
use crate::stream_thread::{build_i16_input_stream, StreamThread};

struct Slots {
    queue: VecDeque<CaptureBuffer>,
    record_state: RecordState,
    filled: u64,
}

/// Queue shared by the host-side recorder object and the stream thread.
struct SharedQueue {
    slots: Mutex<Slots>,
    callback: Mutex<Option<BufferQueueCallback>>,
    capacity: usize,
    channels: usize,
    dropped_frames: AtomicU64,
}

impl SharedQueue {
    fn new(capacity: usize, channels: u16) -> Self {
        Self {
            slots: Mutex::new(Slots {
                queue: VecDeque::with_capacity(capacity),
                record_state: RecordState::Stopped,
                filled: 0,
            }),
            callback: Mutex::new(None),
            capacity,
            channels: channels.max(1) as usize,
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Copy `samples` into queued buffers, returning each one as it fills up.
    fn fill(&self, mut samples: &[i16]) {
        while !samples.is_empty() {
            let full = {
                let mut slots = self.slots.lock();
                if slots.record_state != RecordState::Recording {
                    return;
                }
                let Some(head) = slots.queue.front_mut() else {
                    let frames = (samples.len() / self.channels) as u64;
                    self.dropped_frames.fetch_add(frames, Ordering::Relaxed);
                    log::debug!("Buffer queue empty, dropped {} frames", frames);
                    return;
                };

                let offset = head.frames() * self.channels;
                let room = head.as_mut_slice().len() - offset;
                let n = room.min(samples.len());
                head.as_mut_slice()[offset..offset + n].copy_from_slice(&samples[..n]);
                head.set_frames((offset + n) / self.channels);
                samples = &samples[n..];

                if head.frames() == head.capacity_frames() {
                    slots.filled += 1;
                    slots.queue.pop_front()
                } else {
                    None
                }
            };

            if let Some(buffer) = full {
                let mut callback = self.callback.lock();
                match callback.as_mut() {
                    Some(cb) => cb(buffer, self),
                    None => log::debug!("Full buffer {} with no callback", buffer.index()),
                }
            }
        }
    }
}

impl BufferQueue for SharedQueue {
    fn enqueue(&self, mut buffer: CaptureBuffer) -> Result<(), EnqueueError> {
        let mut slots = self.slots.lock();
        if slots.queue.len() >= self.capacity {
            return Err(EnqueueError {
                buffer,
                error: DriverError::new(DriverErrorKind::BufferInsufficient, "buffer queue is full"),
            });
        }
        buffer.reset();
        slots.queue.push_back(buffer);
        Ok(())
    }

    fn clear(&self) -> Result<Vec<CaptureBuffer>, DriverError> {
        Ok(self.slots.lock().queue.drain(..).collect())
    }

    fn state(&self) -> Result<QueueState, DriverError> {
        let slots = self.slots.lock();
        Ok(QueueState {
            count: slots.queue.len(),
            index: slots.filled,
        })
    }
}

/// Recorder object backed by one cpal input stream.
pub struct CpalQueueRecorder {
    queue: Arc<SharedQueue>,
    thread: Mutex<Option<StreamThread>>,
}

impl CpalQueueRecorder {
    /// Frames lost because the driver had no queued buffer to fill.
    pub fn dropped_frames(&self) -> u64 {
        self.queue.dropped_frames.load(Ordering::Relaxed)
    }

    fn with_thread(
        &self,
        f: impl FnOnce(&StreamThread) -> Result<(), DriverError>,
    ) -> Result<(), DriverError> {
        match self.thread.lock().as_ref() {
            Some(thread) => f(thread),
            None => Err(DriverError::new(
                DriverErrorKind::PreconditionsViolated,
                "recorder object destroyed",
            )),
        }
    }
}

impl BufferQueue for CpalQueueRecorder {
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

impl BufferQueueRecorder for CpalQueueRecorder {
    fn set_record_state(&self, state: RecordState) -> Result<(), DriverError> {
        match state {
            RecordState::Recording => {
                self.queue.slots.lock().record_state = state;
                self.with_thread(|t| t.play()).map_err(|e| {
                    self.queue.slots.lock().record_state = RecordState::Stopped;
                    e
                })
            }
            RecordState::Stopped | RecordState::Paused => {
                self.queue.slots.lock().record_state = state;
                self.with_thread(|t| t.pause())
            }
        }
    }

    fn record_state(&self) -> Result<RecordState, DriverError> {
        Ok(self.queue.slots.lock().record_state)
    }

    fn register_callback(&self, callback: Option<BufferQueueCallback>) -> Result<(), DriverError> {
        *self.queue.callback.lock() = callback;
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(mut thread) = self.thread.lock().take() {
            if let Err(e) = thread.close() {
                log::warn!("Destroy recorder object: {}", e);
            }
        }
        *self.queue.callback.lock() = None;
        self.queue.slots.lock().queue.clear();
    }
}

impl Drop for CpalQueueRecorder {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Engine creating [`CpalQueueRecorder`]s on the default host.
#[derive(Debug, Default)]
pub struct CpalBufferQueueEngine {
    recorders_created: usize,
}

impl CpalBufferQueueEngine {
    /// Fails when the default host has no input device.
    pub fn new() -> Result<Self, DriverError> {
        if !crate::device::has_input_device() {
            return Err(DriverError::new(
                DriverErrorKind::ResourceError,
                "no input device available",
            ));
        }
        log::info!("Created cpal buffer-queue engine on {:?}", cpal::default_host().id());
        Ok(Self::default())
    }
}

impl BufferQueueEngine for CpalBufferQueueEngine {
    type Recorder = CpalQueueRecorder;

    fn create_recorder(
        &mut self,
        request: &StreamRequest,
        queue_len: usize,
    ) -> Result<Self::Recorder, DriverError> {
        let queue = Arc::new(SharedQueue::new(queue_len, request.format.channels));
        let request = request.clone();
        let producer = Arc::clone(&queue);

        let thread = StreamThread::spawn("pcm-cpal-queue", move || {
            let device = resolve_input_device(request.device_id.as_deref())?;
            let (config, sample_format) = stream_config(&device, &request)?;
            build_i16_input_stream(
                &device,
                &config,
                sample_format,
                move |samples: &[i16]| producer.fill(samples),
                |e| log::error!("cpal buffer-queue stream error: {}", stream_error(e)),
            )
        })?;

        self.recorders_created += 1;
        Ok(CpalQueueRecorder {
            queue,
            thread: Mutex::new(Some(thread)),
        })
    }

    fn destroy(&mut self) {
        log::info!(
            "Destroyed cpal buffer-queue engine after {} recorder objects",
            self.recorders_created
        );
    }
}
