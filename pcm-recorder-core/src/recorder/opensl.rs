//! Double-buffered recorder for engines with an explicit buffer queue.
//!
//! ```text
//!            enqueue(buf)                      callback(filled, queue)
//! [BufferPool] ─────────→ [driver queue: head filling, tail waiting] ─────→ [recorder]
//!      ↑                                                                       │
//!      └─────────── stray / failed enqueue ←───────────────────────────────────┤
//!                            re-enqueue(filled) ←── copy to staging ───────────┘
//!                                                        └──→ [SampleSink]
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{
    BackendType, CaptureDiagnostics, StreamFormat, QUEUE_BUFFER_COUNT,
};
use crate::models::config::StreamRequest;
use crate::models::error::{DriverError, RecorderError};
use crate::models::state::RecorderState;
use crate::processing::capture_buffer::{BufferPool, CaptureBuffer};
use crate::processing::pcm;
use crate::traits::buffer_queue::{
    BufferQueue, BufferQueueCallback, BufferQueueEngine, BufferQueueRecorder, RecordState,
};
use crate::traits::recorder::Recorder;
use crate::traits::sample_sink::SampleSink;

use super::shared::{RecorderCore, SharedCapture};
use super::stream_capture::{flush_sink, staging_buffer};

/// Recorder for buffer-queue engines.
///
/// Keeps exactly [`QUEUE_BUFFER_COUNT`] buffers. While recording, the driver
/// fills the head of its queue; each full buffer comes back through the
/// callback, is copied to a staging area, re-enqueued at once and then written
/// to the sink, so the driver always has a buffer to fill.
pub struct OpenSlRecorder<E: BufferQueueEngine> {
    core: RecorderCore,
    engine: Option<E>,
    recorder: Option<E::Recorder>,
    pool: Arc<Mutex<BufferPool>>,
    format: Option<StreamFormat>,
    device_id: Option<String>,
}

impl<E: BufferQueueEngine> OpenSlRecorder<E> {
    /// Wrap an already created engine. The sink is owned from here on.
    pub fn new(engine: E, sink: Box<dyn SampleSink>) -> Self {
        log::info!("=== OpenSlRecorder created ===");
        Self {
            core: RecorderCore::new(BackendType::OpenSl, sink),
            engine: Some(engine),
            recorder: None,
            pool: Arc::new(Mutex::new(BufferPool::default())),
            format: None,
            device_id: None,
        }
    }

    pub fn with_device(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    /// Free buffers currently held by the recorder.
    pub fn free_buffers(&self) -> usize {
        self.pool.lock().free_count()
    }

    fn capture_callback(
        shared: SharedCapture,
        pool: Arc<Mutex<BufferPool>>,
        format: StreamFormat,
    ) -> BufferQueueCallback {
        let mut staging = staging_buffer(format);

        Box::new(move |filled: CaptureBuffer, queue: &dyn BufferQueue| {
            let mut s = shared.lock();

            if !s.state.is_recording() {
                s.discard_stray(BackendType::OpenSl);
                pool.lock().give_back(filled);
                return;
            }

            let frames = filled.frames();
            pcm::encode_le_into(&mut staging, filled.filled());

            // Hand the buffer back before touching the sink so the driver is never starved.
            if let Err(rejected) = queue.enqueue(filled) {
                log::warn!("Enqueue failed: err: {}", rejected.error);
                s.diagnostics.enqueue_failures += 1;
                pool.lock().give_back(rejected.buffer);
            }

            s.write(&staging, frames);
        })
    }

    /// Reclaim everything the driver still holds.
    fn drain_queue(&self, recorder: &E::Recorder) -> Result<(), DriverError> {
        let reclaimed = recorder.clear()?;
        if !reclaimed.is_empty() {
            log::debug!("Reclaimed {} queued buffers", reclaimed.len());
        }
        self.pool.lock().extend(reclaimed);
        Ok(())
    }

    /// Put the driver back into a clean, stopped state and fill its queue.
    ///
    /// Returns the number of buffers enqueued.
    fn prearm(&self, recorder: &E::Recorder) -> Result<usize, RecorderError> {
        recorder
            .set_record_state(RecordState::Stopped)
            .map_err(|e| start_error("SetRecordState stopped", e))?;

        let queued = recorder
            .state()
            .map_err(|e| start_error("GetState", e))?
            .count;
        if queued > 0 {
            self.drain_queue(recorder)
                .map_err(|e| start_error("Clear", e))?;
        }

        let queued = recorder
            .state()
            .map_err(|e| start_error("GetState", e))?
            .count;
        let mut enqueued = 0;
        for _ in 0..QUEUE_BUFFER_COUNT.saturating_sub(queued) {
            let Some(buffer) = self.pool.lock().take() else {
                break;
            };
            if let Err(rejected) = recorder.enqueue(buffer) {
                self.pool.lock().give_back(rejected.buffer);
                return Err(start_error("Enqueue", rejected.error));
            }
            enqueued += 1;
        }
        Ok(enqueued)
    }

    fn destroy_recorder(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            if let Err(e) = recorder.register_callback(None) {
                log::warn!("Unregister buffer queue callback failed: {}", e);
            }
            if let Ok(reclaimed) = recorder.clear() {
                self.pool.lock().extend(reclaimed);
            }
            recorder.destroy();
        }
    }
}

fn start_error(step: &str, e: DriverError) -> RecorderError {
    log::warn!("StartRecording {} failed: {}", step, e);
    RecorderError::StartRecording(format!("{} failed: {}", step, e))
}

impl<E: BufferQueueEngine> Recorder for OpenSlRecorder<E> {
    fn backend_type(&self) -> BackendType {
        BackendType::OpenSl
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
        self.core.require(RecorderState::Uninitialized, "InitRecording")?;

        let format = StreamFormat::negotiate(sample_rate, channels);
        let request = StreamRequest::capture(format).with_device(self.device_id.clone());
        request.validate().map_err(|e| {
            log::warn!("InitRecording rejected: {}", e);
            RecorderError::Init(e)
        })?;

        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| RecorderError::State("engine already destroyed".into()))?;

        let recorder = engine
            .create_recorder(&request, QUEUE_BUFFER_COUNT)
            .map_err(|e| {
                log::warn!("Create AudioRecorder failed: {}", e);
                RecorderError::Init(format!("create recorder failed: {}", e))
            })?;

        *self.pool.lock() =
            BufferPool::allocate(QUEUE_BUFFER_COUNT, format.frames_per_buffer(), format.channels);

        let callback =
            Self::capture_callback(Arc::clone(&self.core.shared), Arc::clone(&self.pool), format);
        if let Err(e) = recorder.register_callback(Some(callback)) {
            log::warn!("record_buffer_queue RegisterCallback failed: {}", e);
            let mut recorder = recorder;
            recorder.destroy();
            self.pool.lock().clear();
            return Err(RecorderError::Init(format!("register callback failed: {}", e)));
        }

        log::info!(
            "InitRecording: {} Hz, {} ch, {} frames per buffer",
            format.sample_rate,
            format.channels,
            format.frames_per_buffer()
        );
        self.recorder = Some(recorder);
        self.format = Some(format);
        self.core.set_state(RecorderState::Initialized);
        Ok(())
    }

    fn start_recording(&mut self) -> Result<(), RecorderError> {
        log::info!("StartRecording ....");
        self.core.require(RecorderState::Initialized, "StartRecording")?;

        let recorder = self.recorder.as_ref().ok_or_else(|| {
            log::warn!("StartRecording recorder object is missing.");
            RecorderError::StartRecording("recorder object is missing".into())
        })?;

        let enqueued = self.prearm(recorder)?;
        self.core.shared.lock().diagnostics.prearm_enqueued = enqueued;

        // Accept callbacks before the driver can deliver the first buffer.
        self.core.set_state(RecorderState::Recording);

        if let Err(e) = recorder.set_record_state(RecordState::Recording) {
            log::warn!("StartRecording SetRecordState Recording failed: {}", e);
            self.core.set_state(RecorderState::Initialized);
            if let Err(e) = self.drain_queue(recorder) {
                log::warn!("Clear after failed start failed: {}", e);
            }
            return Err(RecorderError::StartRecording(format!(
                "SetRecordState recording failed: {}",
                e
            )));
        }
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), RecorderError> {
        log::info!("StopRecording ...");
        self.core.require(RecorderState::Recording, "StopRecording")?;

        let recorder = self.recorder.as_ref().ok_or_else(|| {
            RecorderError::Stop("recorder object is missing".into())
        })?;

        let mut first_error = None;

        if let Err(e) = recorder.set_record_state(RecordState::Stopped) {
            log::warn!("StopRecording SetRecordState failed: {}", e);
            first_error = first_error.or(Some(RecorderError::Stop(format!("SetRecordState failed: {}", e))));
        }

        // Waits for an in-flight callback; anything later is discarded.
        self.core.set_state(RecorderState::Initialized);

        if let Err(e) = self.drain_queue(recorder) {
            log::warn!("StopRecording Clear failed: {}", e);
            first_error = first_error.or(Some(RecorderError::Stop(format!("Clear failed: {}", e))));
        }

        flush_sink(&self.core);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn release(&mut self) -> Result<(), RecorderError> {
        if self.core.state().is_released() {
            log::debug!("OpenSlRecorder already released");
            return Ok(());
        }
        if self.core.state().is_recording() {
            if let Err(e) = self.stop_recording() {
                log::warn!("Stop during release failed: {}", e);
            }
        }

        self.destroy_recorder();
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
        self.pool.lock().clear();
        self.core.release_sink()
    }
}

impl<E: BufferQueueEngine> Drop for OpenSlRecorder<E> {
    fn drop(&mut self) {
        log::info!("=== OpenSlRecorder dropped ===");
        if let Err(e) = self.release() {
            log::error!("Release on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::simulated::{
        QueueFaults, SharedMemorySink, SimulatedBufferQueueEngine, SimulatedQueueController,
    };

    fn recorder() -> (
        OpenSlRecorder<SimulatedBufferQueueEngine>,
        SimulatedQueueController,
        SharedMemorySink,
    ) {
        let controller = SimulatedQueueController::new();
        let sink = SharedMemorySink::new();
        let recorder = OpenSlRecorder::new(controller.engine(), Box::new(sink.clone()));
        (recorder, controller, sink)
    }

    #[test]
    fn five_full_buffers_write_1600_bytes() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        assert_eq!(rec.format().unwrap().frames_per_buffer(), 160);
        rec.start_recording().unwrap();

        for _ in 0..5 {
            assert!(ctl.fire(&[7; 160]));
        }
        rec.stop_recording().unwrap();

        assert_eq!(sink.len(), 1600);
        let diag = rec.diagnostics();
        assert_eq!(diag.callback_count, 5);
        assert_eq!(diag.frames_written, 800);
        assert_eq!(diag.bytes_written, 1600);
        assert_eq!(rec.state(), RecorderState::Initialized);
    }

    #[test]
    fn samples_are_written_little_endian() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 2).unwrap();
        rec.start_recording().unwrap();
        assert!(ctl.fire(&[0x0102, -2]));
        assert_eq!(sink.bytes(), vec![0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn buffers_alternate_between_slots() {
        let (mut rec, ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        assert_eq!(ctl.enqueued_indices(), vec![0, 1]);

        for _ in 0..4 {
            ctl.fire(&[0; 160]);
        }
        assert_eq!(ctl.enqueued_indices(), vec![0, 1, 0, 1, 0, 1]);
        assert_eq!(ctl.queued(), 2);
        assert_eq!(rec.diagnostics().prearm_enqueued, 2);
    }

    #[test]
    fn start_before_init_is_a_state_error() {
        let (mut rec, _ctl, _sink) = recorder();
        let err = rec.start_recording().unwrap_err();
        assert!(matches!(err, RecorderError::State(_)));
        assert_eq!(rec.state(), RecorderState::Uninitialized);
    }

    #[test]
    fn stop_without_recording_is_a_state_error() {
        let (mut rec, _ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        let err = rec.stop_recording().unwrap_err();
        assert!(matches!(err, RecorderError::State(_)));
        assert_eq!(rec.state(), RecorderState::Initialized);
    }

    #[test]
    fn init_then_release_frees_every_handle() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(44_100, 2).unwrap();
        assert_eq!(ctl.live_recorders(), 1);
        assert_eq!(ctl.live_engines(), 1);

        rec.release().unwrap();
        assert_eq!(ctl.live_recorders(), 0);
        assert_eq!(ctl.live_engines(), 0);
        assert!(sink.is_closed());
        assert_eq!(rec.state(), RecorderState::Released);
        assert_eq!(rec.free_buffers(), 0);
        rec.release().unwrap();
    }

    #[test]
    fn unsupported_rate_falls_back_to_16k() {
        let (mut rec, _ctl, _sink) = recorder();
        rec.init_recording(11_025, 1).unwrap();
        assert_eq!(rec.format().unwrap().sample_rate, 16_000);
    }

    #[test]
    fn bad_channel_count_fails_init_without_leaking() {
        let (mut rec, ctl, _sink) = recorder();
        let err = rec.init_recording(16_000, 3).unwrap_err();
        assert!(matches!(err, RecorderError::Init(_)));
        assert_eq!(rec.state(), RecorderState::Uninitialized);
        assert_eq!(ctl.recorders_created(), 0);
    }

    #[test]
    fn failed_callback_registration_destroys_recorder() {
        let (mut rec, ctl, _sink) = recorder();
        ctl.update_faults(|f| f.register_callback = true);
        let err = rec.init_recording(16_000, 1).unwrap_err();
        assert!(matches!(err, RecorderError::Init(_)));
        assert_eq!(ctl.recorders_created(), 1);
        assert_eq!(ctl.live_recorders(), 0);
        assert_eq!(rec.state(), RecorderState::Uninitialized);
    }

    #[test]
    fn create_recorder_failure_is_an_init_error() {
        let (mut rec, ctl, _sink) = recorder();
        ctl.set_faults(QueueFaults {
            create_recorder: true,
            ..Default::default()
        });
        assert!(matches!(
            rec.init_recording(16_000, 1),
            Err(RecorderError::Init(_))
        ));
    }

    #[test]
    fn rejected_start_reverts_and_reclaims_buffers() {
        let (mut rec, ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        ctl.update_faults(|f| f.start = true);

        let err = rec.start_recording().unwrap_err();
        assert!(matches!(err, RecorderError::StartRecording(_)));
        assert_eq!(rec.state(), RecorderState::Initialized);
        assert_eq!(rec.free_buffers(), 2);

        ctl.update_faults(|f| f.start = false);
        rec.start_recording().unwrap();
        assert_eq!(rec.state(), RecorderState::Recording);
    }

    #[test]
    fn late_callback_after_stop_writes_nothing() {
        let (mut rec, ctl, sink) = recorder();
        ctl.update_faults(|f| f.hold_head_on_clear = true);
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        ctl.fire(&[1; 160]);
        ctl.fire(&[1; 160]);
        rec.stop_recording().unwrap();
        assert_eq!(sink.len(), 640);

        assert!(!ctl.fire(&[1; 160]));
        assert!(ctl.fire_late(&[1; 160]));
        assert_eq!(sink.len(), 640);
        assert_eq!(rec.diagnostics().stray_callbacks, 1);
        assert_eq!(rec.free_buffers(), 2);
    }

    #[test]
    fn prearm_only_tops_up_what_the_driver_kept() {
        let (mut rec, ctl, _sink) = recorder();
        ctl.update_faults(|f| f.hold_head_on_clear = true);
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        assert_eq!(rec.diagnostics().prearm_enqueued, 2);
        rec.stop_recording().unwrap();
        assert_eq!(ctl.queued(), 1);

        rec.start_recording().unwrap();
        assert_eq!(rec.diagnostics().prearm_enqueued, 1);
        assert_eq!(ctl.queued(), 2);
    }

    #[test]
    fn failed_reenqueue_still_writes_and_is_counted() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        ctl.update_faults(|f| f.enqueue = true);

        assert!(ctl.fire(&[3; 160]));
        assert_eq!(sink.len(), 320);
        assert_eq!(rec.diagnostics().enqueue_failures, 1);
        assert_eq!(rec.free_buffers(), 1);
        assert_eq!(ctl.queued(), 1);
    }

    #[test]
    fn restart_appends_to_the_same_sink() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        ctl.fire(&[0; 160]);
        rec.stop_recording().unwrap();
        rec.start_recording().unwrap();
        ctl.fire(&[0; 160]);
        rec.stop_recording().unwrap();
        assert_eq!(sink.len(), 640);
    }

    #[test]
    fn release_while_recording_stops_first() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        ctl.fire(&[0; 160]);

        rec.release().unwrap();
        assert_eq!(rec.state(), RecorderState::Released);
        assert!(sink.is_closed());
        assert!(!ctl.has_callback());
        assert_eq!(ctl.live_recorders(), 0);
    }

    #[test]
    fn stop_failure_still_tears_down() {
        let (mut rec, ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        ctl.update_faults(|f| f.stop = true);

        let err = rec.stop_recording().unwrap_err();
        assert!(matches!(err, RecorderError::Stop(_)));
        assert_eq!(rec.state(), RecorderState::Initialized);
        assert_eq!(rec.free_buffers(), 2);
    }

    fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::yield_now();
        }
    }

    #[test]
    fn driver_thread_racing_stop_and_release_writes_nothing_after_stop() {
        for _ in 0..100 {
            let (mut rec, ctl, sink) = recorder();
            rec.init_recording(16_000, 1).unwrap();
            rec.start_recording().unwrap();

            let running = Arc::new(AtomicBool::new(true));
            let driver = {
                let ctl = ctl.clone();
                let running = Arc::clone(&running);
                thread::spawn(move || {
                    while running.load(Ordering::Acquire) {
                        ctl.fire_late(&[5; 160]);
                        thread::yield_now();
                    }
                })
            };

            wait_until("first buffer", || !sink.is_empty());
            rec.stop_recording().unwrap();
            let after_stop = sink.len();
            thread::sleep(Duration::from_millis(1));
            assert_eq!(sink.len(), after_stop);

            rec.release().unwrap();
            running.store(false, Ordering::Release);
            driver.join().unwrap();

            assert_eq!(sink.len(), after_stop);
            assert_eq!(after_stop % 320, 0);
            assert_eq!(rec.diagnostics().sink_write_failures, 0);
            assert_eq!(ctl.live_recorders(), 0);
            assert_eq!(ctl.live_engines(), 0);
        }
    }
}
