//! Pull-style recorder: a capture thread owned by the recorder reads full
//! 10 ms buffers from a blocking source and appends them to the sink.
//!
//! ```text
//! start → [source.start] → spawn "pcm-capture"
//!                              loop while keep_alive:
//!                                read(10 ms) ── full ──→ [SampleSink]
//!                                            └─ short ─→ log, count
//!                              source.stop → report on `finished`
//! stop  → state = Initialized → keep_alive = false → wait ≤ 2000 ms
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_models::{BackendType, CaptureDiagnostics, StreamFormat};
use crate::models::config::StreamRequest;
use crate::models::error::{DriverError, RecorderError};
use crate::models::state::RecorderState;
use crate::processing::pcm;
use crate::traits::blocking_read::{BlockingReadBackend, BlockingSource};
use crate::traits::recorder::Recorder;
use crate::traits::sample_sink::SampleSink;

use super::shared::{RecorderCore, SharedCapture};
use super::stream_capture::{flush_sink, staging_buffer};

/// Hardware buffer size as a multiple of the driver minimum.
pub const HARDWARE_BUFFER_FACTOR: usize = 2;

/// How long stop waits for the capture thread before detaching it.
pub const CAPTURE_JOIN_TIMEOUT: Duration = Duration::from_millis(2000);

const BACKEND: BackendType = BackendType::AudioRecord;

/// Hardware buffer for `format`: twice the driver minimum, never less than one 10 ms buffer.
pub fn hardware_buffer_bytes(format: StreamFormat, driver_min: Option<usize>) -> usize {
    let chunk = format.byte_len(format.frames_per_buffer());
    let min = driver_min.unwrap_or(0).max(chunk);
    (HARDWARE_BUFFER_FACTOR * min).max(chunk)
}

type SharedSource<S> = Arc<Mutex<S>>;

struct CaptureThread {
    keep_alive: Arc<AtomicBool>,
    finished: Receiver<Result<(), DriverError>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CaptureThread {
    fn spawn<S: BlockingSource>(
        source: SharedSource<S>,
        shared: SharedCapture,
        format: StreamFormat,
    ) -> std::io::Result<Self> {
        let keep_alive = Arc::new(AtomicBool::new(true));
        let (finished_tx, finished) = mpsc::channel();
        let alive = Arc::clone(&keep_alive);

        let handle = thread::Builder::new()
            .name("pcm-capture".into())
            .spawn(move || {
                let result = read_loop(&source, &shared, &alive, format);
                let _ = finished_tx.send(result);
            })?;

        Ok(Self {
            keep_alive,
            finished,
            handle: Some(handle),
        })
    }

    /// Clear the keep-alive flag and wait for the thread to stop its source.
    fn stop(mut self) -> Result<(), RecorderError> {
        self.keep_alive.store(false, Ordering::Release);
        let handle = self.handle.take();

        match self.finished.recv_timeout(CAPTURE_JOIN_TIMEOUT) {
            Ok(result) => {
                if let Some(handle) = handle {
                    let _ = handle.join();
                }
                result.map_err(|e| {
                    log::warn!("[{}] StopRecording stop error: {}", BACKEND, e);
                    RecorderError::Stop(format!("source stop failed: {}", e))
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = handle {
                    let _ = handle.join();
                }
                log::error!("[{}] capture thread exited without reporting", BACKEND);
                Err(RecorderError::Stop("capture thread exited abnormally".into()))
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    "[{}] Join capture thread timed out after {} ms",
                    BACKEND,
                    CAPTURE_JOIN_TIMEOUT.as_millis()
                );
                Err(RecorderError::Stop("capture thread join timed out".into()))
            }
        }
    }
}

/// Body of the capture thread. Stops the source on the way out.
fn read_loop<S: BlockingSource>(
    source: &SharedSource<S>,
    shared: &SharedCapture,
    keep_alive: &AtomicBool,
    format: StreamFormat,
) -> Result<(), DriverError> {
    if !source.lock().is_recording() {
        log::info!("[{}] source is not recording, capture thread exits", BACKEND);
        return Ok(());
    }

    let mut samples = vec![0i16; format.samples_per_buffer()];
    let mut staging = staging_buffer(format);
    let frames = format.frames_per_buffer();

    while keep_alive.load(Ordering::Acquire) {
        let read = source.lock().read(&mut samples);
        match read {
            Ok(0) => {}
            Ok(n) if n == samples.len() => {
                pcm::encode_le_into(&mut staging, &samples);
                let mut s = shared.lock();
                if !s.state.is_recording() {
                    s.discard_stray(BACKEND);
                    break;
                }
                s.write(&staging, frames);
            }
            Ok(n) => {
                log::error!(
                    "[{}] short read: {} of {} samples",
                    BACKEND,
                    n,
                    samples.len()
                );
                shared.lock().diagnostics.short_reads += 1;
            }
            Err(e) => {
                log::error!("[{}] read failed, capture thread exits: {}", BACKEND, e);
                shared.lock().diagnostics.read_errors += 1;
                break;
            }
        }
    }

    source.lock().stop()
}

/// Recorder that pulls 10 ms buffers from a [`BlockingSource`] on its own thread.
///
/// Stop returns to `Initialized` with the source kept, so capture can restart
/// without reopening it.
pub struct AudioRecordRecorder<B: BlockingReadBackend> {
    core: RecorderCore,
    driver: B,
    source: Option<SharedSource<B::Source>>,
    capture: Option<CaptureThread>,
    format: Option<StreamFormat>,
    buffer_bytes: Option<usize>,
    device_id: Option<String>,
}

impl<B: BlockingReadBackend> AudioRecordRecorder<B> {
    pub fn new(driver: B, sink: Box<dyn SampleSink>) -> Self {
        log::info!("=== AudioRecordRecorder created ===");
        Self {
            core: RecorderCore::new(BACKEND, sink),
            driver,
            source: None,
            capture: None,
            format: None,
            buffer_bytes: None,
            device_id: None,
        }
    }

    pub fn with_device(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    /// Hardware buffer requested from the driver at init.
    pub fn buffer_bytes(&self) -> Option<usize> {
        self.buffer_bytes
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn lock_source(
        source: &SharedSource<B::Source>,
    ) -> Option<parking_lot::MutexGuard<'_, B::Source>> {
        let guard = source.try_lock_for(CAPTURE_JOIN_TIMEOUT);
        if guard.is_none() {
            log::error!("[{}] source is still held by a detached capture thread", BACKEND);
        }
        guard
    }
}

impl<B: BlockingReadBackend> Recorder for AudioRecordRecorder<B> {
    fn backend_type(&self) -> BackendType {
        BACKEND
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
        let state = self.core.state();
        if !state.can_init() {
            log::warn!("[{}] InitRecording error, invalid state: {}", BACKEND, state.as_str());
            return Err(RecorderError::State(format!(
                "InitRecording not allowed while {}",
                state.as_str()
            )));
        }

        let format = StreamFormat::negotiate(sample_rate, channels);
        let request = StreamRequest::capture(format).with_device(self.device_id.clone());
        request.validate().map_err(|e| {
            log::warn!("[{}] InitRecording rejected: {}", BACKEND, e);
            RecorderError::Init(e)
        })?;

        let driver_min = match self.driver.min_buffer_bytes(&request) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::info!("[{}] min buffer size unavailable: {}", BACKEND, e);
                None
            }
        };
        let buffer_bytes = hardware_buffer_bytes(format, driver_min);
        log::info!("[{}] hardware buffer: {} bytes", BACKEND, buffer_bytes);

        let source = self
            .driver
            .open_source(&request, buffer_bytes)
            .map_err(|e| {
                log::warn!("[{}] InitRecording open error: {}", BACKEND, e);
                RecorderError::Init(format!("open source failed: {}", e))
            })?;

        let delivered = source.format();
        if delivered != format {
            log::info!(
                "[{}] source delivers {} Hz, {} ch",
                BACKEND,
                delivered.sample_rate,
                delivered.channels
            );
        }
        let format = delivered;

        self.source = Some(Arc::new(Mutex::new(source)));
        self.format = Some(format);
        self.buffer_bytes = Some(buffer_bytes);
        self.core.set_state(RecorderState::Initialized);
        log::info!(
            "[{}] InitRecording: {} Hz, {} ch",
            BACKEND,
            format.sample_rate,
            format.channels
        );
        Ok(())
    }

    fn start_recording(&mut self) -> Result<(), RecorderError> {
        log::info!("[{}] StartRecording ....", BACKEND);
        self.core.require(RecorderState::Initialized, "StartRecording")?;
        let (Some(source), Some(format)) = (self.source.as_ref(), self.format) else {
            return Err(RecorderError::State("no open source".into()));
        };

        {
            let mut guard = Self::lock_source(source)
                .ok_or_else(|| RecorderError::StartRecording("source busy".into()))?;
            guard.start().map_err(|e| {
                log::warn!("[{}] StartRecording start error: {}", BACKEND, e);
                RecorderError::StartRecording(format!("source start failed: {}", e))
            })?;
        }

        self.core.set_state(RecorderState::Recording);
        match CaptureThread::spawn(Arc::clone(source), self.core.shared.clone(), format) {
            Ok(capture) => {
                self.capture = Some(capture);
                Ok(())
            }
            Err(e) => {
                log::error!("[{}] failed to spawn capture thread: {}", BACKEND, e);
                self.core.set_state(RecorderState::Initialized);
                if let Err(e) = source.lock().stop() {
                    log::warn!("[{}] stop after failed spawn: {}", BACKEND, e);
                }
                Err(RecorderError::StartRecording(format!(
                    "capture thread spawn failed: {}",
                    e
                )))
            }
        }
    }

    fn stop_recording(&mut self) -> Result<(), RecorderError> {
        log::info!("[{}] StopRecording ...", BACKEND);
        self.core.require(RecorderState::Recording, "StopRecording")?;

        self.core.set_state(RecorderState::Initialized);
        let result = match self.capture.take() {
            Some(capture) => capture.stop(),
            None => Ok(()),
        };
        flush_sink(&self.core);
        result
    }

    fn release(&mut self) -> Result<(), RecorderError> {
        if self.core.state().is_released() {
            return Ok(());
        }
        if self.core.state().is_recording() {
            if let Err(e) = self.stop_recording() {
                log::warn!("[{}] Stop during release failed: {}", BACKEND, e);
            }
        }
        if let Some(source) = self.source.take() {
            log::info!("[{}] release hw resource", BACKEND);
            if let Some(mut guard) = Self::lock_source(&source) {
                guard.release();
            }
        }
        self.core.release_sink()
    }
}

impl<B: BlockingReadBackend> Drop for AudioRecordRecorder<B> {
    fn drop(&mut self) {
        log::info!("=== AudioRecordRecorder dropped ===");
        if let Err(e) = self.release() {
            log::error!("Release on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::simulated::{ReadFaults, SharedMemorySink, SimulatedReadBackend, SimulatedReadController};

    fn recorder() -> (
        AudioRecordRecorder<SimulatedReadBackend>,
        SimulatedReadController,
        SharedMemorySink,
    ) {
        let controller = SimulatedReadController::new();
        let sink = SharedMemorySink::new();
        let recorder = AudioRecordRecorder::new(controller.backend(), Box::new(sink.clone()));
        (recorder, controller, sink)
    }

    fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn hardware_buffer_is_twice_the_larger_of_minimum_and_chunk() {
        let mono = StreamFormat::negotiate(16_000, 1);
        assert_eq!(hardware_buffer_bytes(mono, Some(1_000)), 2_000);
        assert_eq!(hardware_buffer_bytes(mono, Some(100)), 640);
        assert_eq!(hardware_buffer_bytes(mono, None), 640);

        let stereo = StreamFormat::negotiate(48_000, 2);
        assert_eq!(hardware_buffer_bytes(stereo, Some(3_840)), 7_680);
    }

    #[test]
    fn init_sizes_the_hardware_buffer_from_the_driver_minimum() {
        let (mut rec, ctl, _sink) = recorder();
        ctl.set_min_buffer_bytes(Some(1_000));
        rec.init_recording(16_000, 1).unwrap();
        assert_eq!(rec.buffer_bytes(), Some(2_000));
        assert_eq!(ctl.last_buffer_bytes(), 2_000);
        assert_eq!(ctl.live_sources(), 1);
    }

    #[test]
    fn missing_minimum_falls_back_to_one_chunk() {
        let (mut rec, ctl, _sink) = recorder();
        ctl.set_min_buffer_bytes(None);
        rec.init_recording(44_100, 2).unwrap();
        assert_eq!(rec.buffer_bytes(), Some(3_528));
    }

    #[test]
    fn full_buffers_are_written_in_order() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        assert!(rec.is_capturing());

        for i in 0..5 {
            ctl.push(&[i as i16; 160]);
        }
        wait_until("five buffers", || sink.len() == 1600);
        rec.stop_recording().unwrap();

        let bytes = sink.bytes();
        assert_eq!(&bytes[0..2], &[0, 0]);
        assert_eq!(&bytes[1598..1600], &[4, 0]);
        assert_eq!(rec.diagnostics().frames_written, 800);
        assert!(!rec.is_capturing());
        assert!(!ctl.is_recording());
    }

    #[test]
    fn short_reads_are_counted_and_not_written() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();

        ctl.push(&[1; 100]);
        ctl.push(&[2; 160]);
        wait_until("full buffer", || sink.len() == 320);
        rec.stop_recording().unwrap();

        assert_eq!(rec.diagnostics().short_reads, 1);
        assert_eq!(ctl.pending(), 0);
        assert_eq!(sink.bytes(), [2u8, 0].repeat(160));
    }

    #[test]
    fn read_error_ends_capture_but_stop_still_succeeds() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        ctl.update_faults(|f| f.read = true);
        rec.start_recording().unwrap();

        wait_until("read error", || rec.diagnostics().read_errors == 1);
        wait_until("source stopped", || !ctl.is_recording());
        rec.stop_recording().unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn start_before_init_is_a_state_error() {
        let (mut rec, _ctl, _sink) = recorder();
        assert!(matches!(rec.start_recording(), Err(RecorderError::State(_))));
        assert_eq!(rec.state(), RecorderState::Uninitialized);
    }

    #[test]
    fn stop_without_recording_is_a_state_error() {
        let (mut rec, _ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        assert!(matches!(rec.stop_recording(), Err(RecorderError::State(_))));
    }

    #[test]
    fn open_failure_is_an_init_error() {
        let (mut rec, ctl, _sink) = recorder();
        ctl.update_faults(|f| f.open = true);
        assert!(matches!(
            rec.init_recording(16_000, 1),
            Err(RecorderError::Init(_))
        ));
        assert_eq!(rec.state(), RecorderState::Uninitialized);
        assert_eq!(ctl.live_sources(), 0);
    }

    #[test]
    fn rejected_start_spawns_no_thread() {
        let (mut rec, ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        ctl.update_faults(|f| f.start = true);
        assert!(matches!(
            rec.start_recording(),
            Err(RecorderError::StartRecording(_))
        ));
        assert_eq!(rec.state(), RecorderState::Initialized);
        assert!(!rec.is_capturing());
    }

    #[test]
    fn stop_failure_is_reported_and_capture_can_restart() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        ctl.update_faults(|f| f.stop = true);

        assert!(matches!(rec.stop_recording(), Err(RecorderError::Stop(_))));
        assert_eq!(rec.state(), RecorderState::Initialized);
        assert!(!rec.is_capturing());

        ctl.set_faults(ReadFaults::default());
        rec.start_recording().unwrap();
        ctl.push(&[9; 160]);
        wait_until("buffer after restart", || sink.len() == 320);
        rec.stop_recording().unwrap();
    }

    #[test]
    fn restart_reuses_the_source() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        for _ in 0..2 {
            rec.start_recording().unwrap();
            ctl.push(&[1; 160]);
            let expected = sink.len() + 320;
            wait_until("buffer", || sink.len() == expected);
            rec.stop_recording().unwrap();
        }
        assert_eq!(ctl.opened_sources(), 1);
        assert_eq!(sink.len(), 640);
    }

    #[test]
    fn release_while_recording_stops_and_frees_the_source() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();

        rec.release().unwrap();
        assert_eq!(rec.state(), RecorderState::Released);
        assert!(!rec.is_capturing());
        assert_eq!(ctl.live_sources(), 0);
        assert!(sink.is_closed());
        rec.release().unwrap();
    }

    #[test]
    fn producer_racing_stop_and_release_writes_nothing_after_stop() {
        for _ in 0..50 {
            let (mut rec, ctl, sink) = recorder();
            rec.init_recording(16_000, 1).unwrap();
            rec.start_recording().unwrap();

            let running = Arc::new(AtomicBool::new(true));
            let producer = {
                let ctl = ctl.clone();
                let running = Arc::clone(&running);
                thread::spawn(move || {
                    while running.load(Ordering::Acquire) {
                        ctl.push(&[5; 160]);
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
            producer.join().unwrap();

            assert_eq!(sink.len(), after_stop);
            assert_eq!(after_stop % 320, 0);
            assert_eq!(rec.diagnostics().sink_write_failures, 0);
            assert_eq!(ctl.live_sources(), 0);
        }
    }
}
