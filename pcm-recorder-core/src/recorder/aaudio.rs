use crate::models::audio_models::{BackendType, CaptureDiagnostics, StreamFormat};
use crate::models::error::RecorderError;
use crate::models::state::RecorderState;
use crate::traits::recorder::Recorder;
use crate::traits::sample_sink::SampleSink;
use crate::traits::stream::{AudioStream, StreamBackend};

use super::shared::RecorderCore;
use super::stream_capture::{close_stream, flush_sink, open_stream, start_stream};

/// Push-style recorder that opens a fresh stream per capture.
///
/// Stop closes the stream and leaves the recorder `Stopped`; a later
/// `init_recording` opens a new one.
pub struct AAudioRecorder<B: StreamBackend> {
    core: RecorderCore,
    driver: B,
    stream: Option<B::Stream>,
    format: Option<StreamFormat>,
    device_id: Option<String>,
}

impl<B: StreamBackend> AAudioRecorder<B> {
    pub fn new(driver: B, sink: Box<dyn SampleSink>) -> Self {
        log::info!("=== AAudioRecorder created ===");
        Self {
            core: RecorderCore::new(BackendType::AAudio, sink),
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

impl<B: StreamBackend> Recorder for AAudioRecorder<B> {
    fn backend_type(&self) -> BackendType {
        BackendType::AAudio
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
            log::warn!("[AAudio] InitRecording error, invalid state: {}", state.as_str());
            return Err(RecorderError::State(format!(
                "InitRecording not allowed while {}",
                state.as_str()
            )));
        }

        let (stream, format) = open_stream(
            &mut self.driver,
            &self.core.shared,
            BackendType::AAudio,
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
        log::info!("[AAudio] StartRecording ....");
        self.core.require(RecorderState::Initialized, "StartRecording")?;
        start_stream(&self.core, self.stream.as_mut())
    }

    fn stop_recording(&mut self) -> Result<(), RecorderError> {
        log::info!("[AAudio] StopRecording ...");
        self.core.require(RecorderState::Recording, "StopRecording")?;

        let mut first_error = None;
        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.request_stop() {
                log::warn!("[AAudio] StopRecording requestStop error: {}", e);
                first_error = Some(RecorderError::Stop(format!("request stop failed: {}", e)));
            }
        }

        self.core.set_state(RecorderState::Stopped);

        if let Some(stream) = self.stream.take() {
            if let Err(e) = close_stream(BackendType::AAudio, stream) {
                first_error =
                    first_error.or(Some(RecorderError::Stop(format!("close failed: {}", e))));
            }
        }
        flush_sink(&self.core);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn release(&mut self) -> Result<(), RecorderError> {
        if self.core.state().is_released() {
            return Ok(());
        }
        if self.core.state().is_recording() {
            if let Err(e) = self.stop_recording() {
                log::warn!("[AAudio] Stop during release failed: {}", e);
            }
        }
        if let Some(stream) = self.stream.take() {
            // Errors are already logged; release carries on regardless.
            let _ = close_stream(BackendType::AAudio, stream);
        }
        self.core.release_sink()
    }
}

impl<B: StreamBackend> Drop for AAudioRecorder<B> {
    fn drop(&mut self) {
        log::info!("=== AAudioRecorder dropped ===");
        if let Err(e) = self.release() {
            log::error!("Release on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::models::error::{DriverError, DriverErrorKind};
    use crate::simulated::{SharedMemorySink, SimulatedStreamBackend, SimulatedStreamController};
    use crate::traits::stream::{DataCallbackResult, StreamState};

    fn recorder() -> (
        AAudioRecorder<SimulatedStreamBackend>,
        SimulatedStreamController,
        SharedMemorySink,
    ) {
        let controller = SimulatedStreamController::new();
        let sink = SharedMemorySink::new();
        let recorder = AAudioRecorder::new(controller.backend(), Box::new(sink.clone()));
        (recorder, controller, sink)
    }

    #[test]
    fn push_blocks_are_written_synchronously() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(48_000, 2).unwrap();
        rec.start_recording().unwrap();

        assert_eq!(ctl.deliver(&[1; 192]), Some(DataCallbackResult::Continue));
        assert_eq!(ctl.deliver(&[1; 64]), Some(DataCallbackResult::Continue));
        assert_eq!(sink.len(), (96 + 32) * 2 * 2);
        assert_eq!(rec.diagnostics().frames_written, 128);
    }

    #[test]
    fn stop_closes_the_stream_and_init_reopens() {
        let (mut rec, ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        rec.stop_recording().unwrap();

        assert_eq!(rec.state(), RecorderState::Stopped);
        assert!(!rec.has_open_stream());
        assert_eq!(ctl.live_streams(), 0);
        assert!(matches!(
            rec.start_recording(),
            Err(RecorderError::State(_))
        ));

        rec.init_recording(16_000, 1).unwrap();
        assert_eq!(ctl.opened_streams(), 2);
        rec.start_recording().unwrap();
        assert_eq!(ctl.stream_state(), Some(StreamState::Started));
    }

    #[test]
    fn late_block_after_stop_is_discarded() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        ctl.deliver(&[5; 160]);
        assert_eq!(sink.len(), 320);

        rec.stop_recording().unwrap();
        // Closed streams have no callback left to race.
        assert_eq!(ctl.deliver_late(&[5; 160]), None);
        assert_eq!(sink.len(), 320);
    }

    #[test]
    fn rejected_start_leaves_recorder_initialized() {
        let (mut rec, ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        ctl.update_faults(|f| f.start = true);

        assert!(matches!(
            rec.start_recording(),
            Err(RecorderError::StartRecording(_))
        ));
        assert_eq!(rec.state(), RecorderState::Initialized);
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
        assert_eq!(ctl.live_streams(), 0);
    }

    #[test]
    fn stop_failure_still_closes_the_stream() {
        let (mut rec, ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        ctl.update_faults(|f| f.stop = true);

        assert!(matches!(rec.stop_recording(), Err(RecorderError::Stop(_))));
        assert_eq!(rec.state(), RecorderState::Stopped);
        assert_eq!(ctl.live_streams(), 0);
    }

    #[test]
    fn init_then_release_closes_stream_and_sink() {
        let (mut rec, ctl, sink) = recorder();
        rec.init_recording(44_100, 2).unwrap();
        assert_eq!(ctl.live_streams(), 1);

        rec.release().unwrap();
        assert_eq!(ctl.live_streams(), 0);
        assert!(sink.is_closed());
        assert_eq!(rec.state(), RecorderState::Released);
    }

    #[test]
    fn stream_errors_do_not_change_state() {
        let (mut rec, ctl, _sink) = recorder();
        rec.init_recording(16_000, 1).unwrap();
        rec.start_recording().unwrap();
        assert!(ctl.raise_error(DriverError::new(
            DriverErrorKind::ResourceLost,
            "device unplugged",
        )));
        assert_eq!(rec.state(), RecorderState::Recording);
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
                        ctl.deliver_late(&[5; 160]);
                        thread::yield_now();
                    }
                })
            };

            let deadline = Instant::now() + Duration::from_secs(2);
            while sink.is_empty() {
                assert!(Instant::now() < deadline, "no block delivered");
                thread::yield_now();
            }
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
            assert_eq!(ctl.live_streams(), 0);
        }
    }
}
