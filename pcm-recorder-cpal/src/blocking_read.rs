//! Blocking-read backend: cpal callbacks fill a bounded sample buffer that the
//! recorder's capture thread drains with blocking reads.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::StreamConfig;
use parking_lot::{Condvar, Mutex};

use pcm_recorder_core::models::audio_models::{StreamFormat, BYTES_PER_SAMPLE};
use pcm_recorder_core::models::config::StreamRequest;
use pcm_recorder_core::models::error::{DriverError, DriverErrorKind};
use pcm_recorder_core::traits::blocking_read::{BlockingReadBackend, BlockingSource};

use crate::device::{buffer_size_for, min_buffer_frames, resolve_input_device, supported_range};
use crate::error::stream_error;
use crate::stream_thread::{build_i16_input_stream, StreamThread};

/// How long a read waits for the device before returning what it has.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// The pending buffer always holds at least this many 10 ms chunks, since a
/// single cpal callback can exceed the requested hardware buffer.
const MIN_BUFFERED_CHUNKS: usize = 10;

#[derive(Default)]
struct Pending {
    samples: VecDeque<i16>,
    recording: bool,
    dropped: u64,
    error: Option<DriverError>,
}

/// Samples handed from the cpal callback to the reading thread.
pub(crate) struct ReadShared {
    pending: Mutex<Pending>,
    available: Condvar,
    capacity: usize,
}

impl ReadShared {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Append samples from the device, dropping the oldest on overflow.
    pub(crate) fn push(&self, samples: &[i16]) {
        let mut pending = self.pending.lock();
        if !pending.recording {
            return;
        }
        pending.samples.extend(samples.iter().copied());
        let excess = pending.samples.len().saturating_sub(self.capacity);
        if excess > 0 {
            pending.samples.drain(..excess);
            if pending.dropped == 0 {
                log::warn!("[audiorecord] read buffer overflow, dropping oldest samples");
            }
            pending.dropped += excess as u64;
        }
        drop(pending);
        self.available.notify_one();
    }

    /// Record a stream failure; the next read returns it.
    pub(crate) fn fail(&self, error: DriverError) {
        self.pending.lock().error = Some(error);
        self.available.notify_all();
    }

    pub(crate) fn set_recording(&self, recording: bool) {
        let mut pending = self.pending.lock();
        pending.recording = recording;
        if !recording {
            pending.samples.clear();
        }
        drop(pending);
        self.available.notify_all();
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.pending.lock().recording
    }

    /// Samples dropped to overflow since the buffer was created.
    pub(crate) fn dropped(&self) -> u64 {
        self.pending.lock().dropped
    }

    /// Fill `out` from the buffer, waiting up to `timeout` for it to fill.
    pub(crate) fn read(&self, out: &mut [i16], timeout: Duration) -> Result<usize, DriverError> {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        loop {
            if let Some(e) = pending.error.take() {
                return Err(e);
            }
            if !pending.recording {
                return Err(DriverError::new(
                    DriverErrorKind::PreconditionsViolated,
                    "read while not recording",
                ));
            }
            if pending.samples.len() >= out.len() {
                break;
            }
            if self.available.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }

        let n = pending.samples.len().min(out.len());
        for (slot, sample) in out.iter_mut().zip(pending.samples.drain(..n)) {
            *slot = sample;
        }
        Ok(n)
    }
}

/// Opens [`CpalReadSource`]s on the named or default input device.
#[derive(Debug, Default, Clone)]
pub struct CpalReadBackend;

impl CpalReadBackend {
    pub fn new() -> Self {
        Self
    }
}

impl BlockingReadBackend for CpalReadBackend {
    type Source = CpalReadSource;

    fn min_buffer_bytes(&self, request: &StreamRequest) -> Result<usize, DriverError> {
        let device = resolve_input_device(request.device_id.as_deref())?;
        let range = supported_range(&device, request)?;
        let frames = min_buffer_frames(&range).ok_or_else(|| {
            DriverError::new(
                DriverErrorKind::FeatureUnsupported,
                "device does not report a buffer size range",
            )
        })?;
        Ok(request.format.byte_len(frames as usize))
    }

    fn open_source(
        &mut self,
        request: &StreamRequest,
        buffer_bytes: usize,
    ) -> Result<Self::Source, DriverError> {
        let request = request.clone();
        let format = request.format;
        let capacity =
            (buffer_bytes / BYTES_PER_SAMPLE).max(format.samples_per_buffer() * MIN_BUFFERED_CHUNKS);
        let shared = Arc::new(ReadShared::new(capacity));
        let on_data = Arc::clone(&shared);
        let on_error = Arc::clone(&shared);

        let thread = StreamThread::spawn("pcm-cpal-read", move || {
            let device = resolve_input_device(request.device_id.as_deref())?;
            let range = supported_range(&device, &request)?;
            let frames = (buffer_bytes / format.bytes_per_frame()) as u32;
            let config = StreamConfig {
                channels: format.channels,
                sample_rate: cpal::SampleRate(format.sample_rate),
                buffer_size: buffer_size_for(&range.buffer, frames),
            };
            log::debug!("Read stream config: {:?}, {:?}", range.format, config.buffer_size);

            build_i16_input_stream(
                &device,
                &config,
                range.format,
                move |samples: &[i16]| on_data.push(samples),
                move |e| {
                    let e = stream_error(e);
                    log::error!("cpal read stream error: {}", e);
                    if e.kind == DriverErrorKind::ResourceLost {
                        on_error.fail(e);
                    }
                },
            )
        })?;

        log::info!(
            "Opened cpal read source: {} Hz, {} ch, {} samples buffered",
            format.sample_rate,
            format.channels,
            capacity
        );
        Ok(CpalReadSource {
            shared,
            thread,
            format,
        })
    }
}

/// A cpal input stream read through [`BlockingSource`].
pub struct CpalReadSource {
    shared: Arc<ReadShared>,
    thread: StreamThread,
    format: StreamFormat,
}

impl BlockingSource for CpalReadSource {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(&mut self) -> Result<(), DriverError> {
        self.shared.set_recording(true);
        if let Err(e) = self.thread.play() {
            self.shared.set_recording(false);
            return Err(e);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.shared.set_recording(false);
        let dropped = self.shared.dropped();
        if dropped > 0 {
            log::warn!("cpal read source dropped {} samples to overflow", dropped);
        }
        self.thread.pause()
    }

    fn is_recording(&self) -> bool {
        self.shared.is_recording()
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize, DriverError> {
        self.shared.read(out, READ_TIMEOUT)
    }

    fn release(&mut self) {
        self.shared.set_recording(false);
        if let Err(e) = self.thread.close() {
            log::warn!("Closing cpal read source: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const SHORT: Duration = Duration::from_millis(5);

    fn recording(capacity: usize) -> ReadShared {
        let shared = ReadShared::new(capacity);
        shared.set_recording(true);
        shared
    }

    #[test]
    fn full_read_takes_samples_in_order() {
        let shared = recording(16);
        shared.push(&[1, 2, 3]);
        shared.push(&[4, 5]);

        let mut out = [0i16; 4];
        assert_eq!(shared.read(&mut out, SHORT).unwrap(), 4);
        assert_eq!(out, [1, 2, 3, 4]);

        let mut rest = [0i16; 1];
        assert_eq!(shared.read(&mut rest, SHORT).unwrap(), 1);
        assert_eq!(rest, [5]);
    }

    #[test]
    fn timeout_returns_what_arrived() {
        let shared = recording(16);
        shared.push(&[9, 9]);
        let mut out = [0i16; 4];
        assert_eq!(shared.read(&mut out, SHORT).unwrap(), 2);
        assert_eq!(shared.read(&mut out, SHORT).unwrap(), 0);
    }

    #[test]
    fn overflow_drops_the_oldest_samples() {
        let shared = recording(4);
        shared.push(&[1, 2, 3]);
        shared.push(&[4, 5, 6]);
        assert_eq!(shared.dropped(), 2);

        let mut out = [0i16; 4];
        assert_eq!(shared.read(&mut out, SHORT).unwrap(), 4);
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn samples_are_ignored_and_cleared_while_stopped() {
        let shared = ReadShared::new(16);
        shared.push(&[1, 2]);
        shared.set_recording(true);
        shared.push(&[3]);
        shared.set_recording(false);
        shared.set_recording(true);

        let mut out = [0i16; 1];
        assert_eq!(shared.read(&mut out, SHORT).unwrap(), 0);
    }

    #[test]
    fn read_while_stopped_is_an_error() {
        let shared = ReadShared::new(16);
        let mut out = [0i16; 1];
        let err = shared.read(&mut out, SHORT).unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::PreconditionsViolated);
    }

    #[test]
    fn lost_device_surfaces_on_the_next_read() {
        let shared = recording(16);
        shared.fail(DriverError::new(DriverErrorKind::ResourceLost, "unplugged"));
        let mut out = [0i16; 2];
        let err = shared.read(&mut out, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::ResourceLost);
    }

    #[test]
    fn blocked_read_wakes_when_the_device_delivers() {
        let shared = Arc::new(recording(1024));
        let producer = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            for chunk in 0..4i16 {
                thread::sleep(Duration::from_millis(2));
                producer.push(&[chunk; 80]);
            }
        });

        let mut out = [0i16; 320];
        let n = shared.read(&mut out, Duration::from_secs(2)).unwrap();
        handle.join().unwrap();
        assert_eq!(n, 320);
        assert_eq!(out[0], 0);
        assert_eq!(out[319], 3);
    }
}
