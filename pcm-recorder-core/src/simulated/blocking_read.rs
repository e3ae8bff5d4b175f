use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::audio_models::StreamFormat;
use crate::models::config::StreamRequest;
use crate::models::error::{DriverError, DriverErrorKind};
use crate::traits::blocking_read::{BlockingReadBackend, BlockingSource};

/// How long a read waits for pushed audio before returning empty.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Failures the simulated blocking-read driver can be told to produce.
#[derive(Debug, Clone, Default)]
pub struct ReadFaults {
    pub open: bool,
    pub start: bool,
    pub stop: bool,
    pub read: bool,
}

#[derive(Default)]
struct ReadState {
    pending: Mutex<VecDeque<Vec<i16>>>,
    available: Condvar,
    recording: AtomicBool,
    faults: Mutex<ReadFaults>,
    min_buffer_bytes: Mutex<Option<usize>>,
    last_buffer_bytes: AtomicUsize,
    live_sources: AtomicUsize,
    opened_sources: AtomicUsize,
}

impl ReadState {
    fn fail_if(&self, f: impl Fn(&ReadFaults) -> bool, what: &str) -> Result<(), DriverError> {
        if f(&*self.faults.lock()) {
            return Err(DriverError::new(
                DriverErrorKind::IoError,
                format!("simulated {} failure", what),
            ));
        }
        Ok(())
    }
}

/// Source handed out by [`SimulatedReadBackend`]. Each read returns one pushed chunk.
pub struct SimulatedReadSource {
    state: Arc<ReadState>,
    format: StreamFormat,
    released: bool,
}

impl BlockingSource for SimulatedReadSource {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(&mut self) -> Result<(), DriverError> {
        self.state.fail_if(|f| f.start, "start")?;
        self.state.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.state.fail_if(|f| f.stop, "stop")?;
        self.state.recording.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.state.recording.load(Ordering::SeqCst)
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize, DriverError> {
        self.state.fail_if(|f| f.read, "read")?;
        if !self.is_recording() {
            return Err(DriverError::new(
                DriverErrorKind::PreconditionsViolated,
                "read while not recording",
            ));
        }

        let mut pending = self.state.pending.lock();
        if pending.is_empty() {
            self.state.available.wait_for(&mut pending, READ_TIMEOUT);
        }
        let Some(chunk) = pending.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(out.len());
        out[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.state.recording.store(false, Ordering::SeqCst);
            self.state.live_sources.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SimulatedReadSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// In-process blocking-read driver. Audio is pushed through its
/// [`SimulatedReadController`].
pub struct SimulatedReadBackend {
    state: Arc<ReadState>,
}

impl BlockingReadBackend for SimulatedReadBackend {
    type Source = SimulatedReadSource;

    fn min_buffer_bytes(&self, _request: &StreamRequest) -> Result<usize, DriverError> {
        let min = *self.state.min_buffer_bytes.lock();
        min.ok_or_else(|| {
            DriverError::new(
                DriverErrorKind::FeatureUnsupported,
                "minimum buffer size not reported",
            )
        })
    }

    fn open_source(
        &mut self,
        request: &StreamRequest,
        buffer_bytes: usize,
    ) -> Result<Self::Source, DriverError> {
        self.state.fail_if(|f| f.open, "open")?;
        self.state.last_buffer_bytes.store(buffer_bytes, Ordering::SeqCst);
        self.state.live_sources.fetch_add(1, Ordering::SeqCst);
        self.state.opened_sources.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedReadSource {
            state: Arc::clone(&self.state),
            format: request.format,
            released: false,
        })
    }
}

/// Test-side handle onto the sources a backend opens.
#[derive(Clone, Default)]
pub struct SimulatedReadController {
    state: Arc<ReadState>,
}

impl SimulatedReadController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(&self) -> SimulatedReadBackend {
        SimulatedReadBackend {
            state: Arc::clone(&self.state),
        }
    }

    pub fn set_faults(&self, faults: ReadFaults) {
        *self.state.faults.lock() = faults;
    }

    pub fn update_faults(&self, f: impl FnOnce(&mut ReadFaults)) {
        f(&mut *self.state.faults.lock());
    }

    /// Minimum hardware buffer the driver reports, or None to make the query fail.
    pub fn set_min_buffer_bytes(&self, bytes: Option<usize>) {
        *self.state.min_buffer_bytes.lock() = bytes;
    }

    /// Queue one chunk; the next read returns it whole or truncated to the read size.
    pub fn push(&self, samples: &[i16]) {
        self.state.pending.lock().push_back(samples.to_vec());
        self.state.available.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.state.pending.lock().len()
    }

    pub fn is_recording(&self) -> bool {
        self.state.recording.load(Ordering::SeqCst)
    }

    pub fn last_buffer_bytes(&self) -> usize {
        self.state.last_buffer_bytes.load(Ordering::SeqCst)
    }

    pub fn live_sources(&self) -> usize {
        self.state.live_sources.load(Ordering::SeqCst)
    }

    pub fn opened_sources(&self) -> usize {
        self.state.opened_sources.load(Ordering::SeqCst)
    }
}
