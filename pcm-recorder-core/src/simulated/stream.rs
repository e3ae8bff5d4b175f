use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::StreamFormat;
use crate::models::config::StreamRequest;
use crate::models::error::{DriverError, DriverErrorKind};
use crate::traits::stream::{
    AudioStream, DataCallback, DataCallbackResult, ErrorCallback, FrameBlock, StreamBackend,
    StreamState,
};

/// Failures the simulated stream driver can be told to produce.
#[derive(Debug, Clone, Default)]
pub struct StreamFaults {
    pub open: bool,
    pub start: bool,
    pub stop: bool,
    pub close: bool,
}

struct SimStream {
    format: StreamFormat,
    state: Mutex<StreamState>,
    data_callback: Mutex<Option<DataCallback>>,
    error_callback: Mutex<Option<ErrorCallback>>,
}

impl SimStream {
    fn deliver(&self, samples: &[i16], require_started: bool) -> Option<DataCallbackResult> {
        if require_started && *self.state.lock() != StreamState::Started {
            return None;
        }
        let mut callback = self.data_callback.lock();
        let cb = callback.as_mut()?;
        let result = cb(FrameBlock::new(samples, self.format.channels));
        if result == DataCallbackResult::Stop {
            *self.state.lock() = StreamState::Stopped;
        }
        Some(result)
    }
}

/// Stream handed out by [`SimulatedStreamBackend`].
pub struct SimulatedStream {
    inner: Arc<SimStream>,
    controller: SimulatedStreamController,
    closed: bool,
}

impl SimulatedStream {
    fn fail_if(&self, f: impl Fn(&StreamFaults) -> bool, what: &str) -> Result<(), DriverError> {
        if f(&*self.controller.faults.lock()) {
            return Err(DriverError::new(
                DriverErrorKind::InternalError,
                format!("simulated {} failure", what),
            ));
        }
        Ok(())
    }
}

impl AudioStream for SimulatedStream {
    fn state(&self) -> StreamState {
        *self.inner.state.lock()
    }

    fn format(&self) -> StreamFormat {
        self.inner.format
    }

    fn request_start(&mut self) -> Result<(), DriverError> {
        self.fail_if(|f| f.start, "start")?;
        *self.inner.state.lock() = StreamState::Started;
        Ok(())
    }

    fn request_stop(&mut self) -> Result<(), DriverError> {
        self.fail_if(|f| f.stop, "stop")?;
        *self.inner.state.lock() = StreamState::Stopped;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        let result = self.fail_if(|f| f.close, "close");
        // The handle is gone either way; waits for an in-flight callback.
        self.closed = true;
        *self.inner.data_callback.lock() = None;
        *self.inner.error_callback.lock() = None;
        *self.inner.state.lock() = StreamState::Closed;
        self.controller.live_streams.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// In-process stream driver. Audio is injected through its
/// [`SimulatedStreamController`].
pub struct SimulatedStreamBackend {
    controller: SimulatedStreamController,
}

impl StreamBackend for SimulatedStreamBackend {
    type Stream = SimulatedStream;

    fn open_stream(
        &mut self,
        request: &StreamRequest,
        data_callback: DataCallback,
        error_callback: Option<ErrorCallback>,
    ) -> Result<Self::Stream, DriverError> {
        if self.controller.faults.lock().open {
            return Err(DriverError::new(
                DriverErrorKind::ResourceError,
                "simulated open failure",
            ));
        }

        let inner = Arc::new(SimStream {
            format: request.format,
            state: Mutex::new(StreamState::Open),
            data_callback: Mutex::new(Some(data_callback)),
            error_callback: Mutex::new(error_callback),
        });
        *self.controller.current.lock() = Some(Arc::clone(&inner));
        self.controller.live_streams.fetch_add(1, Ordering::SeqCst);
        self.controller.opened_streams.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedStream {
            inner,
            controller: self.controller.clone(),
            closed: false,
        })
    }
}

/// Test-side handle onto the streams a backend opens.
#[derive(Clone, Default)]
pub struct SimulatedStreamController {
    current: Arc<Mutex<Option<Arc<SimStream>>>>,
    faults: Arc<Mutex<StreamFaults>>,
    live_streams: Arc<AtomicUsize>,
    opened_streams: Arc<AtomicUsize>,
}

impl SimulatedStreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(&self) -> SimulatedStreamBackend {
        SimulatedStreamBackend {
            controller: self.clone(),
        }
    }

    pub fn set_faults(&self, faults: StreamFaults) {
        *self.faults.lock() = faults;
    }

    pub fn update_faults(&self, f: impl FnOnce(&mut StreamFaults)) {
        f(&mut *self.faults.lock());
    }

    fn stream(&self) -> Option<Arc<SimStream>> {
        self.current.lock().clone()
    }

    /// Push one block through the data callback if the stream is started.
    pub fn deliver(&self, samples: &[i16]) -> Option<DataCallbackResult> {
        self.stream()?.deliver(samples, true)
    }

    /// Push a block regardless of the stream state, as a racing driver thread would.
    pub fn deliver_late(&self, samples: &[i16]) -> Option<DataCallbackResult> {
        self.stream()?.deliver(samples, false)
    }

    /// Raise an asynchronous stream error.
    pub fn raise_error(&self, error: DriverError) -> bool {
        let Some(stream) = self.stream() else {
            return false;
        };
        let mut callback = stream.error_callback.lock();
        match callback.as_mut() {
            Some(cb) => {
                cb(error);
                true
            }
            None => false,
        }
    }

    pub fn stream_state(&self) -> Option<StreamState> {
        self.stream().map(|s| *s.state.lock())
    }

    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    pub fn opened_streams(&self) -> usize {
        self.opened_streams.load(Ordering::SeqCst)
    }
}
