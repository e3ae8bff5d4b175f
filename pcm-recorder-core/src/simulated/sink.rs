use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::RecorderError;
use crate::traits::sample_sink::SampleSink;

#[derive(Debug, Default)]
struct MemoryState {
    bytes: Vec<u8>,
    closed: bool,
    flushes: usize,
    fail_writes: bool,
}

/// In-memory sink whose clones observe the same bytes.
///
/// Hand one clone to a recorder and keep another to inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct SharedMemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl SharedMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.state.lock().bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }
}

impl SampleSink for SharedMemorySink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), RecorderError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RecorderError::Storage("write to closed sink".into()));
        }
        if state.fail_writes {
            return Err(RecorderError::Storage("simulated write failure".into()));
        }
        state.bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        self.state.lock().flushes += 1;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.state.lock().bytes.len() as u64
    }

    fn close(&mut self) -> Result<(), RecorderError> {
        let mut state = self.state.lock();
        state.flushes += 1;
        state.closed = true;
        Ok(())
    }
}
