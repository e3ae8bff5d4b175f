//! Callback stream backend: every cpal callback is pushed straight to the recorder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pcm_recorder_core::models::audio_models::StreamFormat;
use pcm_recorder_core::models::config::StreamRequest;
use pcm_recorder_core::models::error::DriverError;
use pcm_recorder_core::traits::stream::{
    AudioStream, DataCallback, DataCallbackResult, ErrorCallback, FrameBlock, StreamBackend,
    StreamState,
};

use crate::device::{resolve_input_device, stream_config};
use crate::error::stream_error;
use crate::stream_thread::{build_i16_input_stream, StreamThread};

/// Opens cpal input streams that deliver `FrameBlock`s to a data callback.
#[derive(Debug, Default, Clone)]
pub struct CpalStreamBackend;

impl CpalStreamBackend {
    pub fn new() -> Self {
        Self
    }
}

impl StreamBackend for CpalStreamBackend {
    type Stream = CpalStream;

    fn open_stream(
        &mut self,
        request: &StreamRequest,
        data_callback: DataCallback,
        error_callback: Option<ErrorCallback>,
    ) -> Result<Self::Stream, DriverError> {
        let request = request.clone();
        let format = request.format;
        let halted = Arc::new(AtomicBool::new(false));
        let halted_in_callback = Arc::clone(&halted);

        let thread = StreamThread::spawn("pcm-cpal-stream", move || {
            let device = resolve_input_device(request.device_id.as_deref())?;
            let (config, sample_format) = stream_config(&device, &request)?;
            let channels = config.channels;

            let mut data_callback = data_callback;
            let mut error_callback = error_callback;
            build_i16_input_stream(
                &device,
                &config,
                sample_format,
                move |samples: &[i16]| {
                    if halted_in_callback.load(Ordering::Acquire) {
                        return;
                    }
                    if data_callback(FrameBlock::new(samples, channels)) == DataCallbackResult::Stop
                    {
                        halted_in_callback.store(true, Ordering::Release);
                    }
                },
                move |e| {
                    let e = stream_error(e);
                    match error_callback.as_mut() {
                        Some(cb) => cb(e),
                        None => log::error!("cpal stream error: {}", e),
                    }
                },
            )
        })?;

        log::info!(
            "Opened cpal input stream: {} Hz, {} ch",
            format.sample_rate,
            format.channels
        );
        Ok(CpalStream {
            thread,
            format,
            state: StreamState::Open,
            halted,
        })
    }
}

/// An open cpal input stream, owned by its own thread.
pub struct CpalStream {
    thread: StreamThread,
    format: StreamFormat,
    state: StreamState,
    halted: Arc<AtomicBool>,
}

impl AudioStream for CpalStream {
    fn state(&self) -> StreamState {
        self.state
    }

    fn format(&self) -> StreamFormat {
        self.format
    }

    fn request_start(&mut self) -> Result<(), DriverError> {
        self.state = StreamState::Starting;
        self.halted.store(false, Ordering::Release);
        match self.thread.play() {
            Ok(()) => {
                self.state = StreamState::Started;
                Ok(())
            }
            Err(e) => {
                self.state = StreamState::Open;
                Err(e)
            }
        }
    }

    fn request_stop(&mut self) -> Result<(), DriverError> {
        self.state = StreamState::Stopping;
        let result = self.thread.pause();
        self.state = StreamState::Stopped;
        result
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if self.state == StreamState::Closed {
            return Ok(());
        }
        self.state = StreamState::Closing;
        let result = self.thread.close();
        self.state = StreamState::Closed;
        result
    }
}
