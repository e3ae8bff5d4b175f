use crate::models::audio_models::{BackendType, StreamFormat, BYTES_PER_SAMPLE};
use crate::models::config::StreamRequest;
use crate::models::error::{DriverError, RecorderError};
use crate::models::state::RecorderState;
use crate::processing::pcm;
use crate::traits::stream::{
    AudioStream, DataCallback, DataCallbackResult, ErrorCallback, FrameBlock, StreamBackend,
    StreamState,
};

use super::shared::{RecorderCore, SharedCapture};

/// Data callback for push-style streams.
///
/// The driver owns its buffers; the recorder only converts the block to
/// little-endian bytes and appends `channels * frames * 2` bytes to the sink.
pub(crate) fn data_callback(
    shared: SharedCapture,
    backend: BackendType,
    format: StreamFormat,
) -> DataCallback {
    let mut staging = staging_buffer(format);

    Box::new(move |block: FrameBlock<'_>| {
        let mut s = shared.lock();
        if !s.state.is_recording() {
            s.discard_stray(backend);
            return DataCallbackResult::Continue;
        }

        pcm::encode_le_into(&mut staging, block.samples());
        debug_assert_eq!(staging.len(), block.byte_len());
        s.write(&staging, block.num_frames);
        DataCallbackResult::Continue
    })
}

/// Byte staging area holding one 10 ms buffer of `format`, allocated off the audio thread.
pub(crate) fn staging_buffer(format: StreamFormat) -> Vec<u8> {
    Vec::with_capacity(format.samples_per_buffer() * BYTES_PER_SAMPLE)
}

pub(crate) fn error_callback(backend: BackendType) -> ErrorCallback {
    Box::new(move |error: DriverError| {
        log::error!("[{}] stream error callback: {}", backend, error);
    })
}

/// Negotiate `sample_rate`/`channels` and open a stream wired to `shared`.
pub(crate) fn open_stream<B: StreamBackend>(
    driver: &mut B,
    shared: &SharedCapture,
    backend: BackendType,
    sample_rate: u32,
    channels: u16,
    device_id: Option<String>,
) -> Result<(B::Stream, StreamFormat), RecorderError> {
    let format = StreamFormat::negotiate(sample_rate, channels);
    let request = StreamRequest::capture(format).with_device(device_id);
    request.validate().map_err(|e| {
        log::warn!("[{}] InitRecording rejected: {}", backend, e);
        RecorderError::Init(e)
    })?;

    let stream = driver
        .open_stream(
            &request,
            data_callback(shared.clone(), backend, format),
            Some(error_callback(backend)),
        )
        .map_err(|e| {
            log::warn!("[{}] InitRecording openStream error: {}", backend, e);
            RecorderError::Init(format!("open stream failed: {}", e))
        })?;

    log::info!(
        "[{}] InitRecording: {} Hz, {} ch",
        backend,
        format.sample_rate,
        format.channels
    );
    Ok((stream, format))
}

/// Move to Recording and start the stream, reverting to Initialized if the driver refuses.
pub(crate) fn start_stream<S: AudioStream>(
    core: &RecorderCore,
    stream: Option<&mut S>,
) -> Result<(), RecorderError> {
    let backend = core.backend;
    let stream = stream.ok_or_else(|| {
        log::warn!("[{}] StartRecording: no open stream", backend);
        RecorderError::State("no open stream".into())
    })?;

    let stream_state = stream.state();
    if !matches!(stream_state, StreamState::Open | StreamState::Stopped) {
        log::warn!(
            "[{}] StartRecording: stream is in state {:?}",
            backend,
            stream_state
        );
        return Err(RecorderError::State(format!(
            "stream is in state {:?}",
            stream_state
        )));
    }

    core.set_state(RecorderState::Recording);
    if let Err(e) = stream.request_start() {
        log::warn!("[{}] StartRecording requestStart error: {}", backend, e);
        core.set_state(RecorderState::Initialized);
        return Err(RecorderError::StartRecording(format!(
            "request start failed: {}",
            e
        )));
    }
    Ok(())
}

/// Close a stream, logging the driver error.
pub(crate) fn close_stream<S: AudioStream>(backend: BackendType, mut stream: S) -> Result<(), DriverError> {
    stream.close().map_err(|e| {
        log::warn!("[{}] close stream error: {}", backend, e);
        e
    })
}

/// Flush whatever the sink buffered so far without closing it.
pub(crate) fn flush_sink(core: &RecorderCore) {
    let mut shared = core.shared.lock();
    if let Some(sink) = shared.sink.as_mut() {
        if let Err(e) = sink.flush() {
            log::warn!("[{}] flush failed: {}", core.backend, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_holds_a_full_block_without_growing() {
        let format = StreamFormat::negotiate(48_000, 2);
        let mut staging = staging_buffer(format);
        let before = staging.as_ptr();

        let block = vec![7i16; format.samples_per_buffer()];
        pcm::encode_le_into(&mut staging, &block);

        assert_eq!(staging.len(), 1920);
        assert_eq!(staging.as_ptr(), before);
    }
}
