use crate::models::config::StreamRequest;
use crate::models::error::DriverError;
use crate::models::audio_models::StreamFormat;

/// Lifecycle state reported by a callback stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Open,
    Starting,
    Started,
    Stopping,
    Stopped,
    Closing,
    Closed,
    Disconnected,
}

/// What the stream should do after a data callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataCallbackResult {
    Continue,
    Stop,
}

/// One block of captured frames delivered by a stream.
#[derive(Debug, Clone, Copy)]
pub struct FrameBlock<'a> {
    /// Interleaved samples. At least `num_frames * channel_count` long.
    pub data: &'a [i16],
    pub num_frames: usize,
    pub channel_count: u16,
}

impl<'a> FrameBlock<'a> {
    pub fn new(data: &'a [i16], channel_count: u16) -> Self {
        let num_frames = if channel_count == 0 {
            0
        } else {
            data.len() / channel_count as usize
        };
        Self {
            data,
            num_frames,
            channel_count,
        }
    }

    /// Bytes of 16-bit PCM this block represents.
    pub fn byte_len(&self) -> usize {
        self.channel_count as usize * self.num_frames * 2
    }

    /// The samples covered by `num_frames`.
    pub fn samples(&self) -> &'a [i16] {
        let len = (self.num_frames * self.channel_count as usize).min(self.data.len());
        &self.data[..len]
    }
}

/// Data callback, invoked on the stream's real-time thread.
pub type DataCallback =
    Box<dyn for<'a> FnMut(FrameBlock<'a>) -> DataCallbackResult + Send + 'static>;

/// Error callback, invoked when the stream fails asynchronously.
pub type ErrorCallback = Box<dyn FnMut(DriverError) + Send + 'static>;

/// An open callback-driven capture stream.
pub trait AudioStream: Send {
    fn state(&self) -> StreamState;

    /// The format the stream actually delivers.
    fn format(&self) -> StreamFormat;

    fn request_start(&mut self) -> Result<(), DriverError>;

    fn request_stop(&mut self) -> Result<(), DriverError>;

    /// Close the stream. Once this returns the data callback is never invoked again.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens callback-driven capture streams.
pub trait StreamBackend: Send {
    type Stream: AudioStream;

    fn open_stream(
        &mut self,
        request: &StreamRequest,
        data_callback: DataCallback,
        error_callback: Option<ErrorCallback>,
    ) -> Result<Self::Stream, DriverError>;
}
