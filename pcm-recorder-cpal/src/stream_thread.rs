//! A dedicated thread owning one cpal input stream.
//!
//! `cpal::Stream` is not `Send` on every host, so the stream is built, driven
//! and dropped on the same thread. The host talks to it over a command channel.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};

use pcm_recorder_core::models::error::{DriverError, DriverErrorKind};
use pcm_recorder_core::processing::pcm;

use crate::error::{build_error, pause_error, play_error, thread_gone};

/// How long `close` waits for the stream thread before detaching it.
const JOIN_TIMEOUT: Duration = Duration::from_millis(2000);

type Reply = Sender<Result<(), DriverError>>;

enum Command {
    Play(Reply),
    Pause(Reply),
    Close,
}

pub(crate) struct StreamThread {
    commands: Sender<Command>,
    finished: Receiver<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamThread {
    /// Spawn the thread and build the stream on it with `build`.
    ///
    /// Returns once the stream exists, or with the build error.
    pub(crate) fn spawn<B>(name: &str, build: B) -> Result<Self, DriverError>
    where
        B: FnOnce() -> Result<cpal::Stream, DriverError> + Send + 'static,
    {
        let (commands, command_rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let (finished_tx, finished) = mpsc::channel();

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let stream = match build() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                run(&stream, command_rx);
                drop(stream);
                let _ = finished_tx.send(());
            })
            .map_err(|e| {
                DriverError::new(
                    DriverErrorKind::ResourceError,
                    format!("failed to spawn stream thread: {}", e),
                )
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands,
                finished,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(thread_gone())
            }
        }
    }

    fn request(&self, make: impl FnOnce(Reply) -> Command) -> Result<(), DriverError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| thread_gone())?;
        reply_rx.recv().map_err(|_| thread_gone())?
    }

    pub(crate) fn play(&self) -> Result<(), DriverError> {
        self.request(Command::Play)
    }

    pub(crate) fn pause(&self) -> Result<(), DriverError> {
        self.request(Command::Pause)
    }

    /// Drop the stream and join the thread.
    ///
    /// Once this returns no further data callbacks run, unless the thread
    /// failed to finish within the join timeout.
    pub(crate) fn close(&mut self) -> Result<(), DriverError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let _ = self.commands.send(Command::Close);

        match self.finished.recv_timeout(JOIN_TIMEOUT) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Ok(())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Stream thread did not finish within {} ms, detaching",
                    JOIN_TIMEOUT.as_millis()
                );
                Err(DriverError::new(
                    DriverErrorKind::OperationAborted,
                    "stream thread join timed out",
                ))
            }
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Closing stream thread on drop: {}", e);
        }
    }
}

fn run(stream: &cpal::Stream, commands: Receiver<Command>) {
    for command in commands {
        match command {
            Command::Play(reply) => {
                let _ = reply.send(stream.play().map_err(play_error));
            }
            Command::Pause(reply) => {
                let _ = reply.send(stream.pause().map_err(pause_error));
            }
            Command::Close => break,
        }
    }
}

/// Build an input stream that always hands `i16` interleaved samples to `on_data`.
///
/// Devices without native 16-bit input are opened as `f32` and converted.
pub(crate) fn build_i16_input_stream<D, E>(
    device: &Device,
    config: &StreamConfig,
    format: SampleFormat,
    mut on_data: D,
    on_error: E,
) -> Result<cpal::Stream, DriverError>
where
    D: FnMut(&[i16]) + Send + 'static,
    E: FnMut(cpal::StreamError) + Send + 'static,
{
    let stream = match format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| on_data(data),
            on_error,
            None,
        ),
        SampleFormat::F32 => {
            let mut staging: Vec<i16> = Vec::new();
            device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    pcm::convert_f32_into(&mut staging, data);
                    on_data(&staging);
                },
                on_error,
                None,
            )
        }
        other => {
            return Err(DriverError::new(
                DriverErrorKind::ContentUnsupported,
                format!("unsupported device sample format: {:?}", other),
            ));
        }
    }
    .map_err(build_error)?;

    // Some hosts start streams as soon as they are built.
    if let Err(e) = stream.pause() {
        log::debug!("Initial pause not supported: {}", e);
    }
    Ok(stream)
}
