pub mod blocking_read;
pub mod buffer_queue;
pub mod recorder;
pub mod sample_sink;
pub mod stream;
