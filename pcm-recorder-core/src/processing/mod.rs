pub mod capture_buffer;
pub mod pcm;
