pub mod aaudio;
pub mod audio_record;
pub mod oboe;
pub mod opensl;
pub(crate) mod shared;
pub(crate) mod stream_capture;

pub use aaudio::AAudioRecorder;
pub use audio_record::AudioRecordRecorder;
pub use oboe::OboeRecorder;
pub use opensl::OpenSlRecorder;
