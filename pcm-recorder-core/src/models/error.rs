use std::fmt;

use thiserror::Error;

/// Errors returned by recorder lifecycle operations.
///
/// Each variant maps to one host-facing [`ResultCode`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    /// The backend engine or session object could not be constructed.
    #[error("create failed: {0}")]
    Create(String),

    /// Stream or format negotiation failed.
    #[error("init failed: {0}")]
    Init(String),

    /// The operation is not valid in the current lifecycle state.
    #[error("invalid state: {0}")]
    State(String),

    /// The backend rejected the start request or the pre-arm enqueue failed.
    #[error("start recording failed: {0}")]
    StartRecording(String),

    /// The backend rejected the stop request or the queue clear failed.
    #[error("stop failed: {0}")]
    Stop(String),

    /// The sample sink could not be opened, written or closed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RecorderError {
    pub fn code(&self) -> ResultCode {
        match self {
            Self::Create(_) => ResultCode::CreateError,
            Self::Init(_) => ResultCode::InitError,
            Self::State(_) => ResultCode::StateError,
            Self::StartRecording(_) => ResultCode::StartRecordingError,
            Self::Stop(_) => ResultCode::StopError,
            Self::Storage(_) => ResultCode::StorageError,
        }
    }
}

/// Integer result codes returned across the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    /// No session has been selected.
    NoSession = -1,
    NoError = 0,
    CreateError = 1,
    InitError = 2,
    StartRecordingError = 3,
    StopError = 4,
    StateError = 5,
    StorageError = 6,
}

impl ResultCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Self::NoError
    }
}

impl From<Result<(), RecorderError>> for ResultCode {
    fn from(result: Result<(), RecorderError>) -> Self {
        match result {
            Ok(()) => Self::NoError,
            Err(e) => e.code(),
        }
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        code.as_i32()
    }
}

/// Failure categories reported by audio drivers.
///
/// The discriminants follow the numeric result codes used by buffer-queue
/// audio engines so native codes can be mapped with [`DriverErrorKind::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverErrorKind {
    PreconditionsViolated = 1,
    ParameterInvalid = 2,
    MemoryFailure = 3,
    ResourceError = 4,
    ResourceLost = 5,
    IoError = 6,
    BufferInsufficient = 7,
    ContentCorrupted = 8,
    ContentUnsupported = 9,
    ContentNotFound = 10,
    PermissionDenied = 11,
    FeatureUnsupported = 12,
    InternalError = 13,
    UnknownError = 14,
    OperationAborted = 15,
    ControlLost = 16,
}

impl DriverErrorKind {
    /// Map a native numeric result code. Out-of-range codes become `UnknownError`.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::PreconditionsViolated,
            2 => Self::ParameterInvalid,
            3 => Self::MemoryFailure,
            4 => Self::ResourceError,
            5 => Self::ResourceLost,
            6 => Self::IoError,
            7 => Self::BufferInsufficient,
            8 => Self::ContentCorrupted,
            9 => Self::ContentUnsupported,
            10 => Self::ContentNotFound,
            11 => Self::PermissionDenied,
            12 => Self::FeatureUnsupported,
            13 => Self::InternalError,
            15 => Self::OperationAborted,
            16 => Self::ControlLost,
            _ => Self::UnknownError,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreconditionsViolated => "preconditions violated",
            Self::ParameterInvalid => "parameter invalid",
            Self::MemoryFailure => "memory failure",
            Self::ResourceError => "resource error",
            Self::ResourceLost => "resource lost",
            Self::IoError => "io error",
            Self::BufferInsufficient => "buffer insufficient",
            Self::ContentCorrupted => "content corrupted",
            Self::ContentUnsupported => "content unsupported",
            Self::ContentNotFound => "content not found",
            Self::PermissionDenied => "permission denied",
            Self::FeatureUnsupported => "feature unsupported",
            Self::InternalError => "internal error",
            Self::UnknownError => "unknown error",
            Self::OperationAborted => "operation aborted",
            Self::ControlLost => "control lost",
        }
    }
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by a backend driver, with its native diagnostic text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_are_stable() {
        assert_eq!(ResultCode::NoSession.as_i32(), -1);
        assert_eq!(ResultCode::NoError.as_i32(), 0);
        assert_eq!(ResultCode::CreateError.as_i32(), 1);
        assert_eq!(ResultCode::InitError.as_i32(), 2);
        assert_eq!(ResultCode::StartRecordingError.as_i32(), 3);
        assert_eq!(ResultCode::StopError.as_i32(), 4);
        assert_eq!(ResultCode::StateError.as_i32(), 5);
        assert_eq!(ResultCode::StorageError.as_i32(), 6);
    }

    #[test]
    fn result_converts_to_code() {
        assert_eq!(ResultCode::from(Ok(())), ResultCode::NoError);
        assert_eq!(
            ResultCode::from(Err(RecorderError::State("not initialized".into()))),
            ResultCode::StateError
        );
    }

    #[test]
    fn unknown_native_codes_map_to_unknown() {
        assert_eq!(DriverErrorKind::from_code(4), DriverErrorKind::ResourceError);
        assert_eq!(DriverErrorKind::from_code(0), DriverErrorKind::UnknownError);
        assert_eq!(DriverErrorKind::from_code(99), DriverErrorKind::UnknownError);
    }

    #[test]
    fn driver_error_display_includes_native_text() {
        let err = DriverError::new(DriverErrorKind::ContentUnsupported, "format rejected");
        assert_eq!(err.to_string(), "content unsupported: format rejected");
    }
}
