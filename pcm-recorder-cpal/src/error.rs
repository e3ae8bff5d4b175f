//! Mapping from cpal's error types onto driver error kinds.

use cpal::{
    BuildStreamError, DevicesError, PauseStreamError, PlayStreamError, StreamError,
    SupportedStreamConfigsError,
};

use pcm_recorder_core::models::error::{DriverError, DriverErrorKind};

pub(crate) fn build_error(e: BuildStreamError) -> DriverError {
    let kind = match &e {
        BuildStreamError::DeviceNotAvailable => DriverErrorKind::ResourceError,
        BuildStreamError::StreamConfigNotSupported => DriverErrorKind::ContentUnsupported,
        BuildStreamError::InvalidArgument => DriverErrorKind::ParameterInvalid,
        _ => DriverErrorKind::InternalError,
    };
    DriverError::new(kind, e.to_string())
}

pub(crate) fn play_error(e: PlayStreamError) -> DriverError {
    let kind = match &e {
        PlayStreamError::DeviceNotAvailable => DriverErrorKind::ResourceLost,
        _ => DriverErrorKind::InternalError,
    };
    DriverError::new(kind, e.to_string())
}

pub(crate) fn pause_error(e: PauseStreamError) -> DriverError {
    let kind = match &e {
        PauseStreamError::DeviceNotAvailable => DriverErrorKind::ResourceLost,
        _ => DriverErrorKind::InternalError,
    };
    DriverError::new(kind, e.to_string())
}

pub(crate) fn stream_error(e: StreamError) -> DriverError {
    let kind = match &e {
        StreamError::DeviceNotAvailable => DriverErrorKind::ResourceLost,
        _ => DriverErrorKind::UnknownError,
    };
    DriverError::new(kind, e.to_string())
}

pub(crate) fn devices_error(e: DevicesError) -> DriverError {
    DriverError::new(DriverErrorKind::IoError, e.to_string())
}

pub(crate) fn configs_error(e: SupportedStreamConfigsError) -> DriverError {
    let kind = match &e {
        SupportedStreamConfigsError::DeviceNotAvailable => DriverErrorKind::ResourceError,
        SupportedStreamConfigsError::InvalidArgument => DriverErrorKind::ParameterInvalid,
        _ => DriverErrorKind::InternalError,
    };
    DriverError::new(kind, e.to_string())
}

pub(crate) fn thread_gone() -> DriverError {
    DriverError::new(
        DriverErrorKind::ControlLost,
        "stream thread exited unexpectedly",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_config_maps_to_content_unsupported() {
        let err = build_error(BuildStreamError::StreamConfigNotSupported);
        assert_eq!(err.kind, DriverErrorKind::ContentUnsupported);
    }

    #[test]
    fn lost_device_while_playing_is_resource_lost() {
        assert_eq!(
            play_error(PlayStreamError::DeviceNotAvailable).kind,
            DriverErrorKind::ResourceLost
        );
        assert_eq!(
            stream_error(StreamError::DeviceNotAvailable).kind,
            DriverErrorKind::ResourceLost
        );
    }
}
