use serde::{Deserialize, Serialize};

/// Recorder lifecycle state.
///
/// State transitions:
/// ```text
/// uninitialized → initialized → recording
///       ↑              ↑            │
///       │              └── stop ────┤  (buffer-queue, kept-open stream)
///       └──── init ── stopped ←─────┘  (closing stream)
///
/// any → released (terminal)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    #[default]
    Uninitialized,
    Initialized,
    Recording,
    Stopped,
    Released,
}

impl RecorderState {
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized)
    }

    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released)
    }

    /// Whether `init_recording` may open a new backend session from this state.
    pub fn can_init(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Recording => "recording",
            Self::Stopped => "stopped",
            Self::Released => "released",
        }
    }
}
