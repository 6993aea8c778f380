use std::fmt;

use bitflags::bitflags;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Connection state of a context or backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Not connected
    #[default]
    Idle,
    /// Connection in progress
    Connecting,
    /// Connected, the object graph is readable
    Ready,
    /// Connection failed
    Failed,
    /// State could not be determined
    Unknown,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "idle"),
            State::Connecting => write!(f, "connecting"),
            State::Ready => write!(f, "ready"),
            State::Failed => write!(f, "failed"),
            State::Unknown => write!(f, "unknown"),
        }
    }
}

/// Signal direction of a stream or stored control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Direction is not known
    #[default]
    Unknown,
    /// Capture path (microphone, line-in)
    Input,
    /// Playback path (speakers, headphones)
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Unknown => write!(f, "unknown"),
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// Sound subsystem implemented by a backend
///
/// `Unknown` means "not pinned": the context auto-detects the backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// No specific backend, auto-detect
    #[default]
    Unknown,
    /// Network sound server
    #[serde(rename = "pulseaudio")]
    PulseAudio,
    /// Kernel mixer interface
    Alsa,
    /// Legacy device-file interface
    Oss,
    /// Fallback backend without any devices
    Null,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Unknown => write!(f, "unknown"),
            BackendType::PulseAudio => write!(f, "pulseaudio"),
            BackendType::Alsa => write!(f, "alsa"),
            BackendType::Oss => write!(f, "oss"),
            BackendType::Null => write!(f, "null"),
        }
    }
}

bitflags! {
    /// Static capabilities advertised by a backend module
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BackendFlags: u32 {
        /// Streams may carry per-application controls
        const HAS_APPLICATION_CONTROLS = 1 << 0;
        /// The backend exposes stored controls
        const HAS_STORED_CONTROLS = 1 << 1;
        /// The default input stream can be changed
        const CAN_SET_DEFAULT_INPUT_STREAM = 1 << 2;
        /// The default output stream can be changed
        const CAN_SET_DEFAULT_OUTPUT_STREAM = 1 << 3;
    }
}

bitflags! {
    /// Capabilities of a single stream control
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlFlags: u32 {
        /// Mute state can be read
        const MUTE_READABLE = 1 << 0;
        /// Mute state can be changed
        const MUTE_WRITABLE = 1 << 1;
        /// Volume can be read
        const VOLUME_READABLE = 1 << 2;
        /// Volume can be changed
        const VOLUME_WRITABLE = 1 << 3;
        /// Left/right balance is supported
        const CAN_BALANCE = 1 << 4;
        /// Front/back fade is supported
        const CAN_FADE = 1 << 5;
        /// The control can be moved to another stream
        const MOVABLE = 1 << 6;
        /// Volume can be expressed in decibels
        const HAS_DECIBEL = 1 << 7;
        /// Peak level monitoring is available
        const HAS_MONITOR = 1 << 8;
        /// The control is persisted by the backend
        const STORED = 1 << 9;
    }
}

bitflags! {
    /// Behaviour flags of a stream switch
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StreamSwitchFlags: u32 {
        /// The switch has exactly two options, "on" and "off"
        const TOGGLE = 1 << 0;
    }
}

/// What a control adjusts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum ControlRole {
    #[default]
    Unknown,
    Master,
    Application,
    Pcm,
    Speaker,
    Microphone,
    Port,
    Boost,
    Bass,
    Treble,
    Cd,
    Video,
    Music,
}

/// Media role of an application control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum MediaRole {
    #[default]
    Unknown,
    Video,
    Music,
    Game,
    Event,
    Phone,
    Animation,
    Production,
    A11y,
    Test,
    Abstract,
    Filter,
}

/// Role of a device switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceSwitchRole {
    /// Role is not known
    #[default]
    Unknown,
    /// Selects the device profile
    Profile,
}

/// Role of a stream switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamSwitchRole {
    /// Role is not known
    #[default]
    Unknown,
    /// Selects the active port (jack)
    Port,
    /// Enables signal boost
    Boost,
}

/// Speaker position of a volume channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ChannelPosition {
    Unknown,
    Mono,
    FrontLeft,
    FrontRight,
    FrontCenter,
    Lfe,
    BackLeft,
    BackRight,
    BackCenter,
    FrontLeftCenter,
    FrontRightCenter,
    SideLeft,
    SideRight,
    TopFrontLeft,
    TopFrontRight,
    TopFrontCenter,
    TopCenter,
    TopBackLeft,
    TopBackRight,
    TopBackCenter,
}

impl ChannelPosition {
    /// Whether the channel belongs to the left side
    pub fn is_left(self) -> bool {
        matches!(
            self,
            Self::FrontLeft
                | Self::BackLeft
                | Self::FrontLeftCenter
                | Self::SideLeft
                | Self::TopFrontLeft
                | Self::TopBackLeft
        )
    }

    /// Whether the channel belongs to the right side
    pub fn is_right(self) -> bool {
        matches!(
            self,
            Self::FrontRight
                | Self::BackRight
                | Self::FrontRightCenter
                | Self::SideRight
                | Self::TopFrontRight
                | Self::TopBackRight
        )
    }

    /// Whether the channel is in front of the listener
    pub fn is_front(self) -> bool {
        matches!(
            self,
            Self::FrontLeft
                | Self::FrontRight
                | Self::FrontCenter
                | Self::FrontLeftCenter
                | Self::FrontRightCenter
                | Self::TopFrontLeft
                | Self::TopFrontRight
                | Self::TopFrontCenter
        )
    }

    /// Whether the channel is behind the listener
    pub fn is_back(self) -> bool {
        matches!(
            self,
            Self::BackLeft
                | Self::BackRight
                | Self::BackCenter
                | Self::TopBackLeft
                | Self::TopBackRight
                | Self::TopBackCenter
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn backend_type_uses_lowercase_names() {
        let parsed: BackendType = serde_json::from_str("\"pulseaudio\"").unwrap();
        assert_eq!(parsed, BackendType::PulseAudio);
        assert_eq!(BackendType::Alsa.to_string(), "alsa");
    }

    #[test]
    fn channel_sides_do_not_overlap() {
        assert!(ChannelPosition::SideLeft.is_left());
        assert!(!ChannelPosition::SideLeft.is_right());
        assert!(!ChannelPosition::Mono.is_left());
        assert!(ChannelPosition::TopBackCenter.is_back());
        assert!(!ChannelPosition::TopBackCenter.is_front());
    }
}
