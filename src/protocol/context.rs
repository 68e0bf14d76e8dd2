//! Frame contexts and host client types reported by the handshake.

// ============================================================================
// Imports
// ============================================================================

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// FrameContext
// ============================================================================

/// The embedding surface the app is running in.
///
/// Unknown values are kept verbatim in [`FrameContext::Other`] so newer
/// hosts never break the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameContext {
    /// Configuration page shown while adding the app.
    Settings,
    /// Main content surface.
    Content,
    /// Authentication popup.
    Authentication,
    /// Removal confirmation page.
    Remove,
    /// Task module (dialog).
    Task,
    /// Meeting side panel.
    SidePanel,
    /// Full-screen stage.
    Stage,
    /// Shared meeting stage.
    MeetingStage,
    /// A context this crate does not know about.
    Other(String),
}

impl FrameContext {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Settings => "settings",
            Self::Content => "content",
            Self::Authentication => "authentication",
            Self::Remove => "remove",
            Self::Task => "task",
            Self::SidePanel => "sidePanel",
            Self::Stage => "stage",
            Self::MeetingStage => "meetingStage",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for FrameContext {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "settings" => Self::Settings,
            "content" => Self::Content,
            "authentication" => Self::Authentication,
            "remove" => Self::Remove,
            "task" => Self::Task,
            "sidePanel" => Self::SidePanel,
            "stage" => Self::Stage,
            "meetingStage" => Self::MeetingStage,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for FrameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// HostClientType
// ============================================================================

/// The kind of host client embedding the app.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostClientType {
    /// Browser client.
    Web,
    /// Desktop shell.
    Desktop,
    /// Android app.
    Android,
    /// iOS app.
    Ios,
    /// iPadOS app.
    Ipados,
    /// macOS app.
    Macos,
    /// Rigel meeting device.
    Rigel,
    /// Surface Hub.
    SurfaceHub,
    /// Rooms on Windows.
    TeamsRoomsWindows,
    /// Rooms on Android.
    TeamsRoomsAndroid,
    /// Desk phones.
    TeamsPhones,
    /// Smart displays.
    TeamsDisplays,
    /// A client type this crate does not know about.
    Other(String),
}

impl HostClientType {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Web => "web",
            Self::Desktop => "desktop",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Ipados => "ipados",
            Self::Macos => "macos",
            Self::Rigel => "rigel",
            Self::SurfaceHub => "surfaceHub",
            Self::TeamsRoomsWindows => "teamsRoomsWindows",
            Self::TeamsRoomsAndroid => "teamsRoomsAndroid",
            Self::TeamsPhones => "teamsPhones",
            Self::TeamsDisplays => "teamsDisplays",
            Self::Other(name) => name,
        }
    }

    /// Returns `true` if the host opens authentication windows itself.
    ///
    /// On these clients `authenticate` delegates to the host instead of
    /// opening a popup.
    #[must_use]
    pub fn manages_popups_natively(&self) -> bool {
        !matches!(self, Self::Web | Self::Other(_))
    }
}

impl FromStr for HostClientType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "web" => Self::Web,
            "desktop" => Self::Desktop,
            "android" => Self::Android,
            "ios" => Self::Ios,
            "ipados" => Self::Ipados,
            "macos" => Self::Macos,
            "rigel" => Self::Rigel,
            "surfaceHub" => Self::SurfaceHub,
            "teamsRoomsWindows" => Self::TeamsRoomsWindows,
            "teamsRoomsAndroid" => Self::TeamsRoomsAndroid,
            "teamsPhones" => Self::TeamsPhones,
            "teamsDisplays" => Self::TeamsDisplays,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for HostClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
