//! Common types and utilities for vidview.
//!
//! This crate defines the data model shared by the view daemon (`vidviewd`)
//! and the control client (`vvctl`), plus the IPC protocol spoken between
//! them.
//!
//! # IPC Protocol
//!
//! Communication happens over a Unix domain socket using JSON-serialized
//! messages, one per line. The client sends [`Command`] variants and receives
//! [`Response`] variants.
//!
//! # Examples
//!
//! ```no_run
//! use common::{Command, MediaRequest};
//!
//! // Load a network stream with a per-media option
//! let request = MediaRequest::with_options(
//!     "rtsp://192.168.1.20/stream1",
//!     vec![":network-caching=300".to_string()],
//! );
//! let cmd = Command::Load {
//!     locator: request.locator,
//!     options: request.options,
//! };
//!
//! // Serialize for sending over IPC
//! let json = serde_json::to_string(&cmd).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types shared between client and daemon.
///
/// All errors are serializable for transmission over IPC.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViewError {
    /// No host window could be resolved for the view
    #[error("Couldn't resolve a host window for the view")]
    NoHostWindow,

    /// The host window has not been measured yet
    #[error("Host window not measured: {width}x{height}")]
    WindowNotMeasured { width: u32, height: u32 },

    /// Video metadata with a zero visible dimension
    #[error("Degenerate video metadata: visible size {visible_width}x{visible_height}")]
    DegenerateVideo {
        visible_width: u32,
        visible_height: u32,
    },

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for ViewError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(e: serde_json::Error) -> Self {
        Self::Ipc(e.to_string())
    }
}

/// Coarse lifecycle of the media item loaded in a view.
///
/// The variant order is meaningful: every state below [`PlaybackState::Playing`]
/// means the media has not reported its first playback position yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No player instance
    #[default]
    Idle,
    /// Player created, waiting for the first position update
    Loading,
    /// Like `Loading`, but the caller already asked to play
    PlayPendingOnLoad,
    Playing,
    Buffering,
    /// A seek was issued and its echo has not arrived yet
    Seeking,
}

impl PlaybackState {
    /// True until the first position update after a load
    pub fn is_preparing(self) -> bool {
        matches!(self, Self::Loading | Self::PlayPendingOnLoad)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::PlayPendingOnLoad => "play-pending-on-load",
            Self::Playing => "playing",
            Self::Buffering => "buffering",
            Self::Seeking => "seeking",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media item to load: an engine locator plus per-media engine options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    /// URI or engine-specific MRL
    pub locator: String,
    /// Colon-prefixed engine options, applied in order
    pub options: Vec<String>,
}

impl MediaRequest {
    /// Request with no per-media options
    pub fn mrl(locator: impl Into<String>) -> Self {
        Self::with_options(locator, Vec::new())
    }

    pub fn with_options(locator: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            locator: locator.into(),
            options,
        }
    }

    /// Whether the locator carries a `scheme://` prefix
    pub fn is_uri(&self) -> bool {
        match self.locator.split_once("://") {
            Some((scheme, _)) => {
                !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            }
            None => false,
        }
    }
}

/// Input of the surface fitter.
///
/// A zero `width` or `height` means the engine sizes the surface itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInput {
    /// Decoded video width, including codec padding
    pub width: u32,
    /// Decoded video height, including codec padding
    pub height: u32,
    pub visible_width: u32,
    pub visible_height: u32,
    /// Sample (pixel) aspect ratio numerator
    pub sar_num: u32,
    /// Sample (pixel) aspect ratio denominator
    pub sar_den: u32,
    pub window_width: u32,
    pub window_height: u32,
}

/// Pixel size of a rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Output of the surface fitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutResult {
    /// Size of the video surface, including any non-visible padding
    pub surface: Size,
    /// Size of the cropping container around the surface
    pub container: Size,
    /// Set when the engine manages sizing and both boxes fill the window
    pub engine_managed: bool,
}

/// Key press forwarded to a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key name, e.g. "space", "left", "right", "q"
    pub code: String,
    pub pressed: bool,
}

impl KeyEvent {
    pub fn press(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            pressed: true,
        }
    }
}

/// Commands sent from client to daemon via IPC.
///
/// # Examples
///
/// ```
/// use common::Command;
///
/// // Jump to the one minute mark
/// let cmd = Command::SeekTo { ms: 60_000 };
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub enum Command {
    /// Load a media item, releasing whatever was loaded before.
    ///
    /// Playback starts suppressed; send [`Command::Play`] right after
    /// to start as soon as the media is prepared.
    Load {
        /// URI or engine MRL
        locator: String,
        /// Per-media engine options (e.g. ":network-caching=300")
        options: Vec<String>,
    },
    Play,
    Pause,
    Stop,
    /// Jump to an absolute time in milliseconds
    SeekTo { ms: i64 },
    /// Skip relative to the current position; may be negative
    Skip { delta_ms: i64 },
    /// Stop and tear down the player
    Release,
    /// Dispatch a key press to the view
    Key { code: String },
    /// Get current view status
    Status,
    /// Ping daemon to check if alive
    Ping,
    /// Shut down the daemon
    Kill,
}

/// Response from daemon to client
#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Error(ViewError),
    Status(ViewStatus),
    /// Whether a dispatched key was consumed
    KeyHandled(bool),
    Pong,
}

/// Snapshot of a view's state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewStatus {
    pub version: String,
    pub state: PlaybackState,
    pub locator: Option<String>,
    pub position_ms: i64,
    pub duration_ms: i64,
    pub is_playing: bool,
    pub can_seek: bool,
    /// Last loading-state notification
    pub loading: bool,
    pub prepared: bool,
    pub completed: bool,
    pub layout: Option<LayoutResult>,
    pub last_error: Option<String>,
}

/// IPC socket path helper
pub fn get_socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));

    std::path::PathBuf::from(runtime_dir).join("vidview.sock")
}
