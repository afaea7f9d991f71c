//! Native media engine collaborator
//!
//! The view never decodes anything itself. It drives a [`MediaEngine`]
//! through a small capability interface and consumes the events the engine
//! posts back:
//!
//! - `pipeline`: GStreamer initialization and `playbin` configuration
//! - `player`: [`EnginePlayer`] implementation on top of a `playbin`
//! - `watcher`: bus/position watcher thread that turns GStreamer activity
//!   into [`PlayerEvent`]s
//!
//! # Threading
//!
//! Engines post events from their own threads through an [`EventSink`].
//! The sink feeds an unbounded channel drained by the single UI loop, so
//! every state transition happens on one logical thread.

use anyhow::Result;
use common::{LayoutInput, LayoutResult, MediaRequest};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;

#[cfg(feature = "video")]
mod pipeline;
#[cfg(feature = "video")]
mod player;
#[cfg(feature = "video")]
mod watcher;

#[cfg(feature = "video")]
pub use player::GstEngine;

#[cfg(not(feature = "video"))]
pub use engine_stub::GstEngine;

/// Identifies one player instance created by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u64);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Video geometry reported by the engine when its output format changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoLayout {
    pub width: u32,
    pub height: u32,
    pub visible_width: u32,
    pub visible_height: u32,
    pub sar_num: u32,
    pub sar_den: u32,
}

impl VideoLayout {
    /// Combine with the host window size into fitter input
    pub fn with_window(self, window_width: u32, window_height: u32) -> LayoutInput {
        LayoutInput {
            width: self.width,
            height: self.height,
            visible_width: self.visible_width,
            visible_height: self.visible_height,
            sar_num: self.sar_num,
            sar_den: self.sar_den,
            window_width,
            window_height,
        }
    }
}

/// Events a player reports asynchronously
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playback position moved (milliseconds)
    TimeChanged(i64),
    /// Engine is filling its buffers (percent)
    Buffering(f32),
    EndReached,
    EncounteredError(String),
    /// Output video format known or changed
    NewLayout(VideoLayout),
}

/// A [`PlayerEvent`] tagged with the player that emitted it
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub player_id: PlayerId,
    pub event: PlayerEvent,
}

/// Sending half handed to a player for posting its events
#[derive(Debug, Clone)]
pub struct EventSink {
    player_id: PlayerId,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub fn new(player_id: PlayerId, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { player_id, tx }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Post an event; returns false once the UI loop is gone
    pub fn send(&self, event: PlayerEvent) -> bool {
        self.tx
            .send(EngineEvent {
                player_id: self.player_id,
                event,
            })
            .is_ok()
    }
}

/// Factory for player instances, shared by every view of the process
pub trait MediaEngine: Send + Sync {
    /// Create a player for `request`, applying its per-media options.
    ///
    /// The player must post all of its events through `events`.
    fn create_player(&self, request: &MediaRequest, events: EventSink)
    -> Result<Box<dyn EnginePlayer>>;
}

/// Control surface of one engine player instance
pub trait EnginePlayer {
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    /// Seek to an absolute time in milliseconds
    fn set_time(&mut self, ms: i64);
    /// Current position in milliseconds
    fn time(&self) -> i64;
    /// Media length in milliseconds, 0 when unknown
    fn length(&self) -> i64;
    fn is_seekable(&self) -> bool;
    fn is_playing(&self) -> bool;
    fn is_released(&self) -> bool;
    /// Tear down the native instance; no call may follow except queries
    fn release(&mut self);

    /// Attach the video and subtitle surfaces
    fn attach_views(&mut self);
    fn views_attached(&self) -> bool;
    fn detach_views(&mut self);
    fn set_video_track_enabled(&mut self, enabled: bool);
    /// Tell the engine the pixel size of the host window
    fn set_window_size(&mut self, width: u32, height: u32);
    /// Apply fitted surface/container sizes
    fn apply_layout(&mut self, layout: &LayoutResult);
}

static SHARED_ENGINE: OnceLock<Arc<dyn MediaEngine>> = OnceLock::new();

/// Process-wide engine handle.
///
/// The first successful call constructs the engine with `init`; every later
/// call returns the same instance without running `init`. The engine lives
/// until the process exits.
pub fn shared<F>(init: F) -> Result<Arc<dyn MediaEngine>>
where
    F: FnOnce() -> Result<Arc<dyn MediaEngine>>,
{
    if let Some(engine) = SHARED_ENGINE.get() {
        return Ok(Arc::clone(engine));
    }

    let engine = init()?;
    // a concurrent initializer may have won; keep whichever landed first
    Ok(Arc::clone(SHARED_ENGINE.get_or_init(|| engine)))
}

#[cfg(not(feature = "video"))]
mod engine_stub {
    use super::{EnginePlayer, EventSink, MediaEngine};
    use anyhow::Result;
    use common::MediaRequest;

    /// Stub engine when video feature is disabled
    pub struct GstEngine;

    impl GstEngine {
        pub fn new(args: &[String]) -> Result<Self> {
            log::warn!(
                "Video support not compiled in, ignoring {} engine option(s)",
                args.len()
            );
            Ok(Self)
        }
    }

    impl MediaEngine for GstEngine {
        fn create_player(
            &self,
            _request: &MediaRequest,
            _events: EventSink,
        ) -> Result<Box<dyn EnginePlayer>> {
            anyhow::bail!("Video support not compiled in")
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory engine for exercising the view.

    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Mutex;

    /// Calls recorded by fake players, in order
    pub type CallLog = Arc<Mutex<Vec<String>>>;

    #[derive(Debug, Default)]
    pub struct FakePlayerState {
        pub playing: bool,
        pub released: bool,
        pub attached: bool,
        pub time: i64,
        pub length: i64,
        pub seekable: bool,
    }

    pub struct FakeEngine {
        pub calls: CallLog,
        /// State of the most recently created player
        pub last: Mutex<Option<Arc<Mutex<FakePlayerState>>>>,
        pub length: i64,
        pub fail: bool,
    }

    impl FakeEngine {
        pub fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                last: Mutex::new(None),
                length: 120_000,
                fail: false,
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        pub fn player_state(&self) -> Arc<Mutex<FakePlayerState>> {
            Arc::clone(self.last.lock().unwrap().as_ref().unwrap())
        }
    }

    impl MediaEngine for FakeEngine {
        fn create_player(
            &self,
            request: &MediaRequest,
            events: EventSink,
        ) -> Result<Box<dyn EnginePlayer>> {
            if self.fail {
                anyhow::bail!("engine refused {}", request.locator);
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("create {} {:?}", request.locator, request.options));
            let state = Arc::new(Mutex::new(FakePlayerState {
                length: self.length,
                seekable: true,
                ..Default::default()
            }));
            *self.last.lock().unwrap() = Some(Arc::clone(&state));
            Ok(Box::new(FakePlayer {
                id: events.player_id(),
                calls: Arc::clone(&self.calls),
                state,
            }))
        }
    }

    pub struct FakePlayer {
        id: PlayerId,
        calls: CallLog,
        state: Arc<Mutex<FakePlayerState>>,
    }

    impl FakePlayer {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl EnginePlayer for FakePlayer {
        fn play(&mut self) {
            self.record("play".to_string());
            self.state.lock().unwrap().playing = true;
        }
        fn pause(&mut self) {
            self.record("pause".to_string());
            self.state.lock().unwrap().playing = false;
        }
        fn stop(&mut self) {
            self.record("stop".to_string());
            self.state.lock().unwrap().playing = false;
        }
        fn set_time(&mut self, ms: i64) {
            self.record(format!("set_time {}", ms));
            self.state.lock().unwrap().time = ms;
        }
        fn time(&self) -> i64 {
            self.state.lock().unwrap().time
        }
        fn length(&self) -> i64 {
            self.state.lock().unwrap().length
        }
        fn is_seekable(&self) -> bool {
            self.state.lock().unwrap().seekable
        }
        fn is_playing(&self) -> bool {
            self.state.lock().unwrap().playing
        }
        fn is_released(&self) -> bool {
            self.state.lock().unwrap().released
        }
        fn release(&mut self) {
            self.record(format!("release {}", self.id));
            self.state.lock().unwrap().released = true;
        }
        fn attach_views(&mut self) {
            self.record("attach_views".to_string());
            self.state.lock().unwrap().attached = true;
        }
        fn views_attached(&self) -> bool {
            self.state.lock().unwrap().attached
        }
        fn detach_views(&mut self) {
            self.record("detach_views".to_string());
            self.state.lock().unwrap().attached = false;
        }
        fn set_video_track_enabled(&mut self, enabled: bool) {
            self.record(format!("video_track {}", enabled));
        }
        fn set_window_size(&mut self, width: u32, height: u32) {
            self.record(format!("window {}x{}", width, height));
        }
        fn apply_layout(&mut self, layout: &LayoutResult) {
            self.record(format!(
                "layout {} {}",
                layout.surface, layout.container
            ));
        }
    }

    /// Listener output collected by tests
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Notifications {
        pub prepared: u32,
        pub completed: u32,
        pub errors: Vec<String>,
        pub loading: Vec<bool>,
    }

    pub type SharedNotifications = Rc<RefCell<Notifications>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_sink_tags_player() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(PlayerId(7), tx);

        assert!(sink.send(PlayerEvent::EndReached));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.player_id, PlayerId(7));
        assert_eq!(event.event, PlayerEvent::EndReached);

        drop(rx);
        assert!(!sink.send(PlayerEvent::TimeChanged(1)));
    }

    #[test]
    fn test_video_layout_with_window() {
        let layout = VideoLayout {
            width: 1920,
            height: 1088,
            visible_width: 1920,
            visible_height: 1080,
            sar_num: 1,
            sar_den: 1,
        };
        let input = layout.with_window(1280, 720);
        assert_eq!(input.height, 1088);
        assert_eq!(input.visible_height, 1080);
        assert_eq!(input.window_width, 1280);
        assert_eq!(input.window_height, 720);
    }

    #[test]
    fn test_shared_engine_initializes_once() {
        let first = shared(|| Ok(Arc::new(testing::FakeEngine::new()) as Arc<dyn MediaEngine>))
            .unwrap();
        let second = shared(|| anyhow::bail!("must not run twice")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
