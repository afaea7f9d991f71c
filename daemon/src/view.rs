//! The video view: one engine player, its playback state machine and the
//! sizing of its surface inside the host window.
//!
//! # Lifecycle
//!
//! ```text
//!  Idle --load--> Loading --play--> PlayPendingOnLoad
//!                   |                     |
//!                   +--first TimeChanged--+--> Playing <--debounced-- Buffering
//!                                              |  ^                    ^  |
//!                                    Buffering |  +----TimeChanged-----+  |
//!                                              v                          |
//!                                          Buffering      Seeking --TimeChanged
//! ```
//!
//! The engine has no explicit "prepared" event and may report playing
//! before the first frame is ready, so the first `TimeChanged` after a load
//! stands in for it. Leaving `Buffering` only clears the loading flag after
//! [`BUFFERING_DEBOUNCE`] of quiet, which hides flicker between short stalls.
//!
//! All methods must be called from the one thread that owns the view;
//! engines hand their events over through the channel given to
//! [`VideoView::new`].

use crate::debounce::DelayedTask;
use crate::engine::{
    EngineEvent, EnginePlayer, EventSink, MediaEngine, PlayerEvent, PlayerId, VideoLayout,
};
use crate::surface::{self, LayoutError};
use common::{KeyEvent, LayoutResult, MediaRequest, PlaybackState, Size, ViewError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Quiet period before a buffering stall is reported as finished
pub const BUFFERING_DEBOUNCE: Duration = Duration::from_millis(150);

/// Source of the host window's pixel size
pub trait HostWindow {
    /// `None` when the view is not attached to any window
    fn window_size(&self) -> Option<Size>;
}

/// A host window of fixed, known size
#[derive(Debug, Clone, Copy)]
pub struct FixedWindow {
    size: Option<Size>,
}

impl FixedWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Some(Size::new(width, height)),
        }
    }

    /// A view with no window to resolve
    #[cfg(test)]
    pub fn detached() -> Self {
        Self { size: None }
    }
}

impl HostWindow for FixedWindow {
    fn window_size(&self) -> Option<Size> {
        self.size
    }
}

pub type PreparedListener = Box<dyn FnMut()>;
pub type CompletionListener = Box<dyn FnMut()>;
pub type ErrorListener = Box<dyn FnMut(&str)>;
pub type LoadingStateListener = Box<dyn FnMut(bool)>;
/// Returns true when the key event is consumed
pub type KeyInterceptListener = Box<dyn FnMut(&KeyEvent) -> bool>;

pub struct VideoView {
    /// Process-wide engine, injected
    engine: Arc<dyn MediaEngine>,

    /// Handed to every player for posting events
    events_tx: mpsc::UnboundedSender<EngineEvent>,

    window: Box<dyn HostWindow>,

    /// The live player, at most one
    player: Option<Box<dyn EnginePlayer>>,

    player_id: Option<PlayerId>,

    next_player_id: u64,

    state: PlaybackState,

    request: Option<MediaRequest>,

    /// Pending "loading finished" notification
    not_loading: DelayedTask,

    /// Last applied surface layout
    layout: Option<LayoutResult>,

    focusable: bool,

    on_prepared: Option<PreparedListener>,
    on_completion: Option<CompletionListener>,
    on_error: Option<ErrorListener>,
    on_loading_state_changed: Option<LoadingStateListener>,
    on_key_intercept: Option<KeyInterceptListener>,
}

impl VideoView {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        window: Box<dyn HostWindow>,
        events_tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            engine,
            events_tx,
            window,
            player: None,
            player_id: None,
            next_player_id: 1,
            state: PlaybackState::Idle,
            request: None,
            not_loading: DelayedTask::new(BUFFERING_DEBOUNCE),
            layout: None,
            focusable: false,
            on_prepared: None,
            on_completion: None,
            on_error: None,
            on_loading_state_changed: None,
            on_key_intercept: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[cfg(test)]
    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    /// The media request currently loaded
    pub fn request(&self) -> Option<&MediaRequest> {
        self.request.as_ref()
    }

    pub fn layout(&self) -> Option<&LayoutResult> {
        self.layout.as_ref()
    }

    /// When the next delayed notification is due, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.not_loading.deadline()
    }

    pub fn is_focusable(&self) -> bool {
        self.focusable
    }

    pub fn can_seek(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.is_seekable())
    }

    /// Playback position in milliseconds
    pub fn current_position(&self) -> i64 {
        self.player.as_ref().map_or(0, |p| p.time())
    }

    /// Media length in milliseconds
    pub fn duration(&self) -> i64 {
        self.player.as_ref().map_or(0, |p| p.length())
    }

    pub fn is_playing(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.is_playing())
    }

    pub fn set_on_prepared(&mut self, listener: Option<PreparedListener>) {
        self.on_prepared = listener;
    }

    pub fn set_on_completion(&mut self, listener: Option<CompletionListener>) {
        self.on_completion = listener;
    }

    pub fn set_on_error(&mut self, listener: Option<ErrorListener>) {
        self.on_error = listener;
    }

    pub fn set_on_loading_state_changed(&mut self, listener: Option<LoadingStateListener>) {
        self.on_loading_state_changed = listener;
    }

    /// Key interception requires focus, so registering one makes the view
    /// focusable and clearing it gives focusability up again.
    pub fn set_on_key_intercept(&mut self, listener: Option<KeyInterceptListener>) {
        self.focusable = listener.is_some();
        self.on_key_intercept = listener;
    }

    /// Offer a key event to the interceptor; true when it was consumed
    pub fn dispatch_key_event(&mut self, event: &KeyEvent) -> bool {
        match self.on_key_intercept.as_mut() {
            Some(intercept) => intercept(event),
            None => false,
        }
    }

    /// Load a media item, tearing down the current player first.
    ///
    /// Playback starts suppressed: the view pauses on the first position
    /// update unless [`VideoView::play`] was called in between.
    pub fn load(&mut self, request: MediaRequest) -> Result<(), ViewError> {
        self.release();

        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;

        self.state = PlaybackState::Loading;
        let sink = EventSink::new(id, self.events_tx.clone());

        let mut player = match self.engine.create_player(&request, sink) {
            Ok(player) => player,
            Err(e) => {
                self.state = PlaybackState::Idle;
                return Err(ViewError::Engine(format!("{:#}", e)));
            }
        };

        if player.views_attached() {
            player.stop();
            player.detach_views();
        }
        player.attach_views();

        player.set_video_track_enabled(true);
        player.play();

        log::info!("Loading {} as {}", request.locator, id);
        self.player = Some(player);
        self.player_id = Some(id);
        self.request = Some(request);
        Ok(())
    }

    pub fn play(&mut self) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        player.play();

        if self.state == PlaybackState::Loading {
            self.state = PlaybackState::PlayPendingOnLoad;
        }
    }

    pub fn pause(&mut self) {
        if let Some(player) = self.player.as_mut()
            && player.is_playing()
        {
            player.pause();
        }
    }

    pub fn stop(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
    }

    /// Jump to a time in milliseconds
    pub fn seek_to(&mut self, ms: i64) {
        if self.player.is_none() {
            return;
        }

        if self.state != PlaybackState::Seeking {
            self.state = PlaybackState::Seeking;
            self.notify_loading(true);
        }

        if let Some(player) = self.player.as_mut() {
            player.set_time(ms);
        }
    }

    /// Skip some number of milliseconds; may be negative.
    ///
    /// The target is clamped to the start and, when known, the length of
    /// the media.
    pub fn skip(&mut self, delta_ms: i64) {
        let Some(player) = self.player.as_ref() else {
            return;
        };

        let length = player.length();
        let mut target = player.time().saturating_add(delta_ms).max(0);
        if length > 0 {
            target = target.min(length);
        }
        self.seek_to(target);
    }

    /// Stop and tear down the player; the view returns to `Idle`
    pub fn release(&mut self) {
        self.stop();

        if let Some(mut player) = self.player.take()
            && !player.is_released()
        {
            player.release();
        }

        if let Some(id) = self.player_id.take() {
            log::debug!("Released {}", id);
        }

        self.not_loading.cancel();
        self.state = PlaybackState::Idle;
        self.request = None;
        self.layout = None;
    }

    /// Feed one engine event into the state machine.
    ///
    /// Events from players other than the live one are dropped. Errors are
    /// only returned for layout problems, which are usage errors.
    pub fn handle_event(&mut self, event: EngineEvent, now: Instant) -> Result<(), ViewError> {
        if self.player_id != Some(event.player_id) {
            log::trace!("Dropping event from stale {}: {:?}", event.player_id, event.event);
            return Ok(());
        }

        match event.event {
            PlayerEvent::EndReached => match self.on_completion.as_mut() {
                Some(listener) => listener(),
                None => log::debug!("Playback completed"),
            },

            PlayerEvent::Buffering(_) => {
                if self.state == PlaybackState::Playing {
                    self.state = PlaybackState::Buffering;
                    self.notify_loading(true);
                }
            }

            PlayerEvent::EncounteredError(message) => match self.on_error.as_mut() {
                Some(listener) => listener(&message),
                None => log::warn!("Encountered error: {}", message),
            },

            PlayerEvent::TimeChanged(_) => self.on_time_changed(now),

            PlayerEvent::NewLayout(layout) => self.on_new_layout(layout)?,
        }

        Ok(())
    }

    /// Run delayed notifications that are due; true if one fired
    pub fn poll_timers(&mut self, now: Instant) -> bool {
        if !self.not_loading.poll(now) {
            return false;
        }

        self.state = PlaybackState::Playing;
        self.notify_loading(false);
        true
    }

    fn on_time_changed(&mut self, now: Instant) {
        if self.state == PlaybackState::Loading {
            // nobody asked to play yet
            self.pause();
        }

        match self.state {
            PlaybackState::Loading | PlaybackState::PlayPendingOnLoad => {
                self.state = PlaybackState::Playing;
                match self.on_prepared.as_mut() {
                    Some(listener) => listener(),
                    None => log::debug!("Prepared"),
                }
            }
            PlaybackState::Buffering => {
                self.state = PlaybackState::Playing;
                self.not_loading.schedule(now);
            }
            PlaybackState::Seeking => {
                // echo of the seek; buffering at the new position follows
                self.state = PlaybackState::Buffering;
            }
            PlaybackState::Idle | PlaybackState::Playing => {}
        }
    }

    fn on_new_layout(&mut self, video: VideoLayout) -> Result<(), ViewError> {
        let window = self.window.window_size().ok_or(ViewError::NoHostWindow)?;
        if window.is_empty() {
            return Err(LayoutError::WindowNotMeasured {
                width: window.width,
                height: window.height,
            }
            .into());
        }

        let Some(player) = self.player.as_mut() else {
            return Ok(());
        };
        player.set_window_size(window.width, window.height);

        let layout = surface::fit_surface(&video.with_window(window.width, window.height))?;
        player.apply_layout(&layout);

        log::info!(
            "Video layout: surface {}, container {}{}",
            layout.surface,
            layout.container,
            if layout.engine_managed {
                " (engine managed)"
            } else {
                ""
            }
        );
        self.layout = Some(layout);
        Ok(())
    }

    fn notify_loading(&mut self, loading: bool) {
        self.not_loading.cancel();
        if let Some(listener) = self.on_loading_state_changed.as_mut() {
            listener(loading);
        }
    }
}

impl Drop for VideoView {
    fn drop(&mut self) {
        self.release();
    }
}
