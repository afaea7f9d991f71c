//! GStreamer-backed engine and player instances

use super::pipeline::{self, EngineSettings};
use super::{EnginePlayer, EventSink, MediaEngine, watcher};
use anyhow::{Context, Result};
use common::{LayoutResult, MediaRequest};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Engine creating one `playbin` per player
pub struct GstEngine {
    settings: EngineSettings,
}

impl GstEngine {
    /// Initialize GStreamer and apply engine-wide arguments
    pub fn new(args: &[String]) -> Result<Self> {
        pipeline::initialize_gstreamer()?;

        let settings = EngineSettings::from_args(args);
        if settings.verbose {
            gst::log::set_default_threshold(gst::DebugLevel::Info);
        }

        log::info!("GStreamer engine ready (args: {})", args.join(" "));
        Ok(Self { settings })
    }
}

impl MediaEngine for GstEngine {
    fn create_player(
        &self,
        request: &MediaRequest,
        events: EventSink,
    ) -> Result<Box<dyn EnginePlayer>> {
        let name = events.player_id().to_string();
        let playbin = pipeline::build_playbin(&name, request, &self.settings)?;

        let stop = Arc::new(AtomicBool::new(false));
        let watcher = watcher::spawn(playbin.clone(), events, Arc::clone(&stop))
            .context("Failed to spawn player watcher")?;

        Ok(Box::new(GstPlayer {
            name,
            playbin,
            stop,
            watcher: Some(watcher),
            attached: false,
            released: false,
            window: None,
        }))
    }
}

/// One `playbin` plus the thread watching it
pub struct GstPlayer {
    name: String,

    playbin: gst::Element,

    /// Tells the watcher thread to exit
    stop: Arc<AtomicBool>,

    watcher: Option<JoinHandle<()>>,

    attached: bool,

    released: bool,

    /// Host window size reported by the view
    window: Option<(u32, u32)>,
}

impl GstPlayer {
    fn set_state(&self, state: gst::State) {
        if let Err(e) = self.playbin.set_state(state) {
            log::warn!("{}: failed to set state {:?}: {}", self.name, state, e);
        }
    }

    fn overlay(&self) -> Option<gst_video::VideoOverlay> {
        let sink = self.playbin.property::<Option<gst::Element>>("video-sink")?;
        let element = match sink.clone().dynamic_cast::<gst::Bin>() {
            Ok(bin) => bin.by_interface(gst_video::VideoOverlay::static_type())?,
            Err(_) => sink,
        };
        element.dynamic_cast::<gst_video::VideoOverlay>().ok()
    }
}

impl EnginePlayer for GstPlayer {
    fn play(&mut self) {
        log::debug!("{}: play", self.name);
        self.set_state(gst::State::Playing);
    }

    fn pause(&mut self) {
        log::debug!("{}: pause", self.name);
        self.set_state(gst::State::Paused);
    }

    fn stop(&mut self) {
        log::debug!("{}: stop", self.name);
        self.set_state(gst::State::Ready);
    }

    fn set_time(&mut self, ms: i64) {
        let target = gst::ClockTime::from_mseconds(ms.max(0) as u64);
        if let Err(e) = self
            .playbin
            .seek_simple(gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT, target)
        {
            log::warn!("{}: seek to {}ms failed: {}", self.name, ms, e);
        }
    }

    fn time(&self) -> i64 {
        self.playbin
            .query_position::<gst::ClockTime>()
            .map(|t| t.mseconds() as i64)
            .unwrap_or(0)
    }

    fn length(&self) -> i64 {
        self.playbin
            .query_duration::<gst::ClockTime>()
            .map(|t| t.mseconds() as i64)
            .unwrap_or(0)
    }

    fn is_seekable(&self) -> bool {
        let mut query = gst::query::Seeking::new(gst::Format::Time);
        self.playbin.query(&mut query) && query.result().0
    }

    fn is_playing(&self) -> bool {
        self.playbin.current_state() == gst::State::Playing
    }

    fn is_released(&self) -> bool {
        self.released
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.stop.store(true, Ordering::Release);
        self.set_state(gst::State::Null);

        if let Some(watcher) = self.watcher.take()
            && watcher.join().is_err()
        {
            log::warn!("{}: watcher thread panicked", self.name);
        }

        log::info!("{}: released", self.name);
    }

    fn attach_views(&mut self) {
        match pipeline::build_video_sink() {
            Ok(sink) => {
                self.playbin.set_property("video-sink", &sink);
                self.attached = true;
            }
            Err(e) => log::error!("{}: {:#}", self.name, e),
        }
    }

    fn views_attached(&self) -> bool {
        self.attached
    }

    fn detach_views(&mut self) {
        self.set_state(gst::State::Null);
        match gst::ElementFactory::make("fakesink").build() {
            Ok(sink) => self.playbin.set_property("video-sink", &sink),
            Err(e) => log::warn!("{}: failed to create fakesink: {}", self.name, e),
        }
        self.attached = false;
    }

    fn set_video_track_enabled(&mut self, enabled: bool) {
        pipeline::set_video_flag(&self.playbin, enabled);
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window = Some((width, height));
    }

    fn apply_layout(&mut self, layout: &LayoutResult) {
        let Some(overlay) = self.overlay() else {
            log::debug!("{}: video sink has no overlay, layout not applied", self.name);
            return;
        };

        // center the cropping container in the window
        let (window_width, window_height) = self
            .window
            .unwrap_or((layout.container.width, layout.container.height));
        let x = window_width.saturating_sub(layout.container.width) / 2;
        let y = window_height.saturating_sub(layout.container.height) / 2;

        if let Err(e) = overlay.set_render_rectangle(
            x as i32,
            y as i32,
            layout.container.width as i32,
            layout.container.height as i32,
        ) {
            log::warn!("{}: failed to set render rectangle: {}", self.name, e);
        }
        overlay.expose();
    }
}

impl Drop for GstPlayer {
    fn drop(&mut self) {
        self.release();
    }
}
