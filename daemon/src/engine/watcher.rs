//! Translates GStreamer bus traffic and position changes into player events.
//!
//! GStreamer has no "time changed" notification, so the watcher polls the
//! playback position between bus messages and reports every change.

use super::{EventSink, PlayerEvent, VideoLayout};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Poll interval for bus messages and position updates
const POLL_INTERVAL_MS: u64 = 100;

/// Spawn the watcher thread for `playbin`.
///
/// The thread exits once `stop` is set or the UI loop has gone away.
pub fn spawn(
    playbin: gst::Element,
    events: EventSink,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let name = format!("watch-{}", events.player_id());
    std::thread::Builder::new()
        .name(name)
        .spawn(move || watch(playbin, events, stop))
}

fn watch(playbin: gst::Element, events: EventSink, stop: Arc<AtomicBool>) {
    let Some(bus) = playbin.bus() else {
        log::error!("{}: playbin has no bus", events.player_id());
        return;
    };

    let mut position = PositionTracker::default();
    let mut last_layout: Option<VideoLayout> = None;

    while !stop.load(Ordering::Acquire) {
        if let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(POLL_INTERVAL_MS))
            && let Some(event) = message_event(&msg)
        {
            if event == PlayerEvent::EndReached {
                log::debug!("{}: end of stream", events.player_id());
            }
            if !events.send(event) {
                break;
            }
        }

        if let Some(layout) = video_layout(&playbin)
            && last_layout != Some(layout)
        {
            last_layout = Some(layout);
            if !events.send(PlayerEvent::NewLayout(layout)) {
                break;
            }
        }

        if playbin.current_state() < gst::State::Paused {
            continue;
        }

        if let Some(event) = playbin
            .query_position::<gst::ClockTime>()
            .and_then(|t| position.update(t.mseconds() as i64))
            && !events.send(event)
        {
            break;
        }
    }

    log::debug!("{}: watcher stopped", events.player_id());
}

/// Map a bus message to the player event it stands for
fn message_event(msg: &gst::MessageRef) -> Option<PlayerEvent> {
    match msg.view() {
        gst::MessageView::Buffering(buffering) => {
            Some(PlayerEvent::Buffering(buffering.percent() as f32))
        }
        gst::MessageView::Eos(_) => Some(PlayerEvent::EndReached),
        gst::MessageView::Error(err) => {
            log::error!(
                "GStreamer error: {} (debug: {:?})",
                err.error(),
                err.debug()
            );
            Some(PlayerEvent::EncounteredError(err.error().to_string()))
        }
        _ => None,
    }
}

/// Turns polled positions into `TimeChanged` events, one per actual move
#[derive(Debug, Default)]
struct PositionTracker {
    last: Option<i64>,
}

impl PositionTracker {
    fn update(&mut self, ms: i64) -> Option<PlayerEvent> {
        if self.last == Some(ms) {
            return None;
        }
        self.last = Some(ms);
        Some(PlayerEvent::TimeChanged(ms))
    }
}

/// Negotiated geometry of the first video stream, if any
fn video_layout(playbin: &gst::Element) -> Option<VideoLayout> {
    let pad = playbin.emit_by_name::<Option<gst::Pad>>("get-video-pad", &[&0i32])?;
    let caps = pad.current_caps()?;
    let info = gst_video::VideoInfo::from_caps(&caps).ok()?;
    Some(layout_from_info(&info))
}

fn layout_from_info(info: &gst_video::VideoInfo) -> VideoLayout {
    let (sar_num, sar_den) = pixel_aspect(info.par());

    VideoLayout {
        width: info.width(),
        height: info.height(),
        // playbin crops before the sink, nothing decoded stays hidden
        visible_width: info.width(),
        visible_height: info.height(),
        sar_num,
        sar_den,
    }
}

/// Pixel aspect as unsigned terms; negative terms count as unknown (0)
fn pixel_aspect(par: gst::Fraction) -> (u32, u32) {
    (par.numer().max(0) as u32, par.denom().max(0) as u32)
}
