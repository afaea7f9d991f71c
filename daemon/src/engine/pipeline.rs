//! GStreamer initialization and playbin configuration
//!
//! Engine arguments use the command-line style produced by
//! [`crate::options::EngineOptions::to_args`]; per-media options use the
//! colon-prefixed form (`:network-caching=300`). Only the options that map
//! onto `playbin` are applied, the rest are logged and ignored.

use anyhow::{Context, Result};
use common::MediaRequest;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::path::Path;
use std::sync::OnceLock;

/// Initialize GStreamer (idempotent, safe to call multiple times)
pub fn initialize_gstreamer() -> Result<()> {
    static GSTREAMER_INITIALIZED: OnceLock<Result<(), String>> = OnceLock::new();

    GSTREAMER_INITIALIZED
        .get_or_init(|| {
            gst::init().map_err(|e| e.to_string())?;
            log::info!("GStreamer initialized ({})", gst::version_string());
            Ok(())
        })
        .clone()
        .map_err(|e| anyhow::anyhow!("Failed to initialize GStreamer: {}", e))
}

/// Engine-wide settings understood by the GStreamer backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    /// Network buffering bound in milliseconds
    pub network_caching_ms: Option<u32>,
    pub verbose: bool,
}

impl EngineSettings {
    /// Parse engine arguments, keeping what `playbin` can honour
    pub fn from_args(args: &[String]) -> Self {
        let mut settings = Self::default();
        let mut ignored = Vec::new();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-vv" => settings.verbose = true,
                "-v" => settings.verbose = false,
                // options taking a separate value
                "--avcodec-skiploopfilter" | "--avcodec-skip-frame" | "--avcodec-skip-idct"
                | "--audio-resampler" => {
                    let value = iter.next().map(String::as_str).unwrap_or("");
                    ignored.push(format!("{} {}", arg, value));
                }
                other => match parse_caching(other, "--network-caching=") {
                    Some(ms) => settings.network_caching_ms = Some(ms),
                    None => ignored.push(other.to_string()),
                },
            }
        }

        if !ignored.is_empty() {
            log::debug!("Engine options without a GStreamer mapping: {:?}", ignored);
        }

        settings
    }
}

fn parse_caching(arg: &str, prefix: &str) -> Option<u32> {
    arg.strip_prefix(prefix)?.trim().parse().ok()
}

/// Resolve a locator into a URI `playbin` accepts.
///
/// Locators with a scheme pass through; anything else is treated as a local
/// path (with `~` expansion).
pub fn resolve_uri(request: &MediaRequest) -> Result<String> {
    if request.is_uri() {
        return Ok(request.locator.clone());
    }

    let expanded = shellexpand::tilde(&request.locator).to_string();
    let path = std::path::absolute(Path::new(&expanded))
        .with_context(|| format!("Invalid media path: {}", request.locator))?;

    let uri = gst::glib::filename_to_uri(&path, None)
        .with_context(|| format!("Cannot convert {} to a URI", path.display()))?;
    Ok(uri.to_string())
}

/// Build a `playbin` for `request` with engine and per-media settings applied
pub fn build_playbin(
    name: &str,
    request: &MediaRequest,
    settings: &EngineSettings,
) -> Result<gst::Element> {
    let uri = resolve_uri(request)?;
    log::info!("Creating playbin {} for: {}", name, uri);

    let playbin = gst::ElementFactory::make("playbin")
        .name(name)
        .property("uri", uri.as_str())
        .build()
        .context("Failed to create playbin (is gst-plugins-base installed?)")?;

    let mut caching_ms = settings.network_caching_ms;
    for option in &request.options {
        match parse_caching(option, ":network-caching=") {
            Some(ms) => caching_ms = Some(ms),
            None => log::debug!("Ignoring media option without GStreamer mapping: {}", option),
        }
    }

    if let Some(ms) = caching_ms {
        log::debug!("{}: buffer-duration {}ms", name, ms);
        playbin.set_property("buffer-duration", i64::from(ms) * 1_000_000);
    }

    Ok(playbin)
}

/// Create the sink rendering the video (and burnt-in subtitles)
pub fn build_video_sink() -> Result<gst::Element> {
    gst::ElementFactory::make("autovideosink")
        .build()
        .context("Failed to create autovideosink")
}

/// Toggle the video bit of `playbin`'s flags
pub fn set_video_flag(playbin: &gst::Element, enabled: bool) {
    let flags = if enabled {
        "soft-volume+text+audio+video"
    } else {
        "soft-volume+text+audio"
    };
    playbin.set_property_from_str("flags", flags);
}
