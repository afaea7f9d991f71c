//! Engine command-line options derived from configuration and CPU specs.

use crate::machine::MachineSpecs;
use serde::{Deserialize, Serialize};

/// Highest deblocking level (skip the loop filter on every frame)
pub const MAX_DEBLOCKING: i32 = 4;

/// Upper bound for network caching, in milliseconds
pub const MAX_NETWORK_CACHING_MS: u32 = 60_000;

/// Settings turned into engine arguments by [`EngineOptions::to_args`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineOptions {
    /// Loop filter skip level 0-4, negative picks one from the CPU specs
    #[serde(default = "default_deblocking")]
    pub deblocking: i32,

    #[serde(default)]
    pub enable_frame_skip: bool,

    #[serde(default)]
    pub enable_time_stretching_audio: bool,

    /// Network caching in milliseconds, 0 leaves the engine default
    #[serde(default)]
    pub network_caching: u32,

    #[serde(default = "default_verbose")]
    pub verbose_mode: bool,

    /// Extra arguments passed to the engine as-is
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            deblocking: default_deblocking(),
            enable_frame_skip: false,
            enable_time_stretching_audio: false,
            network_caching: 0,
            verbose_mode: default_verbose(),
            extra_args: Vec::new(),
        }
    }
}

fn default_deblocking() -> i32 {
    -1
}
fn default_verbose() -> bool {
    cfg!(debug_assertions)
}

impl EngineOptions {
    /// Build the ordered engine argument list
    pub fn to_args(&self, specs: Option<&MachineSpecs>) -> Vec<String> {
        let mut args = Vec::with_capacity(16);
        let skip = if self.enable_frame_skip { "2" } else { "0" };

        args.push(
            if self.enable_time_stretching_audio {
                "--audio-time-stretch"
            } else {
                "--no-audio-time-stretch"
            }
            .to_string(),
        );
        args.push("--avcodec-skiploopfilter".to_string());
        args.push(resolve_deblocking(self.deblocking, specs).to_string());
        args.push("--avcodec-skip-frame".to_string());
        args.push(skip.to_string());
        args.push("--avcodec-skip-idct".to_string());
        args.push(skip.to_string());
        args.push("--audio-resampler".to_string());
        args.push(resampler(specs).to_string());

        if self.network_caching > 0 {
            args.push(format!(
                "--network-caching={}",
                self.network_caching.min(MAX_NETWORK_CACHING_MS)
            ));
        }

        args.extend(self.extra_args.iter().cloned());

        args.push(if self.verbose_mode { "-vv" } else { "-v" }.to_string());
        args
    }
}

/// Pick the loop filter skip level.
///
/// - negative: derive from specs (left as-is when specs are unknown)
///   - ARMv6 without ARMv7, or MIPS: skip all (4)
///   - >= 1200 MHz and more than 2 cores: skip non-ref (1)
///   - same by BogoMIPS when the frequency is unknown
///   - anything else: skip non-key (3)
/// - above [`MAX_DEBLOCKING`]: falls back to 3, not to the maximum
pub fn resolve_deblocking(deblocking: i32, specs: Option<&MachineSpecs>) -> i32 {
    if deblocking > MAX_DEBLOCKING {
        return 3;
    }
    if deblocking >= 0 {
        return deblocking;
    }

    let Some(m) = specs else {
        return deblocking;
    };

    if (m.has_armv6 && !m.has_armv7) || m.has_mips {
        4
    } else if m.frequency_mhz >= 1200 && m.processors > 2 {
        1
    } else if m.bogo_mips >= 1200.0 && m.processors > 2 {
        log::debug!("Used bogoMIPS due to lack of frequency info");
        1
    } else {
        3
    }
}

/// Quality resampler unless the machine is known to have two cores or fewer
pub fn resampler(specs: Option<&MachineSpecs>) -> &'static str {
    match specs {
        Some(m) if m.processors <= 2 => "ugly",
        _ => "soxr",
    }
}
