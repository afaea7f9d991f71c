use std::fs;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

/// CPU capabilities used to pick decoder defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineSpecs {
    /// ARMv6 instruction set available
    pub has_armv6: bool,
    /// ARMv7 instruction set available
    pub has_armv7: bool,
    pub has_mips: bool,
    /// Maximum CPU clock in MHz, 0 when unknown
    pub frequency_mhz: u64,
    /// Logical CPU count
    pub processors: usize,
    /// Kernel BogoMIPS rating of the first CPU, 0 when unknown
    pub bogo_mips: f32,
}

impl MachineSpecs {
    /// Probe the machine we are running on.
    ///
    /// Returns `None` when no CPU information is available at all.
    pub fn probe() -> Option<Self> {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_frequency()),
        );
        let cpus = system.cpus();

        let cpuinfo = fs::read_to_string("/proc/cpuinfo").unwrap_or_default();
        let mut specs = Self::from_cpuinfo(std::env::consts::ARCH, &cpuinfo);

        if !cpus.is_empty() {
            specs.processors = cpus.len();
        }
        let frequency = cpus.iter().map(|cpu| cpu.frequency()).max().unwrap_or(0);
        if frequency > 0 {
            specs.frequency_mhz = frequency;
        }

        if specs.processors == 0 {
            log::warn!("No CPU information available");
            return None;
        }

        log::debug!(
            "Machine specs: arch={} armv6={} armv7={} mips={} freq={}MHz cpus={} bogomips={:.1}",
            std::env::consts::ARCH,
            specs.has_armv6,
            specs.has_armv7,
            specs.has_mips,
            specs.frequency_mhz,
            specs.processors,
            specs.bogo_mips
        );

        Some(specs)
    }

    /// Derive specs from the target architecture and `/proc/cpuinfo` text
    pub fn from_cpuinfo(arch: &str, cpuinfo: &str) -> Self {
        let mut specs = Self {
            has_mips: arch.starts_with("mips"),
            // every aarch64 core runs ARMv7 code
            has_armv7: arch == "aarch64",
            has_armv6: arch == "aarch64",
            ..Default::default()
        };

        let mut processors = 0;
        for line in cpuinfo.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "processor" => processors += 1,
                "BogoMIPS" | "bogomips" if specs.bogo_mips == 0.0 => {
                    specs.bogo_mips = value.parse().unwrap_or(0.0);
                }
                "CPU architecture" => {
                    let version: u32 = value
                        .trim_start_matches("AArch64")
                        .trim()
                        .parse()
                        .unwrap_or(if value.starts_with("AArch64") { 8 } else { 0 });
                    specs.has_armv6 |= version >= 6;
                    specs.has_armv7 |= version >= 7;
                }
                "cpu model" if value.to_lowercase().contains("mips") => specs.has_mips = true,
                _ => {}
            }
        }
        specs.processors = processors;

        specs
    }
}
