use std::fs;
use std::path::Path;
use std::thread;

use sysinfo::{CpuRefreshKind, RefreshKind, System};

const CPU_SYSFS: &str = "/sys/devices/system/cpu";

/// Logical processor counts as seen by the operating system
pub trait OsProcessors {
    /// Ceiling on logical processors the OS is configured for
    fn configured(&self) -> u32;

    /// Logical processors currently online
    fn online(&self) -> u32;
}

/// Host OS counts: sysfs on Linux, sysinfo and the standard library elsewhere
pub struct HostProcessors;

impl OsProcessors for HostProcessors {
    fn configured(&self) -> u32 {
        let sysfs = Path::new(CPU_SYSFS);
        read_cpu_list(&sysfs.join("present"))
            .or_else(|| read_cpu_list(&sysfs.join("possible")))
            .unwrap_or_else(|| self.online())
    }

    fn online(&self) -> u32 {
        read_cpu_list(&Path::new(CPU_SYSFS).join("online")).unwrap_or_else(fallback_count)
    }
}

/// Fixed counts, for hosts where the caller already knows them
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedProcessors {
    pub configured: u32,
    pub online: u32,
}

impl OsProcessors for FixedProcessors {
    fn configured(&self) -> u32 {
        self.configured
    }

    fn online(&self) -> u32 {
        self.online
    }
}

fn read_cpu_list(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    let count = parse_cpu_list(&content)?;
    log::debug!("{}: {count} logical processors", path.display());
    Some(count)
}

fn fallback_count() -> u32 {
    let system =
        System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()));
    let count = system.cpus().len();
    if count > 0 {
        return u32::try_from(count).unwrap_or(u32::MAX);
    }

    thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

/// Count the CPUs in a kernel CPU list such as `0-3,5,7-8`
pub fn parse_cpu_list(list: &str) -> Option<u32> {
    let list = list.trim();
    if list.is_empty() {
        return None;
    }

    let mut count: u32 = 0;
    for part in list.split(',') {
        let part = part.trim();
        let span = match part.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start.trim().parse().ok()?;
                let end: u32 = end.trim().parse().ok()?;
                end.checked_sub(start)?.checked_add(1)?
            }
            None => {
                part.parse::<u32>().ok()?;
                1
            }
        };
        count = count.checked_add(span)?;
    }

    Some(count)
}
