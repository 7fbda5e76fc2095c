//! System memory probing
//!
//! Reads total and available physical memory, used to pick a model tier.

/// Physical memory snapshot in megabytes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryInfo {
    pub total_mb: f64,
    pub available_mb: f64,
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
use std::process::Command;

/// Read system memory (None when the platform query fails)
pub fn read_memory() -> Option<MemoryInfo> {
    #[cfg(target_os = "windows")]
    {
        return read_memory_windows();
    }

    #[cfg(target_os = "macos")]
    {
        return read_memory_macos();
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo(&meminfo)
    }
}

// =============================================================================
// Linux
// =============================================================================

/// Parse `/proc/meminfo` (values are reported in kB)
pub fn parse_meminfo(text: &str) -> Option<MemoryInfo> {
    let mut total_kb: Option<u64> = None;
    let mut available_kb: Option<u64> = None;

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        match key {
            "MemTotal:" => total_kb = value.parse().ok(),
            "MemAvailable:" => available_kb = value.parse().ok(),
            _ => {}
        }
    }

    match (total_kb, available_kb) {
        (Some(total), Some(available)) if total > 0 => Some(MemoryInfo {
            total_mb: total as f64 / 1024.0,
            available_mb: available as f64 / 1024.0,
        }),
        _ => None,
    }
}

// =============================================================================
// macOS
// =============================================================================

#[cfg(target_os = "macos")]
fn read_memory_macos() -> Option<MemoryInfo> {
    let total_bytes = {
        let output = Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<u64>()
            .ok()?
    };

    let output = Command::new("vm_stat").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let used_bytes = parse_vm_stat_used_bytes(&String::from_utf8_lossy(&output.stdout));

    let total_mb = total_bytes as f64 / 1024.0 / 1024.0;
    let used_mb = used_bytes as f64 / 1024.0 / 1024.0;
    Some(MemoryInfo {
        total_mb,
        available_mb: (total_mb - used_mb).max(0.0),
    })
}

/// Active + wired pages times the page size reported in the header
#[cfg(any(target_os = "macos", test))]
fn parse_vm_stat_used_bytes(stdout: &str) -> u64 {
    let mut page_size: u64 = 16384;
    let mut active_pages: u64 = 0;
    let mut wired_pages: u64 = 0;

    for line in stdout.lines() {
        // "Mach Virtual Memory Statistics: (page size of 16384 bytes)"
        if let Some(start) = line.find("page size of ") {
            let after = &line[start + 13..];
            if let Some(ps) = after.split(' ').next().and_then(|v| v.parse().ok()) {
                page_size = ps;
            }
        }

        let pages = |prefix: &str| {
            line.trim_start_matches(prefix)
                .trim()
                .trim_end_matches('.')
                .parse::<u64>()
                .ok()
        };
        if line.starts_with("Pages active:") {
            active_pages = pages("Pages active:").unwrap_or(active_pages);
        } else if line.starts_with("Pages wired down:") {
            wired_pages = pages("Pages wired down:").unwrap_or(wired_pages);
        }
    }

    (active_pages + wired_pages) * page_size
}

// =============================================================================
// Windows
// =============================================================================

#[cfg(target_os = "windows")]
fn read_memory_windows() -> Option<MemoryInfo> {
    let output = Command::new("wmic")
        .args(["OS", "get", "FreePhysicalMemory,TotalVisibleMemorySize", "/Value"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_wmic_memory(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `wmic OS get ... /Value` output (values are reported in kB)
#[cfg(any(target_os = "windows", test))]
fn parse_wmic_memory(stdout: &str) -> Option<MemoryInfo> {
    let mut free_kb: Option<u64> = None;
    let mut total_kb: Option<u64> = None;

    for line in stdout.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("FreePhysicalMemory=") {
            free_kb = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("TotalVisibleMemorySize=") {
            total_kb = value.trim().parse().ok();
        }
    }

    match (free_kb, total_kb) {
        (Some(free), Some(total)) if total > 0 => Some(MemoryInfo {
            total_mb: total as f64 / 1024.0,
            available_mb: free as f64 / 1024.0,
        }),
        _ => None,
    }
}
