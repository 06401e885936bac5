//! Process-level stats used by `/status`, `/stats`, and the health sweep.

use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Resident memory of this process in megabytes, or 0 if unavailable.
pub fn process_memory_mb() -> u64 {
    let pid = Pid::from_u32(std::process::id());
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid)
        .map(|p| p.memory() / (1024 * 1024))
        .unwrap_or(0)
}

/// Format an uptime duration as `{d}d {h}h {m}m {s}s`.
pub fn format_uptime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{days}d {hours}h {minutes}m {seconds}s")
}
