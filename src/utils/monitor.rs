#[cfg(feature = "monitor")]
use std::sync::Mutex;
use std::time::Duration;
#[cfg(feature = "monitor")]
use std::time::Instant;
#[cfg(feature = "monitor")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct ResourceStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

/// 流水線資源監控，每個 stage 結束時記錄一次
#[cfg(feature = "monitor")]
pub struct ResourceMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    start_time: Instant,
    peak_memory: Mutex<u64>,
    enabled: bool,
}

#[cfg(feature = "monitor")]
impl ResourceMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if enabled && pid.is_none() {
            tracing::warn!("⚠️ Could not resolve current PID, resource stats disabled");
        }

        Self {
            system: Mutex::new(System::new()),
            pid,
            start_time: Instant::now(),
            peak_memory: Mutex::new(0),
            enabled: enabled && pid.is_some(),
        }
    }

    pub fn get_stats(&self) -> Option<ResourceStats> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;

        let mut peak = self.peak_memory.lock().ok()?;
        if memory_mb > *peak {
            *peak = memory_mb;
        }

        Some(ResourceStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            peak_memory_mb: *peak,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// 未啟用 monitor feature 時的空實現
#[cfg(not(feature = "monitor"))]
pub struct ResourceMonitor;

#[cfg(not(feature = "monitor"))]
impl ResourceMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn get_stats(&self) -> Option<ResourceStats> {
        None
    }

    pub fn is_enabled(&self) -> bool {
        false
    }
}

impl ResourceMonitor {
    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
