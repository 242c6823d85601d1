//! Host statistics for the `stats` console command.

use serde::Serialize;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub usage: f32,
    pub model: String,
    pub cores: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RamStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub usage_percent: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub cpu: CpuStats,
    pub ram: RamStats,
    pub uptime: u64,
    pub platform: String,
    pub hostname: String,
    pub sampled_at: chrono::DateTime<chrono::Utc>,
}

fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

/// Keeps one `System` alive so CPU usage is measured between samples.
pub struct StatsSampler {
    sys: System,
}

impl StatsSampler {
    pub fn new() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_all();
        Self { sys }
    }

    /// Take a sample. The first one after construction waits briefly so the
    /// CPU delta is meaningful.
    pub async fn sample(&mut self) -> SystemStats {
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.sys.refresh_cpu();
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        let used = self.sys.used_memory();
        let cpus = self.sys.cpus();

        SystemStats {
            cpu: CpuStats {
                usage: self.sys.global_cpu_info().cpu_usage().round(),
                model: cpus
                    .first()
                    .map(|cpu| cpu.brand().trim().to_string())
                    .filter(|brand| !brand.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
                cores: cpus.len(),
            },
            ram: RamStats {
                total,
                used,
                free: total.saturating_sub(used),
                usage_percent: percent(used, total),
            },
            uptime: System::uptime(),
            platform: std::env::consts::OS.to_string(),
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            sampled_at: chrono::Utc::now(),
        }
    }
}

impl Default for StatsSampler {
    fn default() -> Self {
        Self::new()
    }
}
