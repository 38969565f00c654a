use log::debug;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use sysinfo::System as SysInfo;
use systemstat::{Platform, System as SystemStat};

use crate::collectors::{nvidia, TelemetrySource};
use crate::utils::hwmon;

/// Readings from the local machine.
///
/// CPU load is the usage since the previous `cpu_text` call, so the very first
/// reading after start-up is 0%.
pub struct SystemTelemetry {
    sys_info: Mutex<SysInfo>,
    sys_stat: SystemStat,
    hwmon_root: PathBuf,
}

impl SystemTelemetry {
    pub fn new() -> Self {
        Self::with_hwmon_root(hwmon::HWMON_ROOT)
    }

    pub fn with_hwmon_root(root: impl Into<PathBuf>) -> Self {
        let mut sys_info = SysInfo::new();
        sys_info.refresh_cpu_usage();
        Self {
            sys_info: Mutex::new(sys_info),
            sys_stat: SystemStat::new(),
            hwmon_root: root.into(),
        }
    }
}

impl Default for SystemTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_cpu(load: f32, memory_percent: f32, temperature: Option<f32>) -> String {
    match temperature {
        Some(t) => format!("{:.0}% {:.0}% {:.0}C", load, memory_percent, t),
        None => format!("{:.0}% {:.0}%", load, memory_percent),
    }
}

impl TelemetrySource for SystemTelemetry {
    fn cpu_text(&self) -> Option<String> {
        let start = Instant::now();
        let (load, memory_percent) = {
            let mut sys = match self.sys_info.lock() {
                Ok(sys) => sys,
                Err(poisoned) => poisoned.into_inner(),
            };
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            let total = sys.total_memory();
            let memory_percent = if total > 0 {
                sys.used_memory() as f32 / total as f32 * 100.0
            } else {
                0.0
            };
            (sys.global_cpu_usage(), memory_percent)
        };

        let temperature = match self.sys_stat.cpu_temp() {
            Ok(t) => Some(t),
            Err(x) => {
                debug!("CPU temp: unavailable: {}", x);
                None
            }
        };
        debug!("cpu_text took: {} ms", start.elapsed().as_millis());
        Some(format_cpu(load, memory_percent, temperature))
    }

    fn gpu_text(&self) -> Option<String> {
        nvidia::collect().map(|info| info.display())
    }

    fn temp_text(&self, chip: Option<&str>, label: Option<&str>) -> Option<String> {
        let sensors = hwmon::scan(&self.hwmon_root);
        match hwmon::find(&sensors, chip, label) {
            Some(sensor) => Some(format!("{:.0}C", sensor.temperature)),
            None => {
                debug!(
                    "No hwmon temperature for chip={} label={}",
                    chip.unwrap_or("*"),
                    label.unwrap_or("*")
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(12.4, 40.6, Some(45.2)), "12% 41% 45C");
        assert_eq!(format_cpu(3.0, 50.0, None), "3% 50%");
    }

    #[test]
    fn test_temp_text_from_hwmon_tree() {
        let root = TempDir::new().unwrap();
        let chip = root.path().join("hwmon3");
        fs::create_dir_all(&chip).unwrap();
        fs::write(chip.join("name"), "k10temp\n").unwrap();
        fs::write(chip.join("temp1_input"), "61250\n").unwrap();
        fs::write(chip.join("temp1_label"), "Tctl\n").unwrap();

        let telemetry = SystemTelemetry::with_hwmon_root(root.path());

        assert_eq!(telemetry.temp_text(Some("k10"), Some("tctl")), Some("61C".to_string()));
        assert_eq!(telemetry.temp_text(Some("amdgpu"), None), None);
    }

    #[test]
    fn test_cpu_text_always_has_a_value() {
        let telemetry = SystemTelemetry::with_hwmon_root("/nonexistent");
        let text = telemetry.cpu_text().unwrap();
        assert!(text.contains('%'));
    }
}
