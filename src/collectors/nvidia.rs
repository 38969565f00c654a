use log::{debug, error};
use std::process::Command;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct NvidiaInfo {
    /// Utilisation in percent.
    pub load: f32,
    pub memory_used_mib: u64,
    pub memory_total_mib: u64,
    pub temperature: f32,
}

impl NvidiaInfo {
    pub fn display(&self) -> String {
        format!(
            "{:.0}% {}MB {:.0}C",
            self.load, self.memory_used_mib, self.temperature
        )
    }
}

/// Parse one `--format=csv,noheader,nounits` row of
/// `utilization.gpu,memory.used,memory.total,temperature.gpu`.
pub fn parse_line(line: &str) -> Option<NvidiaInfo> {
    let values: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
    if values.len() != 4 {
        return None;
    }
    Some(NvidiaInfo {
        load: values[0].parse::<f32>().ok()?,
        memory_used_mib: values[1].parse::<f32>().ok()? as u64,
        memory_total_mib: values[2].parse::<f32>().ok()? as u64,
        temperature: values[3].parse::<f32>().ok()?,
    })
}

/// Query the first GPU. `None` when `nvidia-smi` is absent or fails.
pub fn collect() -> Option<NvidiaInfo> {
    let start = Instant::now();
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=utilization.gpu,memory.used,memory.total,temperature.gpu",
            "--format=csv,noheader,nounits",
        ])
        .output();
    debug!("nvidia-smi command execution took: {} ms", start.elapsed().as_millis());

    match output {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            stdout.lines().next().and_then(parse_line)
        }
        Ok(output) => {
            debug!("nvidia-smi exited with {}", output.status);
            None
        }
        Err(e) => {
            // Most hosts without an NVIDIA card end up here.
            if e.kind() != std::io::ErrorKind::NotFound {
                error!("Error getting NVIDIA GPU info: {}", e);
            }
            None
        }
    }
}
