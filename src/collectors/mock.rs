use std::sync::atomic::{AtomicU64, Ordering};

use crate::collectors::TelemetrySource;

/// Synthetic readings that drift a little on every CPU query, for driving a
/// display on the bench without real sensors.
#[derive(Debug, Default)]
pub struct MockTelemetry {
    tick: AtomicU64,
}

impl MockTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    fn wobble(&self, base: u64, spread: u64) -> u64 {
        base + self.tick.load(Ordering::Relaxed) % spread
    }
}

impl TelemetrySource for MockTelemetry {
    fn cpu_text(&self) -> Option<String> {
        self.tick.fetch_add(1, Ordering::Relaxed);
        Some(format!("{}% {}% {}C", self.wobble(20, 10), self.wobble(40, 5), self.wobble(42, 4)))
    }

    fn gpu_text(&self) -> Option<String> {
        Some(format!("{}% 512MB {}C", self.wobble(10, 8), self.wobble(45, 3)))
    }

    fn temp_text(&self, _chip: Option<&str>, _label: Option<&str>) -> Option<String> {
        Some(format!("{}C", self.wobble(35, 6)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_change_between_ticks() {
        let mock = MockTelemetry::new();
        let first = mock.cpu_text().unwrap();
        let second = mock.cpu_text().unwrap();
        assert_ne!(first, second);
        assert_eq!(mock.temp_text(None, None), Some("37C".to_string()));
    }
}
