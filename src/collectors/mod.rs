pub mod mock;
pub mod nvidia;
pub mod system;

pub use mock::MockTelemetry;
pub use system::SystemTelemetry;

/// Text providers behind the sensor lines.
///
/// `None` means the reading is unavailable and the sensor is left off the
/// display; `Some(String::new())` is a valid, if empty, reading.
pub trait TelemetrySource: Send + Sync {
    fn cpu_text(&self) -> Option<String>;

    fn gpu_text(&self) -> Option<String>;

    fn temp_text(&self, chip: Option<&str>, label: Option<&str>) -> Option<String>;
}
