use log::debug;
use std::time::Duration;

use crate::collectors::TelemetrySource;
use crate::models::{Provider, SensorSpec};
use crate::protocol::{meta_line, truncate};

// Text for a single-value provider. Composites have no leaf text.
fn leaf_text(sensor: &SensorSpec, source: &dyn TelemetrySource) -> Option<String> {
    match sensor.provider {
        Provider::Cpu => source.cpu_text(),
        Provider::Gpu => source.gpu_text(),
        Provider::Temp => source.temp_text(sensor.param("chip"), sensor.param("label")),
        Provider::Join => None,
    }
}

fn with_name(name: &str, text: String) -> String {
    if name.is_empty() {
        text
    } else {
        format!("{} {}", name, text)
    }
}

fn composite_text(sensor: &SensorSpec, source: &dyn TelemetrySource) -> Option<String> {
    let parts: Vec<String> = sensor
        .children
        .iter()
        .filter(|child| child.enabled)
        .filter_map(|child| leaf_text(child, source).map(|text| with_name(&child.name, text)))
        .collect();

    if parts.is_empty() {
        return None;
    }
    Some(with_name(&sensor.name, parts.join(" ")))
}

fn sensor_line(sensor: &SensorSpec, source: &dyn TelemetrySource) -> Option<String> {
    if sensor.is_composite() {
        composite_text(sensor, source)
    } else {
        leaf_text(sensor, source).map(|text| with_name(&sensor.name, text))
    }
}

/// Build the rows for one telemetry frame.
///
/// The first row is always the `META` line. Sensor rows follow in declaration
/// order until `max(max_lines - 1, 1)` of them have been produced; sensors past
/// that point are never asked for a value. With `max_lines == 1` the frame
/// therefore carries two rows.
pub fn assemble(
    sensors: &[SensorSpec],
    source: &dyn TelemetrySource,
    max_lines: usize,
    interval: Duration,
) -> Vec<String> {
    let budget = max_lines.saturating_sub(1).max(1);
    let mut lines = vec![meta_line(interval)];
    let mut accepted = 0usize;

    for sensor in sensors.iter().filter(|s| s.enabled) {
        if accepted >= budget {
            break;
        }
        match sensor_line(sensor, source) {
            Some(text) => {
                lines.push(truncate(&text));
                accepted += 1;
            }
            None => debug!("Sensor '{}' ({}) has no value, skipping", sensor.name, sensor.provider),
        }
    }

    lines
}
