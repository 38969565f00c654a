use log::debug;
use std::fs::{read_dir, File};
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// One `tempN_input` reading of a hwmon chip.
#[derive(Debug, Clone, Default)]
pub struct HwmonSensor {
    pub id: u32,
    /// Chip name from the `name` file, e.g. `coretemp`, `k10temp`, `nvme`.
    pub chip: String,
    /// Content of `tempN_label`, empty when the driver does not provide one.
    pub label: String,
    pub temperature: f32,
}

/// Read every `hwmonN` directory under `root`.
///
/// Entries in `/sys/class/hwmon` are symlinks into the device tree, so links
/// are followed. Sensors come back ordered by directory name and then by `N`.
pub fn scan(root: &Path) -> Vec<HwmonSensor> {
    let mut sensors = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .flatten()
    {
        if entry.file_type().is_dir() {
            from_hwmon(&mut sensors, entry.path());
        }
    }
    debug!("hwmon scan of {} found {} sensor(s)", root.display(), sensors.len());
    sensors
}

/// Pick the first sensor whose chip name contains `chip` and whose label
/// equals `label`. Both comparisons ignore case; a missing filter matches all.
pub fn find<'a>(
    sensors: &'a [HwmonSensor],
    chip: Option<&str>,
    label: Option<&str>,
) -> Option<&'a HwmonSensor> {
    let chip = chip.map(str::to_lowercase);
    let label = label.map(str::to_lowercase);
    sensors.iter().find(|sensor| {
        let chip_ok = chip
            .as_deref()
            .map_or(true, |c| sensor.chip.to_lowercase().contains(c));
        let label_ok = label
            .as_deref()
            .map_or(true, |l| sensor.label.to_lowercase() == l);
        chip_ok && label_ok
    })
}

/// Collect the `tempN_input` files of one hwmon `folder`.
///
/// A sensor without a readable input is dropped. `name` and `tempN_label`
/// are optional.
///
/// Kernel hwmon sysfs API: https://www.kernel.org/doc/html/latest/hwmon/sysfs-interface.html
fn from_hwmon(sensors: &mut Vec<HwmonSensor>, folder: &Path) -> Option<()> {
    let chip = get_file_line(&folder.join("name"), 16).unwrap_or_default();
    let mut found = Vec::new();

    for entry in read_dir(folder).ok()?.flatten() {
        if !entry.file_type().is_ok_and(|file_type| !file_type.is_dir()) {
            continue;
        }

        let filename = entry.file_name();
        let filename = filename.to_str().unwrap_or("");
        let Some(id) = filename
            .strip_prefix("temp")
            .and_then(|f| f.strip_suffix("_input"))
            .and_then(|id| id.parse::<u32>().ok())
        else {
            continue;
        };

        let Some(temperature) = get_temperature_from_file(&entry.path()) else {
            continue;
        };
        let label = get_file_line(&folder.join(format!("temp{}_label", id)), 16).unwrap_or_default();
        found.push(HwmonSensor {
            id,
            chip: chip.clone(),
            label,
            temperature,
        });
    }

    found.sort_by_key(|sensor| sensor.id);
    sensors.extend(found);
    Some(())
}

// Read arbitrary string data.
fn get_file_line(file: &Path, capacity: usize) -> Option<String> {
    let mut reader = String::with_capacity(capacity);
    let mut f = File::open(file).ok()?;
    f.read_to_string(&mut reader).ok()?;
    reader.truncate(reader.trim_end().len());
    Some(reader)
}

/// Designed at first for reading an `i32` or `u32` aka `c_long`
/// from a `/sys/class/hwmon` sysfs file.
fn read_number_from_file<N>(file: &Path) -> Option<N>
where
    N: std::str::FromStr,
{
    let mut reader = [0u8; 32];
    let mut f = File::open(file).ok()?;
    let n = f.read(&mut reader).ok()?;
    // parse and trim would complain about `\0`.
    let number = &reader[..n];
    let number = std::str::from_utf8(number).ok()?;
    number.trim().trim_end_matches('\0').parse().ok()
}

// Sysfs temperatures are in milli-celsius.
#[inline]
fn get_temperature_from_file(file: &Path) -> Option<f32> {
    read_number_from_file::<i32>(file).map(|n| (n as f32) / 1000f32)
}
