use anyhow::{bail, Context, Result};
use config::{Config, File, FileFormat};
use indexmap::IndexMap;
use log::{debug, LevelFilter};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::models::{CommandSpec, Provider, SensorSpec};

/// Rows the display can hold, META line included.
pub const MAX_LINES_LIMIT: usize = 12;

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud() -> u32 {
    115200
}

fn default_interval() -> f64 {
    5.0
}

fn default_max_lines() -> usize {
    MAX_LINES_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "error".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
struct SensorSection {
    #[serde(default)]
    name: String,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    params: IndexMap<String, String>,
    #[serde(default)]
    join: Option<Vec<SensorSection>>,
}

#[derive(Debug, Deserialize, Clone)]
struct CommandSection {
    #[serde(default)]
    id: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    exec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_interval")]
    interval: f64,
    #[serde(default)]
    serial: SerialConfig,
    #[serde(default = "default_max_lines")]
    max_lines: usize,
    #[serde(default)]
    sensors: Vec<SensorSection>,
    #[serde(default)]
    commands: Vec<CommandSection>,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Seconds between telemetry frames.
    pub interval: f64,
    pub serial: SerialConfig,
    pub max_lines: usize,
    pub sensors: Vec<SensorSpec>,
    pub commands: Vec<CommandSpec>,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            serial: SerialConfig::default(),
            max_lines: default_max_lines(),
            sensors: Vec::new(),
            commands: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

// A section with a `join` list and no provider is a join.
fn sensor_from_section(section: SensorSection, path: &str) -> Result<SensorSpec> {
    let provider = match (&section.provider, &section.join) {
        (Some(provider), _) => provider
            .parse::<Provider>()
            .map_err(|e| anyhow::anyhow!("{} '{}': {}", path, section.name, e))?,
        (None, Some(_)) => Provider::Join,
        (None, None) => bail!("{} '{}': missing provider", path, section.name),
    };

    let children = section
        .join
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(j, child)| sensor_from_section(child, &format!("{}.join[{}]", path, j)))
        .collect::<Result<Vec<_>>>()?;

    Ok(SensorSpec {
        name: section.name.trim().to_string(),
        provider,
        enabled: section.enabled,
        params: section.params,
        children,
    })
}

fn command_from_section(section: CommandSection) -> CommandSpec {
    CommandSpec {
        id: section.id.trim().to_string(),
        label: section.label.trim().to_string(),
        exec: section.exec.map(|e| e.trim().to_string()),
    }
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        Self::from_file("config.yaml")
    }

    /// Falls back to the default period for values `validate` rejects.
    pub fn interval_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval)
            .ok()
            .filter(|period| !period.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(default_interval()))
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Error, // Default to Error if invalid
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        debug!("Loading configuration from {}", config_path.display());

        let config = Config::builder()
            .add_source(File::from(config_path).format(FileFormat::Yaml))
            .build()
            .context(format!("Failed to load config from {}", config_path.display()))?;

        Self::from_config(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .context("Failed to parse config")?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self> {
        let raw: RawConfig = config
            .try_deserialize()
            .context("Failed to deserialize config")?;

        let sensors = raw
            .sensors
            .into_iter()
            .enumerate()
            .map(|(i, section)| sensor_from_section(section, &format!("sensors[{}]", i)))
            .collect::<Result<Vec<_>>>()?;

        let app_config = AppConfig {
            interval: raw.interval,
            serial: raw.serial,
            max_lines: raw.max_lines,
            sensors,
            commands: raw.commands.into_iter().map(command_from_section).collect(),
            logging: raw.logging,
        };
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<()> {
        match Duration::try_from_secs_f64(self.interval) {
            Ok(period) if !period.is_zero() => {}
            _ => bail!("interval must be a positive number of seconds, got {}", self.interval),
        }
        if self.max_lines == 0 || self.max_lines > MAX_LINES_LIMIT {
            bail!("max_lines must be between 1 and {}", MAX_LINES_LIMIT);
        }
        if self.serial.port.trim().is_empty() {
            bail!("serial.port must be a non-empty string");
        }
        if self.serial.baud == 0 {
            bail!("serial.baud must be > 0");
        }

        for (i, sensor) in self.sensors.iter().enumerate() {
            if sensor.provider == Provider::Join && sensor.children.is_empty() {
                bail!("sensors[{}] '{}': join must contain at least one child", i, sensor.name);
            }
            for (j, child) in sensor.children.iter().enumerate() {
                if !child.provider.is_leaf() || !child.children.is_empty() {
                    bail!(
                        "sensors[{}].join[{}] '{}': invalid provider '{}'",
                        i,
                        j,
                        child.name,
                        child.provider
                    );
                }
            }
        }

        let mut seen = HashSet::new();
        for (j, command) in self.commands.iter().enumerate() {
            if command.id.is_empty() {
                bail!("commands[{}]: id must be non-empty", j);
            }
            if command.label.is_empty() {
                bail!("commands[{}]: label must be non-empty", j);
            }
            if !seen.insert(command.id.as_str()) {
                bail!("commands[{}]: duplicate id '{}'", j, command.id);
            }
            if command.exec.as_deref().is_some_and(|e| e.trim().is_empty()) {
                bail!("commands[{}]: exec must be non-empty when provided", j);
            }
        }

        Ok(())
    }
}
