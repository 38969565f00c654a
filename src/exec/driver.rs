use regex::Regex;
use std::io;
use std::sync::OnceLock;
use thiserror::Error;

use crate::exec::launcher::{Invocation, Launcher};
use crate::models::ExecDriver;

pub const SHELL: &str = "/bin/sh";
pub const UNIT_PREFIX: &str = "lcdcmd";

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("systemd-run failed for unit {unit}: {source}")]
    Failed {
        unit: String,
        #[source]
        source: io::Error,
    },
}

/// What a successful launch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    /// Transient unit name for the service-manager drivers.
    pub unit: Option<String>,
}

fn unit_unsafe_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9:_.\-]").expect("unit name pattern is valid"))
}

/// `lcdcmd-<id>-<unixtime>`, with characters systemd rejects in unit names
/// replaced by `_`.
pub fn unit_name(id: &str, unix_time: i64) -> String {
    format!(
        "{}-{}-{}",
        UNIT_PREFIX,
        unit_unsafe_chars().replace_all(id, "_"),
        unix_time
    )
}

impl ExecDriver {
    pub fn systemd_run(&self, unit: &str, command: &str, label: &str) -> Invocation {
        let mut args: Vec<String> = Vec::new();
        if *self == ExecDriver::SystemdUser {
            args.push("--user".to_string());
        }
        args.extend([
            format!("--unit={}", unit),
            format!("--description={}", label),
            "--collect".to_string(),
            "--property=Restart=no".to_string(),
            "--quiet".to_string(),
            SHELL.to_string(),
            "-c".to_string(),
            command.to_string(),
        ]);
        Invocation::new("systemd-run", args)
    }

    /// Launch `command` for the entry `id`/`label` and return without waiting
    /// for it to finish.
    pub fn execute(
        &self,
        launcher: &dyn Launcher,
        command: &str,
        id: &str,
        label: &str,
    ) -> Result<Started, ExecError> {
        match self {
            ExecDriver::Shell => {
                let invocation = Invocation::new(SHELL, ["-c", command]);
                launcher
                    .spawn(&invocation)
                    .map_err(|source| ExecError::Spawn {
                        program: invocation.program.clone(),
                        source,
                    })?;
                Ok(Started { unit: None })
            }
            ExecDriver::SystemdUser | ExecDriver::SystemdSystem => {
                let unit = unit_name(id, chrono::Utc::now().timestamp());
                // systemd-run returns once the unit is queued.
                launcher
                    .run(&self.systemd_run(&unit, command, label))
                    .map_err(|source| ExecError::Failed {
                        unit: unit.clone(),
                        source,
                    })?;
                Ok(Started { unit: Some(unit) })
            }
        }
    }
}
