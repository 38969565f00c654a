use clap::ValueEnum;
use std::fmt;

/// How a selected command is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExecDriver {
    /// `/bin/sh -c`, detached.
    #[default]
    Shell,
    /// Transient unit under the user's service manager.
    SystemdUser,
    /// Transient unit under the system service manager.
    SystemdSystem,
}

impl fmt::Display for ExecDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecDriver::Shell => "shell",
            ExecDriver::SystemdUser => "systemd-user",
            ExecDriver::SystemdSystem => "systemd-system",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionPolicy {
    pub allow_exec: bool,
    pub driver: ExecDriver,
}
