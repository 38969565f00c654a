//! Running host-side actions picked on the display.

pub mod driver;
pub mod launcher;

use log::{error, info, warn};
use std::fmt;

pub use driver::{ExecError, Started};
pub use launcher::{Invocation, Launcher, ProcessLauncher};

use crate::models::{CommandSpec, ExecutionPolicy};

/// Result of handling one selection. Every variant is also logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Blocked {
        id: String,
        label: String,
        exec: Option<String>,
    },
    NothingConfigured {
        id: String,
        label: String,
    },
    Started {
        id: String,
        label: String,
        unit: Option<String>,
    },
    Failed {
        id: String,
        label: String,
        error: String,
    },
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Blocked { id, label, exec } => write!(
                f,
                "execution blocked id={} label={} exec={} (start with --allow-exec to enable)",
                id,
                label,
                exec.as_deref().unwrap_or("<none>")
            ),
            DispatchOutcome::NothingConfigured { id, label } => {
                write!(f, "nothing configured to run for id={} label={}", id, label)
            }
            DispatchOutcome::Started { id, label, unit: None } => {
                write!(f, "started exec id={} label={}", id, label)
            }
            DispatchOutcome::Started {
                id,
                label,
                unit: Some(unit),
            } => write!(f, "started exec id={} label={} unit={}", id, label, unit),
            DispatchOutcome::Failed { id, label, error } => {
                write!(f, "exec failed id={} label={}: {}", id, label, error)
            }
        }
    }
}

/// Runs selected commands according to the process-wide [`ExecutionPolicy`].
pub struct CommandDispatcher {
    policy: ExecutionPolicy,
    launcher: Box<dyn Launcher>,
}

impl CommandDispatcher {
    pub fn new(policy: ExecutionPolicy) -> Self {
        Self::with_launcher(policy, Box::new(ProcessLauncher::new()))
    }

    pub fn with_launcher(policy: ExecutionPolicy, launcher: Box<dyn Launcher>) -> Self {
        Self { policy, launcher }
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Launch `command`'s action, fire-and-forget. Never fails; the outcome is
    /// logged and returned for the caller's information.
    pub fn dispatch(&self, command: &CommandSpec) -> DispatchOutcome {
        let outcome = self.decide(command);
        match &outcome {
            DispatchOutcome::Blocked { .. } => warn!("{}", outcome),
            DispatchOutcome::NothingConfigured { .. } | DispatchOutcome::Started { .. } => {
                info!("{}", outcome)
            }
            DispatchOutcome::Failed { .. } => error!("{}", outcome),
        }
        outcome
    }

    fn decide(&self, command: &CommandSpec) -> DispatchOutcome {
        let id = command.id.clone();
        let label = command.label.clone();

        if !self.policy.allow_exec {
            return DispatchOutcome::Blocked {
                id,
                label,
                exec: command.exec.clone(),
            };
        }

        let Some(exec) = command.exec.as_deref().filter(|e| !e.trim().is_empty()) else {
            return DispatchOutcome::NothingConfigured { id, label };
        };

        match self
            .policy
            .driver
            .execute(self.launcher.as_ref(), exec, &id, &label)
        {
            Ok(started) => DispatchOutcome::Started {
                id,
                label,
                unit: started.unit,
            },
            Err(e) => DispatchOutcome::Failed {
                id,
                label,
                error: e.to_string(),
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingLauncher;
    use super::*;
    use crate::models::ExecDriver;

    fn dispatcher(allow_exec: bool, driver: ExecDriver) -> (CommandDispatcher, RecordingLauncher) {
        let launcher = RecordingLauncher::new();
        let policy = ExecutionPolicy { allow_exec, driver };
        (
            CommandDispatcher::with_launcher(policy, Box::new(launcher.clone())),
            launcher,
        )
    }

    #[test]
    fn test_blocked_when_exec_not_allowed() {
        let (dispatcher, launcher) = dispatcher(false, ExecDriver::Shell);
        let command = CommandSpec::new("1", "Shutdown").with_exec("shutdown -h now");

        let outcome = dispatcher.dispatch(&command);

        assert!(matches!(outcome, DispatchOutcome::Blocked { .. }));
        let message = outcome.to_string();
        assert!(message.contains("execution blocked"));
        assert!(message.contains("id=1"));
        assert!(message.contains("label=Shutdown"));
        assert!(message.contains("shutdown -h now"));
        assert!(launcher.spawned().is_empty());
        assert!(launcher.ran().is_empty());
    }

    #[test]
    fn test_placeholder_runs_nothing() {
        let (dispatcher, launcher) = dispatcher(true, ExecDriver::Shell);

        let outcome = dispatcher.dispatch(&CommandSpec::new("3", "Placeholder"));
        assert!(matches!(outcome, DispatchOutcome::NothingConfigured { .. }));

        let outcome = dispatcher.dispatch(&CommandSpec::new("4", "Blank").with_exec("  "));
        assert!(matches!(outcome, DispatchOutcome::NothingConfigured { .. }));

        assert!(launcher.spawned().is_empty());
    }

    #[test]
    fn test_shell_started() {
        let (dispatcher, launcher) = dispatcher(true, ExecDriver::Shell);
        let command = CommandSpec::new("2", "Echo").with_exec("/bin/echo hi");

        let outcome = dispatcher.dispatch(&command);

        assert_eq!(outcome.to_string(), "started exec id=2 label=Echo");
        assert_eq!(launcher.spawned()[0].args, vec!["-c", "/bin/echo hi"]);
    }

    #[test]
    fn test_systemd_started_reports_unit() {
        let (dispatcher, launcher) = dispatcher(true, ExecDriver::SystemdSystem);
        let command = CommandSpec::new("5", "Backup").with_exec("backup.sh");

        match dispatcher.dispatch(&command) {
            DispatchOutcome::Started { unit: Some(unit), .. } => assert!(unit.starts_with("lcdcmd-5-")),
            other => panic!("unexpected outcome: {}", other),
        }
        assert_eq!(launcher.ran().len(), 1);
    }

    #[test]
    fn test_spawn_failure_is_swallowed() {
        let launcher = RecordingLauncher::failing();
        let policy = ExecutionPolicy {
            allow_exec: true,
            driver: ExecDriver::Shell,
        };
        let dispatcher = CommandDispatcher::with_launcher(policy, Box::new(launcher));
        let command = CommandSpec::new("9", "Broken").with_exec("nope");

        let outcome = dispatcher.dispatch(&command);

        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
        assert!(outcome.to_string().contains("id=9 label=Broken"));
    }
}
