use log::{debug, warn};
use std::fmt;
use std::io;
use std::process::{Child, Command, Stdio};

/// A program and its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

/// Creates operating-system processes.
pub trait Launcher: Send + Sync {
    /// Start the process and return at once.
    fn spawn(&self, invocation: &Invocation) -> io::Result<()>;

    /// Run the process to completion. A non-zero exit is an error.
    fn run(&self, invocation: &Invocation) -> io::Result<()>;
}

/// Waits on a detached child from a background thread; its exit status is
/// not used.
fn reap(mut child: Child) -> io::Result<()> {
    std::thread::Builder::new()
        .name("lcdlink-reaper".to_string())
        .spawn(move || {
            let _ = child.wait();
        })?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessLauncher {
    reaper: fn(Child) -> io::Result<()>,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self { reaper: reap }
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for ProcessLauncher {
    fn spawn(&self, invocation: &Invocation) -> io::Result<()> {
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .spawn()?;
        let pid = child.id();
        debug!("Spawned pid {}: {}", pid, invocation);

        // The process is already running at this point.
        if let Err(e) = (self.reaper)(child) {
            warn!("Started pid {} but could not watch it: {}", pid, e);
        }
        Ok(())
    }

    fn run(&self, invocation: &Invocation) -> io::Result<()> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()?;
        if output.status.success() {
            return Ok(());
        }
        Err(io::Error::other(format!(
            "{} exited with {}: {}",
            invocation.program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
