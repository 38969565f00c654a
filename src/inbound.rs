use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::{LinkConnection, LinkError};
use crate::exec::{CommandDispatcher, DispatchOutcome};
use crate::models::CommandSpec;
use crate::protocol::{commands_frame, Request};

/// Longest inbound line kept, newline included. Longer lines are dropped.
pub const MAX_LINE_LEN: usize = 256;

/// What became of one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    CommandsSent,
    CommandsNotSent,
    Selected {
        id: String,
        /// Empty when no command has this id.
        label: String,
        /// `None` when nothing was dispatched.
        outcome: Option<DispatchOutcome>,
    },
    Ignored,
}

/// Serves requests coming up the link from the display.
pub struct InboundDispatcher {
    link: Arc<LinkConnection>,
    commands: Arc<Vec<CommandSpec>>,
    dispatcher: Arc<CommandDispatcher>,
}

impl InboundDispatcher {
    pub fn new(
        link: Arc<LinkConnection>,
        commands: Arc<Vec<CommandSpec>>,
        dispatcher: Arc<CommandDispatcher>,
    ) -> Self {
        Self {
            link,
            commands,
            dispatcher,
        }
    }

    pub fn handle_line(&self, line: &str) -> Handled {
        match Request::parse(line) {
            Some(Request::Commands) => match self.link.write_frame(&commands_frame(&self.commands)) {
                Ok(()) => {
                    info!("Sent commands catalog ({} entries)", self.commands.len());
                    Handled::CommandsSent
                }
                Err(e) => {
                    warn!("Failed to send commands catalog: {}", e);
                    Handled::CommandsNotSent
                }
            },
            Some(Request::Select(id)) => match self.commands.iter().find(|c| c.id == id) {
                Some(command) => {
                    info!("selected id={} label={}", id, command.label);
                    let outcome = self.dispatcher.dispatch(command);
                    Handled::Selected {
                        id,
                        label: command.label.clone(),
                        outcome: Some(outcome),
                    }
                }
                None => {
                    info!("selected id={} label=", id);
                    Handled::Selected {
                        id,
                        label: String::new(),
                        outcome: None,
                    }
                }
            },
            None => {
                let line = line.trim();
                if !line.is_empty() {
                    debug!("[display] {}", line);
                }
                Handled::Ignored
            }
        }
    }

    fn handle_bytes(&self, raw: &[u8]) {
        match std::str::from_utf8(raw) {
            Ok(line) => {
                self.handle_line(line.trim_end_matches(&['\r', '\n'][..]));
            }
            Err(e) => warn!(
                "Undecodable line from display ({}): {:?}",
                e,
                String::from_utf8_lossy(raw)
            ),
        }
    }

    /// Blocking read loop. Returns when `stop` fires, when the peer closes the
    /// stream, or with [`LinkError::Read`] on the first real read error.
    ///
    /// `reader` is expected to time out periodically; timeouts only give the
    /// loop a chance to check `stop`.
    pub fn run<R: Read>(&self, reader: R, stop: &CancellationToken) -> Result<(), LinkError> {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        // Set while skipping the rest of an over-long line.
        let mut discarding = false;

        while !stop.is_cancelled() {
            let room = (MAX_LINE_LEN + 1 - buf.len()) as u64;
            match (&mut reader).take(room).read_until(b'\n', &mut buf) {
                Ok(0) => {
                    if !buf.is_empty() && !discarding {
                        self.handle_bytes(&buf);
                    }
                    info!("Display closed the stream, reader stopping");
                    return Ok(());
                }
                Ok(_) => {
                    if buf.ends_with(b"\n") {
                        if !discarding {
                            self.handle_bytes(&buf);
                        }
                        discarding = false;
                        buf.clear();
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
                Err(e) => {
                    error!("Reader error: {}", e);
                    return Err(LinkError::Read(e));
                }
            }

            if buf.len() > MAX_LINE_LEN {
                if !discarding {
                    warn!("Dropping line from display longer than {} bytes", MAX_LINE_LEN);
                }
                discarding = true;
                buf.clear();
            }
        }

        debug!("Reader stopped");
        Ok(())
    }
}
