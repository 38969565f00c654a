use log::{debug, error, info, warn};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::client::backoff::Backoff;
use crate::models::LinkState;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    #[error("Link is not connected")]
    NotConnected,

    #[error("Link is closed")]
    Closed,

    #[error("Connect cancelled")]
    Cancelled,
}

/// Both halves of an opened channel. They refer to the same device.
pub struct Port {
    pub writer: Box<dyn Write + Send>,
    pub reader: Box<dyn Read + Send>,
}

/// Acquires the physical channel. One call is one attempt.
pub trait PortOpener: Send + Sync {
    fn open(&self) -> Result<Port, LinkError>;

    /// Human readable name of the channel for logs.
    fn describe(&self) -> String;
}

struct Inner {
    state: LinkState,
    writer: Option<Box<dyn Write + Send>>,
}

/// The shared connection to the display.
///
/// The write half lives behind a single mutex so the telemetry writer and the
/// reader's catalog replies never interleave. The read half is handed out by
/// [`LinkConnection::connect`] to whoever runs the inbound loop.
pub struct LinkConnection {
    opener: Box<dyn PortOpener>,
    inner: Mutex<Inner>,
    backoff: Mutex<Backoff>,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl LinkConnection {
    pub fn new(opener: Box<dyn PortOpener>) -> Self {
        Self {
            opener,
            inner: Mutex::new(Inner {
                state: LinkState::Disconnected,
                writer: None,
            }),
            backoff: Mutex::new(Backoff::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> LinkState {
        lock(&self.inner).state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Single open attempt. On success the link is `Connected` and the read
    /// half is returned; on failure it stays `Connecting`.
    pub fn try_open(&self) -> Result<Box<dyn Read + Send>, LinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }

        let mut inner = lock(&self.inner);
        inner.state = LinkState::Connecting;
        inner.writer = None;

        let port = self.opener.open()?;
        inner.writer = Some(port.writer);
        inner.state = LinkState::Connected;
        lock(&self.backoff).reset();
        info!("Connected to {}", self.opener.describe());
        Ok(port.reader)
    }

    /// Open the channel, retrying with backoff until it succeeds or `cancel`
    /// fires. The first failure of a streak is logged as an error, the rest
    /// only at debug level.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<Box<dyn Read + Send>, LinkError> {
        loop {
            if cancel.is_cancelled() {
                self.set_state(LinkState::Disconnected);
                return Err(LinkError::Cancelled);
            }

            let e = match self.try_open() {
                Ok(reader) => return Ok(reader),
                Err(LinkError::Closed) => return Err(LinkError::Closed),
                Err(e) => e,
            };

            let (delay, first) = {
                let mut backoff = lock(&self.backoff);
                let delay = backoff.fail();
                (delay, backoff.failures() == 1)
            };
            if first {
                error!("{}; retrying in {}s", e, delay.as_secs());
            } else {
                debug!("{}; retrying in {}s", e, delay.as_secs());
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    info!("Reconnect to {} cancelled", self.opener.describe());
                    self.set_state(LinkState::Disconnected);
                    return Err(LinkError::Cancelled);
                }
            }
        }
    }

    /// Write one complete frame and flush it.
    ///
    /// Any I/O error drops the handle and leaves the link `Disconnected`; the
    /// caller decides whether to reconnect.
    pub fn write_frame(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut inner = lock(&self.inner);
        let Some(writer) = inner.writer.as_mut() else {
            return Err(if self.closed.load(Ordering::SeqCst) {
                LinkError::Closed
            } else {
                LinkError::NotConnected
            });
        };

        let result = writer.write_all(bytes).and_then(|_| writer.flush());
        if let Err(e) = result {
            warn!("Write to {} failed, marking link disconnected: {}", self.opener.describe(), e);
            inner.writer = None;
            inner.state = LinkState::Disconnected;
            return Err(LinkError::Write(e));
        }
        Ok(())
    }

    /// Release the channel. Only the first call does anything.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut inner = lock(&self.inner);
        inner.writer = None;
        inner.state = LinkState::Disconnected;
        info!("Link to {} closed", self.opener.describe());
    }

    fn set_state(&self, state: LinkState) {
        lock(&self.inner).state = state;
    }
}

impl Drop for LinkConnection {
    fn drop(&mut self) {
        self.close();
    }
}
