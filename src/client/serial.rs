use log::debug;
use std::time::Duration;

use crate::client::link::{LinkError, Port, PortOpener};

/// Upper bound on one blocking read, so the inbound loop can notice a stop
/// request.
pub const READ_TIMEOUT: Duration = Duration::from_millis(200);

pub struct SerialOpener {
    path: String,
    baud: u32,
    timeout: Duration,
}

impl SerialOpener {
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            path: path.into(),
            baud,
            timeout: READ_TIMEOUT,
        }
    }
}

impl PortOpener for SerialOpener {
    fn open(&self) -> Result<Port, LinkError> {
        debug!("Opening serial port {} at {} baud", self.path, self.baud);
        let open_error = |source| LinkError::Open {
            port: self.path.clone(),
            source,
        };

        let port = serialport::new(&self.path, self.baud)
            .timeout(self.timeout)
            .open()
            .map_err(open_error)?;
        let reader = port.try_clone().map_err(open_error)?;

        Ok(Port {
            writer: Box::new(port),
            reader: Box::new(reader),
        })
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.path, self.baud)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_an_open_error() {
        let opener = SerialOpener::new("/dev/lcdlink-does-not-exist", 115200);
        match opener.open() {
            Err(LinkError::Open { port, .. }) => assert_eq!(port, "/dev/lcdlink-does-not-exist"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opened a port that does not exist"),
        }
        assert_eq!(opener.describe(), "/dev/lcdlink-does-not-exist@115200");
    }
}
