pub mod backoff;
pub mod link;
pub mod serial;

pub use link::{LinkConnection, LinkError, Port, PortOpener};
pub use serial::SerialOpener;

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    use super::{LinkError, Port, PortOpener};

    /// Write half that appends into memory shared with the test.
    #[derive(Clone, Default)]
    pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }

        pub fn text(&self) -> String {
            String::from_utf8(self.contents()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// In-memory channel: fails the first `failures_left` opens, then hands
    /// out a port whose reads replay `input` and whose writes land in `written`.
    /// The first `broken_writes` ports handed out reject every write.
    pub struct FakeOpener {
        pub written: SharedBuffer,
        pub input: Vec<u8>,
        pub failures_left: Arc<AtomicUsize>,
        pub attempts: Arc<Mutex<Vec<Instant>>>,
        broken_writes: Arc<AtomicUsize>,
    }

    impl FakeOpener {
        pub fn new() -> Self {
            Self {
                written: SharedBuffer::default(),
                input: Vec::new(),
                failures_left: Arc::new(AtomicUsize::new(0)),
                attempts: Arc::new(Mutex::new(Vec::new())),
                broken_writes: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing(times: usize) -> Self {
            let opener = Self::new();
            opener.failures_left.store(times, Ordering::SeqCst);
            opener
        }

        pub fn with_input(mut self, input: &[u8]) -> Self {
            self.input = input.to_vec();
            self
        }

        pub fn with_broken_writer(self) -> Self {
            self.with_broken_writes(usize::MAX)
        }

        pub fn with_broken_writes(self, ports: usize) -> Self {
            self.broken_writes.store(ports, Ordering::SeqCst);
            self
        }
    }

    impl PortOpener for FakeOpener {
        fn open(&self) -> Result<Port, LinkError> {
            self.attempts.lock().unwrap().push(Instant::now());
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(LinkError::Open {
                    port: self.describe(),
                    source: serialport::Error::new(serialport::ErrorKind::NoDevice, "no such device"),
                });
            }

            let broken = self
                .broken_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            let writer: Box<dyn Write + Send> = if broken {
                Box::new(BrokenWriter)
            } else {
                Box::new(self.written.clone())
            };
            Ok(Port {
                writer,
                reader: Box::new(Cursor::new(self.input.clone())),
            })
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }
}
