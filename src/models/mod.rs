pub mod command;
pub mod policy;
pub mod sensor;

pub use command::CommandSpec;
pub use policy::{ExecDriver, ExecutionPolicy};
pub use sensor::{Provider, SensorSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}
