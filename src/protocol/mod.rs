//! Line-mode wire protocol spoken with the display controller.
//!
//! Outbound traffic is a sequence of frames, each a run of display rows
//! closed by a blank row. Inbound traffic is one request per line.

pub mod frame;
pub mod request;

pub use frame::{commands_frame, encode, meta_line, truncate, LINE_WIDTH};
pub use request::Request;
