//! Network interface abstraction and packet processing
//!
//! This module connects the wire formats in `network` to a packet device:
//! - Device abstraction (TUN and in-memory)
//! - Echo Request / Echo Reply handling
//! - The read-process-write dispatch loop and its shutdown token
//! - Host-side interface configuration

pub mod device;
pub mod dispatch;
pub mod responder;
pub mod setup;

// Re-export commonly used items
pub use device::{Device, MemoryDevice, TunDevice};
pub use dispatch::{DispatchStats, Dispatcher, Shutdown};
pub use responder::{EchoResponder, Summary};
