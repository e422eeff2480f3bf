//! Access to OS input nodes.
//!
//! The discovery loop only talks to these traits, so the Linux backend can be
//! swapped for the in-memory source when driving the loop from tests.

#[cfg(feature = "evdev-backend")]
mod linux;
mod memory;

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::types::{Capabilities, DeviceDescriptor, DevicePath, RawEvent};

#[cfg(feature = "evdev-backend")]
pub use self::linux::{EvdevNode, EvdevSource};
pub use self::memory::{MemoryNode, MemorySource};

/// Failure while draining events from an open node.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The node is gone; all state tied to it must be dropped.
    #[error("device removed")]
    Removed,
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// An open input node.
pub trait InputNode: Send {
    /// Static attributes of the node.
    fn descriptor(&self) -> DeviceDescriptor;

    /// Buttons and absolute axes the node can emit. Attributes that cannot be
    /// queried are reported as absent.
    fn capabilities(&self) -> Capabilities;

    /// Drains pending events without blocking.
    fn read_events(&mut self) -> Result<Vec<RawEvent>, ReadError>;
}

/// Enumerates and opens input nodes.
pub trait InputSource: Send {
    type Node: InputNode;

    /// Paths of all currently present nodes.
    fn enumerate(&mut self) -> io::Result<Vec<DevicePath>>;

    fn open(&mut self, path: &str) -> io::Result<Self::Node>;

    /// Joystick slot index of the node, best effort.
    fn port(&self, path: &str) -> u32;

    /// Waits up to `timeout` for any of `nodes` to become readable and returns
    /// the indices of the readable ones.
    fn wait_readable(&self, nodes: &[&Self::Node], timeout: Duration) -> io::Result<Vec<usize>>;
}
