use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use evdev::{Device, EventType, InputEvent};
use log::debug;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};

use super::{InputNode, InputSource, ReadError};
use crate::identity::{resolve_port, SYS_CLASS_INPUT};
use crate::types::{AxisRange, Capabilities, DeviceDescriptor, DevicePath, RawEvent};

/// Default directory holding input event nodes.
pub const DEV_INPUT: &str = "/dev/input";

/// Linux evdev-backed input source.
#[derive(Debug, Clone)]
pub struct EvdevSource {
    dev_root: PathBuf,
    sysfs_root: PathBuf,
}

impl Default for EvdevSource {
    fn default() -> Self {
        Self::with_roots(DEV_INPUT, SYS_CLASS_INPUT)
    }
}

impl EvdevSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roots(dev_root: impl Into<PathBuf>, sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            dev_root: dev_root.into(),
            sysfs_root: sysfs_root.into(),
        }
    }

    pub fn dev_root(&self) -> &Path {
        &self.dev_root
    }
}

impl InputSource for EvdevSource {
    type Node = EvdevNode;

    fn enumerate(&mut self) -> io::Result<Vec<DevicePath>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dev_root)? {
            let entry = entry?;
            let is_event_node = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("event"));
            if !is_event_node {
                continue;
            }
            if let Some(path) = entry.path().to_str() {
                paths.push(path.to_string());
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn open(&mut self, path: &str) -> io::Result<EvdevNode> {
        let device = Device::open(path)?;
        device.set_nonblocking(true)?;
        let input_id = device.input_id();
        let descriptor = DeviceDescriptor {
            name: device.name().unwrap_or_default().to_string(),
            bus_type: input_id.bus_type().0,
            vendor_id: input_id.vendor(),
            product_id: input_id.product(),
            version: input_id.version(),
            uniq: device.unique_name().map(str::to_string),
        };
        Ok(EvdevNode {
            path: path.to_string(),
            device,
            descriptor,
        })
    }

    fn port(&self, path: &str) -> u32 {
        resolve_port(&self.sysfs_root, path)
    }

    fn wait_readable(&self, nodes: &[&EvdevNode], timeout: Duration) -> io::Result<Vec<usize>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let mut fds: Vec<PollFd> = nodes
            .iter()
            .map(|node| PollFd::new(node.device.as_raw_fd(), PollFlags::POLLIN))
            .collect();
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        match poll(&mut fds, timeout_ms) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Vec::new()),
            Err(errno) => return Err(io::Error::from(errno)),
        }
        // Errors and hangups count as readable so the read surfaces them.
        let wake = PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP;
        Ok(fds
            .iter()
            .enumerate()
            .filter(|(_, fd)| fd.revents().is_some_and(|r| r.intersects(wake)))
            .map(|(i, _)| i)
            .collect())
    }
}

/// An open evdev node.
pub struct EvdevNode {
    path: DevicePath,
    device: Device,
    descriptor: DeviceDescriptor,
}

impl InputNode for EvdevNode {
    fn descriptor(&self) -> DeviceDescriptor {
        self.descriptor.clone()
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::default();
        if let Some(keys) = self.device.supported_keys() {
            caps.buttons.extend(keys.iter().map(|key| key.0));
        }
        let Some(axes) = self.device.supported_absolute_axes() else {
            return caps;
        };
        match self.device.get_abs_state() {
            Ok(state) => {
                for axis in axes.iter() {
                    if let Some(info) = state.get(axis.0 as usize) {
                        caps.axes.insert(
                            axis.0,
                            AxisRange {
                                min: info.minimum,
                                max: info.maximum,
                            },
                        );
                    }
                }
            }
            Err(e) => debug!("{}: axis ranges unavailable: {e}", self.path),
        }
        caps
    }

    fn read_events(&mut self) -> Result<Vec<RawEvent>, ReadError> {
        match self.device.fetch_events() {
            Ok(events) => Ok(events.filter_map(to_raw_event).collect()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) if e.raw_os_error() == Some(Errno::ENODEV as i32) => Err(ReadError::Removed),
            Err(e) => Err(ReadError::Io(e)),
        }
    }
}

fn to_raw_event(event: InputEvent) -> Option<RawEvent> {
    let (code, value) = (event.code(), event.value());
    if event.event_type() == EventType::KEY {
        Some(RawEvent::Key { code, value })
    } else if event.event_type() == EventType::ABSOLUTE {
        Some(RawEvent::Axis { code, value })
    } else {
        None
    }
}
