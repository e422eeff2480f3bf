use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{InputNode, InputSource, ReadError};
use crate::types::{ButtonCode, Capabilities, DeviceDescriptor, DevicePath, RawEvent};

#[derive(Debug, Default)]
struct MemoryDevice {
    descriptor: DeviceDescriptor,
    capabilities: Capabilities,
    port: u32,
    queue: VecDeque<RawEvent>,
    removed: bool,
    opened: usize,
}

type Devices = BTreeMap<DevicePath, MemoryDevice>;

/// In-memory input source. Devices are plugged, fed with events and unplugged
/// through a shared handle, which makes the discovery loop drivable without
/// hardware.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    devices: Arc<Mutex<Devices>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Devices> {
        self.devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes a node visible to enumeration.
    pub fn plug(&self, path: &str, descriptor: DeviceDescriptor, capabilities: Capabilities, port: u32) {
        self.lock().insert(
            path.to_string(),
            MemoryDevice {
                descriptor,
                capabilities,
                port,
                ..MemoryDevice::default()
            },
        );
    }

    /// Removes a node from enumeration. Open handles fail with a removal error.
    pub fn unplug(&self, path: &str) {
        self.lock().remove(path);
    }

    /// Keeps the node listed but makes reads and opens fail as if it vanished
    /// between two enumerations.
    pub fn mark_removed(&self, path: &str) {
        if let Some(device) = self.lock().get_mut(path) {
            device.removed = true;
        }
    }

    pub fn push(&self, path: &str, events: impl IntoIterator<Item = RawEvent>) {
        if let Some(device) = self.lock().get_mut(path) {
            device.queue.extend(events);
        }
    }

    pub fn press(&self, path: &str, code: ButtonCode) {
        self.push(path, [RawEvent::Key { code, value: 1 }]);
    }

    pub fn release(&self, path: &str, code: ButtonCode) {
        self.push(path, [RawEvent::Key { code, value: 0 }]);
    }

    /// How many times the node has been opened.
    pub fn open_count(&self, path: &str) -> usize {
        self.lock().get(path).map_or(0, |device| device.opened)
    }
}

impl InputSource for MemorySource {
    type Node = MemoryNode;

    fn enumerate(&mut self) -> io::Result<Vec<DevicePath>> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn open(&mut self, path: &str) -> io::Result<MemoryNode> {
        let mut devices = self.lock();
        let device = devices
            .get_mut(path)
            .filter(|device| !device.removed)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        device.opened += 1;
        Ok(MemoryNode {
            path: path.to_string(),
            descriptor: device.descriptor.clone(),
            capabilities: device.capabilities.clone(),
            devices: self.devices.clone(),
        })
    }

    fn port(&self, path: &str) -> u32 {
        self.lock().get(path).map_or(0, |device| device.port)
    }

    fn wait_readable(&self, nodes: &[&MemoryNode], _timeout: Duration) -> io::Result<Vec<usize>> {
        let devices = self.lock();
        Ok(nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                devices
                    .get(&node.path)
                    .map_or(true, |device| device.removed || !device.queue.is_empty())
            })
            .map(|(i, _)| i)
            .collect())
    }
}

/// Handle to a node of a [`MemorySource`].
#[derive(Debug)]
pub struct MemoryNode {
    path: DevicePath,
    descriptor: DeviceDescriptor,
    capabilities: Capabilities,
    devices: Arc<Mutex<Devices>>,
}

impl InputNode for MemoryNode {
    fn descriptor(&self) -> DeviceDescriptor {
        self.descriptor.clone()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn read_events(&mut self) -> Result<Vec<RawEvent>, ReadError> {
        let mut devices = self
            .devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match devices.get_mut(&self.path) {
            Some(device) if !device.removed => Ok(device.queue.drain(..).collect()),
            _ => Err(ReadError::Removed),
        }
    }
}
