use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use ahash::AHashMap;
use crossbeam_channel::{unbounded, Sender};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::events::{DeviceEvent, EventReceiver};
use crate::runtime::{start_runtime_thread, Discovery, StartButtonResolver};
use crate::settings::RuntimeSettings;
use crate::source::InputSource;
use crate::types::{ButtonCode, DeviceIdentity, DevicePath};

/// Shared state used by the manager and the runtime loop.
pub(crate) struct Inner {
    pub subscribers: Mutex<Vec<Sender<DeviceEvent>>>,
    pub devices: RwLock<AHashMap<DevicePath, DeviceIdentity>>,
    pub cmd_tx: Sender<Command>,
    pub stop: AtomicBool,
}

impl Inner {
    /// Records lifecycle changes and fans the event out. Subscribers whose
    /// receiver is gone are dropped.
    pub(crate) fn publish(&self, event: DeviceEvent) {
        let Ok(mut subs) = self.subscribers.lock() else {
            return;
        };
        if let Ok(mut map) = self.devices.write() {
            match &event {
                DeviceEvent::Connected(identity) => {
                    map.insert(identity.path.clone(), identity.clone());
                }
                DeviceEvent::Disconnected { path } => {
                    map.remove(path);
                }
                _ => {}
            }
        }
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn clear_devices(&self) {
        if let Ok(mut map) = self.devices.write() {
            map.clear();
        }
    }
}

/// Manager responsible for discovering gamepads and emitting events.
pub struct DeviceManager {
    inner: Arc<Inner>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceManager {
    /// Starts discovery over the Linux evdev nodes.
    #[cfg(feature = "evdev-backend")]
    pub fn new(settings: RuntimeSettings, resolver: Arc<dyn StartButtonResolver>) -> Result<Self> {
        let source = crate::source::EvdevSource::new();
        if !source.dev_root().is_dir() {
            return Err(Error::BackendInit(format!(
                "{} is not accessible",
                source.dev_root().display()
            )));
        }
        Self::with_source(source, settings, resolver)
    }

    /// Creates a manager over `source` and starts the background runtime
    /// thread. Blocks briefly until the first discovery pass completes (up to
    /// 1s).
    pub fn with_source<S>(
        source: S,
        settings: RuntimeSettings,
        resolver: Arc<dyn StartButtonResolver>,
    ) -> Result<Self>
    where
        S: InputSource + 'static,
    {
        let (cmd_tx, cmd_rx) = unbounded::<Command>();
        let inner = Arc::new(Inner {
            subscribers: Mutex::new(Vec::new()),
            devices: RwLock::new(AHashMap::new()),
            cmd_tx,
            stop: AtomicBool::new(false),
        });

        let discovery = Discovery::new(source, settings, resolver);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let thread = start_runtime_thread(inner.clone(), discovery, cmd_rx, Some(ready_tx))?;

        // Best-effort wait for the initial enumeration.
        let _ = ready_rx.recv_timeout(Duration::from_secs(1));

        Ok(Self {
            inner,
            thread: Some(thread),
        })
    }

    /// Subscribes to device events. A `Connected` event is replayed first for
    /// every gamepad already known. Dropped subscribers are cleaned
    /// automatically.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = unbounded();
        if let Ok(mut subs) = self.inner.subscribers.lock() {
            if let Ok(map) = self.inner.devices.read() {
                let mut known: Vec<&DeviceIdentity> = map.values().collect();
                known.sort_by(|a, b| a.path.cmp(&b.path));
                for identity in known {
                    let _ = tx.send(DeviceEvent::Connected(identity.clone()));
                }
            }
            subs.push(tx);
        }
        rx
    }

    /// Returns a snapshot of currently connected gamepads.
    pub fn devices(&self) -> Vec<DeviceIdentity> {
        if let Ok(map) = self.inner.devices.read() {
            return map.values().cloned().collect();
        }
        Vec::new()
    }

    /// Applies a start button override to every tracked device of the given
    /// type. Future connections resolve the override through the resolver.
    pub fn set_start_button(
        &self,
        vendor_id: u16,
        product_id: u16,
        name: &str,
        code: ButtonCode,
    ) -> Result<()> {
        if self.thread.is_none() {
            return Err(Error::RuntimeStopped);
        }
        self.inner
            .cmd_tx
            .send(Command::SetStartButton {
                vendor_id,
                product_id,
                name: name.to_string(),
                code,
            })
            .map_err(|_| Error::ChannelClosed)
    }

    /// Raises the stop flag and waits for the runtime thread to release every
    /// device handle.
    pub fn shutdown(&mut self) -> Result<()> {
        self.inner.stop.store(true, Ordering::Relaxed);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| Error::RuntimeStopped),
            None => Ok(()),
        }
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
