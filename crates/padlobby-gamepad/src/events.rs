use crossbeam_channel::Receiver;

use crate::types::{DeviceIdentity, DevicePath};

/// Events emitted by the discovery runtime about gamepad lifecycle and input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A gamepad node has been opened and identified.
    Connected(DeviceIdentity),
    /// A tracked gamepad node has disappeared or failed with a removal error.
    Disconnected { path: DevicePath },
    /// A button press or trigger pull was observed.
    Activity { path: DevicePath },
    /// The device's resolved start button was pressed.
    StartPressed { path: DevicePath },
    /// A ready combo matched on the device.
    ComboFired { path: DevicePath },
}

impl DeviceEvent {
    pub fn path(&self) -> &str {
        match self {
            DeviceEvent::Connected(identity) => &identity.path,
            DeviceEvent::Disconnected { path }
            | DeviceEvent::Activity { path }
            | DeviceEvent::StartPressed { path }
            | DeviceEvent::ComboFired { path } => path,
        }
    }
}

/// Receiving end for device events subscription.
pub type EventReceiver = Receiver<DeviceEvent>;
